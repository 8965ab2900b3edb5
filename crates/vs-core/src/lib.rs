//! vs-core: shared foundation for the variant-study workspace.
//!
//! Contains:
//! - ids (name -> identifier normalisation, match-signature helpers)
//! - uri (matrix reference protocol helpers)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod uri;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use uri::*;
