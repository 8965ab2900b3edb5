//! Service layer for variant studies.
//!
//! Shared by the CLI: replaying command logs into snapshots, storing variants
//! and their logs on disk, and the revert/diff/dry-run workflows.

pub mod cache;
pub mod config;
pub mod error;
pub mod generator;
pub mod progress;
pub mod store;
pub mod variant_service;

pub use cache::SnapshotCache;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use generator::{CommandDetail, GenerationResult, Generator};
pub use progress::{GenerationEvent, GenerationListener};
pub use store::{CommandRecord, SnapshotRecord, VariantRecord, VariantStore};
pub use variant_service::VariantService;
