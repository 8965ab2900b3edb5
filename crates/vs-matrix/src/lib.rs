//! vs-matrix: content-addressed matrix storage.
//!
//! Matrices are identified by a SHA-256 of their content, so uploading the same
//! data twice is a no-op and stores can be shared between variants without locks.

pub mod hash;
pub mod memory;
pub mod store;
pub mod types;

pub use hash::compute_matrix_id;
pub use memory::InMemoryMatrixStore;
pub use store::FsMatrixStore;
pub use types::*;

pub type MatrixResult<T> = Result<T, MatrixError>;

#[derive(thiserror::Error, Debug)]
pub enum MatrixError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Matrix not found: {id}")]
    NotFound { id: String },

    #[error("Invalid matrix: {reason}")]
    Invalid { reason: String },

    #[error("Invalid hash: {0}")]
    InvalidHash(String),
}

/// Access to the shared matrix store.
///
/// Writes are idempotent: `create` on already-stored content returns the
/// existing id without touching the store.
pub trait MatrixService: Send + Sync {
    fn create(&self, data: &MatrixData) -> MatrixResult<String>;

    fn get(&self, id: &str) -> MatrixResult<Option<MatrixData>>;

    fn exists(&self, id: &str) -> MatrixResult<bool>;

    /// Deleting an unknown id is not an error.
    fn delete(&self, id: &str) -> MatrixResult<()>;

    fn list(&self) -> MatrixResult<Vec<String>>;

    /// Like `get`, but a missing matrix is an error.
    fn fetch(&self, id: &str) -> MatrixResult<MatrixData> {
        let id = vs_core::strip_matrix_protocol(id);
        self.get(id)?.ok_or_else(|| MatrixError::NotFound { id: id.to_string() })
    }
}

/// Reject ragged matrices: every row must have the same width.
pub fn validate_shape(data: &MatrixData) -> MatrixResult<()> {
    if let Some(first) = data.first() {
        let width = first.len();
        if let Some((row, bad)) = data.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(MatrixError::Invalid {
                reason: format!(
                    "row {} has {} columns, expected {}",
                    row,
                    bad.len(),
                    width
                ),
            });
        }
    }
    Ok(())
}
