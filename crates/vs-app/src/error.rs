//! Error types for the vs-app service layer.

use std::path::PathBuf;

/// Application error wrapping the backend crates' errors for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Study error: {0}")]
    Study(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Matrix store error: {0}")]
    Matrix(String),

    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Base study not found: {0}")]
    BaseNotFound(String),

    #[error("Variant not found: {0}")]
    VariantNotFound(String),

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for vs-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<vs_study::StudyError> for AppError {
    fn from(err: vs_study::StudyError) -> Self {
        AppError::Study(err.to_string())
    }
}

impl From<vs_study::TreeError> for AppError {
    fn from(err: vs_study::TreeError) -> Self {
        AppError::Study(err.to_string())
    }
}

impl From<vs_commands::CommandError> for AppError {
    fn from(err: vs_commands::CommandError) -> Self {
        AppError::Command(err.to_string())
    }
}

impl From<vs_matrix::MatrixError> for AppError {
    fn from(err: vs_matrix::MatrixError) -> Self {
        AppError::Matrix(err.to_string())
    }
}
