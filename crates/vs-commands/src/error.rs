//! Command-layer errors.

use crate::common::CommandName;
use vs_matrix::MatrixError;
use vs_study::TreeError;

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    /// Malformed arguments, rejected before any tree mutation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Expected application failure (missing target, duplicate creation, ...).
    #[error("{0}")]
    Failed(String),

    #[error("The revert function for {command} is not available")]
    RevertUnsupported { command: CommandName },

    #[error("Child not found: {path}")]
    ChildNotFound { path: String },

    #[error("Matrix error: {0}")]
    Matrix(#[from] MatrixError),

    #[error("Tree error: {0}")]
    Tree(TreeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CommandError {
    pub fn failed(message: impl Into<String>) -> Self {
        CommandError::Failed(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CommandError::Validation(message.into())
    }

    pub fn is_child_not_found(&self) -> bool {
        matches!(self, CommandError::ChildNotFound { .. })
    }
}

impl From<TreeError> for CommandError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::ChildNotFound { path } => CommandError::ChildNotFound { path },
            other => CommandError::Tree(other),
        }
    }
}

impl From<vs_core::CoreError> for CommandError {
    fn from(err: vs_core::CoreError) -> Self {
        CommandError::Validation(err.to_string())
    }
}
