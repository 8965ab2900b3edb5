use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid name: '{name}' ({reason})")]
    InvalidName { name: String, reason: &'static str },
}
