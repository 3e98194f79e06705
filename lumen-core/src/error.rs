use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LibraryError {
    /// Cancellation is a control path, never logged as an error.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, LibraryError::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
