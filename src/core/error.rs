use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("No executor registered for command type '{0}'")]
    Resolution(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, BusError>;

impl<T> From<std::sync::PoisonError<T>> for BusError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
