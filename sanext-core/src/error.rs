use thiserror::Error;

/// Main error type for Sanext operations
#[derive(Error, Debug)]
pub enum SanextError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Decode error: {decoder} needs at least {expected} bytes, got {actual}")]
    Decode {
        decoder: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("State store error: {0}")]
    Store(String),
}

impl SanextError {
    /// Build a connection error from an I/O error kind and message
    pub fn connection(kind: std::io::ErrorKind, message: impl Into<String>) -> Self {
        SanextError::Connection(std::io::Error::new(kind, message.into()))
    }

    /// Whether the error comes from the socket and must tear the session down
    pub fn is_transport(&self) -> bool {
        matches!(self, SanextError::Connection(_) | SanextError::Timeout)
    }
}

/// Result type alias for Sanext operations
pub type SanextResult<T> = Result<T, SanextError>;
