use thiserror::Error;

/// Errors raised by [`VideoStorage`](super::VideoStorage) implementations
#[derive(Debug, Error)]
pub enum StorageError {
    /// The referenced blob does not exist
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// The blob changed since the reference was obtained (etag mismatch)
    #[error("Blob was modified concurrently: {0}")]
    Conflict(String),

    /// Transport or service failure while talking to the blob service
    #[error("Blob service I/O failure: {0}")]
    Io(String),

    /// A container could not be created or verified
    #[error("Container initialization failed: {0}")]
    Fatal(String),

    /// The request carries a value the blob service cannot represent
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Malformed storage configuration (e.g. connection string)
    #[error("Storage configuration error: {0}")]
    Config(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
