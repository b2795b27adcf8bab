use thiserror::Error;

/// Errors that can occur while resolving or synchronizing the database file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(String),

    /// A configuration signal is present but malformed or contradictory.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network failure, 5xx or throttling. Worth retrying.
    #[error("Transient transport error: {0}")]
    Transient(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The local working copy cannot be read by the data-access layer.
    #[error("Corrupt local file: {0}")]
    CorruptLocalFile(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// Whether the operation that produced this error may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Transient(_) | StorageError::Timeout(_) | StorageError::Lock(_)
        )
    }

    /// Short machine-readable code used in status payloads and HTTP bodies.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Io(_) => "IO_ERROR",
            StorageError::Configuration(_) => "CONFIGURATION_ERROR",
            StorageError::Transient(_) => "TRANSIENT_ERROR",
            StorageError::Auth(_) => "AUTH_ERROR",
            StorageError::NotFound(_) => "NOT_FOUND",
            StorageError::CorruptLocalFile(_) => "CORRUPT_LOCAL_FILE",
            StorageError::Timeout(_) => "TIMEOUT",
            StorageError::Lock(_) => "LOCK_ERROR",
            StorageError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StorageError::Transient("503".into()).is_transient());
        assert!(StorageError::Timeout("fetch".into()).is_transient());
        assert!(StorageError::Lock("held".into()).is_transient());
        assert!(!StorageError::Auth("403".into()).is_transient());
        assert!(!StorageError::Configuration("bad".into()).is_transient());
        assert!(!StorageError::NotFound("x".into()).is_transient());
    }
}
