use dbfile_storage_core::StorageError;

/// Map an HTTP status returned by an object store to a storage error category.
///
/// 408, 429 and 5xx are worth retrying; 401/403 are credential problems; any
/// other client error means the request itself is wrong (bucket, key, URL).
/// Callers check for a missing object before classifying.
pub(crate) fn classify_status(status: u16, message: String) -> StorageError {
    match status {
        401 | 403 => StorageError::Auth(message),
        408 | 429 => StorageError::Transient(message),
        500..=599 => StorageError::Transient(message),
        _ => StorageError::Configuration(message),
    }
}
