use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::descriptor::BackendKind;
use crate::error::StorageError;

/// Opaque identifier of a stored remote object (etag, generation or content hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    /// SHA-256 of the given bytes, hex encoded.
    pub fn of(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Non-secret description of a remote object, used for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDescription {
    pub kind: BackendKind,
    pub location: String,
    /// Whether the last probe of the remote succeeded.
    pub reachable: bool,
}

/// Whole-object transfer to and from a durable remote location.
///
/// Every backend that mirrors the working copy implements this:
/// - Network paths (mounted volumes)
/// - S3 and S3-compatible object stores
/// - Google Cloud Storage
/// - Vercel Blob
///
/// Implementations classify failures into [`StorageError`] variants so the
/// sync engine can decide whether to retry. They never retry themselves.
#[async_trait]
pub trait RemoteAdapter: Send + Sync {
    /// Backend kind this adapter serves.
    fn kind(&self) -> BackendKind;

    /// Display location of the remote object (never contains credentials).
    fn location(&self) -> &str;

    /// Download the full remote object.
    ///
    /// # Returns
    /// `None` when the object does not exist yet.
    async fn fetch(&self) -> Result<Option<Vec<u8>>, StorageError>;

    /// Upload `data`, replacing the remote object in full.
    ///
    /// Readers of the remote never observe a partially written object.
    async fn store(&self, data: &[u8]) -> Result<Fingerprint, StorageError>;

    /// Whether the remote object currently exists.
    async fn exists(&self) -> Result<bool, StorageError>;

    /// Describe the remote, probing reachability.
    async fn describe(&self) -> RemoteDescription {
        RemoteDescription {
            kind: self.kind(),
            location: self.location().to_string(),
            reachable: self.exists().await.is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        let fp = Fingerprint::of(b"hello");
        assert_eq!(
            fp.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(Fingerprint::of(b"hello"), fp);
        assert_ne!(Fingerprint::of(b"hello!"), fp);
    }
}
