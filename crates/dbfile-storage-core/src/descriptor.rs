use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Object-storage providers, in the order the resolver prefers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudProvider {
    S3,
    Gcs,
    VercelBlob,
}

impl CloudProvider {
    /// Fixed provider priority: when several providers are configured the first wins.
    pub const PRIORITY: [CloudProvider; 3] =
        [CloudProvider::S3, CloudProvider::Gcs, CloudProvider::VercelBlob];

    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::S3 => "s3",
            CloudProvider::Gcs => "gcs",
            CloudProvider::VercelBlob => "vercel_blob",
        }
    }
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of durable store backing the embedded database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Local disk only, no persistence guarantee.
    None,
    /// A mounted filesystem path (NFS, SMB, platform volume).
    NetworkPath,
    /// Cloud object storage.
    CloudObject(CloudProvider),
    /// A client/server database is configured; the file layer is inert.
    RelationalPassthrough,
}

impl BackendKind {
    /// Rank in the resolver's priority order (1 is highest).
    pub fn priority_rank(&self) -> u8 {
        match self {
            BackendKind::RelationalPassthrough => 1,
            BackendKind::NetworkPath => 2,
            BackendKind::CloudObject(_) => 3,
            BackendKind::None => 4,
        }
    }

    /// Whether data written through this backend survives an environment reset.
    pub fn is_persistent(&self) -> bool {
        !matches!(self, BackendKind::None)
    }

    /// Whether the working copy is mirrored to a remote object.
    pub fn needs_sync(&self) -> bool {
        matches!(self, BackendKind::NetworkPath | BackendKind::CloudObject(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::None => "none",
            BackendKind::NetworkPath => "network_path",
            BackendKind::CloudObject(_) => "cloud_object",
            BackendKind::RelationalPassthrough => "relational_passthrough",
        }
    }

    pub fn provider(&self) -> Option<CloudProvider> {
        match self {
            BackendKind::CloudObject(provider) => Some(*provider),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::CloudObject(provider) => write!(f, "cloud_object({})", provider),
            other => f.write_str(other.label()),
        }
    }
}

/// Credentials attached to a descriptor. Never printed.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credentials {
    #[default]
    None,
    /// Access key pair (S3 and S3-compatible stores).
    AccessKey {
        access_key_id: String,
        secret_access_key: String,
    },
    /// Bearer-style storage token.
    BearerToken(String),
    /// Path to a service-account credential file.
    ServiceAccountFile(PathBuf),
    /// Full client/server database connection string.
    ConnectionString(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::None => f.write_str("None"),
            Credentials::AccessKey { .. } => f.write_str("AccessKey(<redacted>)"),
            Credentials::BearerToken(_) => f.write_str("BearerToken(<redacted>)"),
            // The path itself is not secret.
            Credentials::ServiceAccountFile(path) => {
                f.debug_tuple("ServiceAccountFile").field(path).finish()
            }
            Credentials::ConnectionString(_) => f.write_str("ConnectionString(<redacted>)"),
        }
    }
}

/// Metadata keys carried by descriptors.
pub mod meta {
    pub const BUCKET: &str = "bucket";
    pub const KEY: &str = "key";
    pub const REGION: &str = "region";
    pub const ENDPOINT: &str = "endpoint";
    pub const DOWNLOAD_URL: &str = "download_url";
    pub const SOURCE: &str = "source";
}

/// The single backend resolved for this process.
///
/// Computed once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    /// Where the durable copy lives (path, `s3://bucket/key`, URL...).
    pub location: String,
    pub credentials: Credentials,
    pub priority_rank: u8,
    /// Provider-specific, non-secret settings.
    pub metadata: BTreeMap<String, String>,
}

impl BackendDescriptor {
    pub fn new(kind: BackendKind, location: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            kind,
            location: location.into(),
            credentials,
            priority_rank: kind.priority_rank(),
            metadata: BTreeMap::new(),
        }
    }

    /// Local-only descriptor.
    pub fn none() -> Self {
        Self::new(BackendKind::None, String::new(), Credentials::None)
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Parse an object URI of the form `scheme://bucket/key`.
pub fn parse_object_uri<'a>(uri: &'a str, scheme: &str) -> Option<(&'a str, &'a str)> {
    let rest = uri.strip_prefix(scheme)?.strip_prefix("://")?;
    let (bucket, key) = rest.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }
    Some((bucket, key))
}
