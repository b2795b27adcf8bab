use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dbfile_storage_core::{
    meta, parse_object_uri, BackendDescriptor, BackendKind, CloudProvider, Credentials,
    Fingerprint, RemoteAdapter, StorageError,
};
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tracing::{debug, instrument};

/// Google Cloud Storage object holding the database file.
#[derive(Clone)]
pub struct GcsAdapter {
    store: Arc<dyn ObjectStore>,
    object: ObjectPath,
    location: String,
}

impl GcsAdapter {
    /// Wrap an existing object store (any `ObjectStore`, used by tests with `InMemory`).
    pub fn from_store(store: Arc<dyn ObjectStore>, bucket: &str, blob: &str) -> Self {
        Self {
            store,
            object: ObjectPath::from(blob),
            location: format!("gs://{}/{}", bucket, blob),
        }
    }

    /// Build from a resolved `cloud_object(gcs)` descriptor.
    pub fn from_descriptor(descriptor: &BackendDescriptor) -> Result<Self, StorageError> {
        if descriptor.kind != BackendKind::CloudObject(CloudProvider::Gcs) {
            return Err(StorageError::Configuration(format!(
                "Expected a gcs descriptor, got {}",
                descriptor.kind
            )));
        }
        let Credentials::ServiceAccountFile(path) = &descriptor.credentials else {
            return Err(StorageError::Configuration(
                "GCS descriptor carries no credential file".to_string(),
            ));
        };

        let (bucket, blob) = match (
            descriptor.metadata(meta::BUCKET),
            descriptor.metadata(meta::KEY),
        ) {
            (Some(bucket), Some(blob)) => (bucket, blob),
            _ => parse_object_uri(&descriptor.location, "gs").ok_or_else(|| {
                StorageError::Configuration(format!(
                    "Invalid GCS location: {}",
                    descriptor.location
                ))
            })?,
        };

        let store = GoogleCloudStorageBuilder::new()
            .with_bucket_name(bucket)
            .with_service_account_path(path.to_string_lossy())
            .build()
            .map_err(|e| StorageError::Configuration(format!("Invalid GCS setup: {}", e)))?;

        Ok(Self::from_store(Arc::new(store), bucket, blob))
    }
}

impl std::fmt::Debug for GcsAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsAdapter")
            .field("location", &self.location)
            .finish()
    }
}

fn classify_store_error(e: object_store::Error, action: &str) -> StorageError {
    let message = format!("GCS {} failed: {}", action, e);
    match e {
        object_store::Error::NotFound { .. } => StorageError::NotFound(message),
        object_store::Error::InvalidPath { .. }
        | object_store::Error::NotSupported { .. }
        | object_store::Error::NotImplemented
        | object_store::Error::UnknownConfigurationKey { .. } => {
            StorageError::Configuration(message)
        }
        // The client already retried; what remains is network or server trouble.
        _ => StorageError::Transient(message),
    }
}

#[async_trait]
impl RemoteAdapter for GcsAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::CloudObject(CloudProvider::Gcs)
    }

    fn location(&self) -> &str {
        &self.location
    }

    #[instrument(skip(self), fields(location = %self.location), level = "debug")]
    async fn fetch(&self) -> Result<Option<Vec<u8>>, StorageError> {
        match self.store.get(&self.object).await {
            Ok(result) => {
                let bytes = result
                    .bytes()
                    .await
                    .map_err(|e| classify_store_error(e, "read"))?;
                debug!("Fetched {} bytes from {}", bytes.len(), self.location);
                Ok(Some(bytes.to_vec()))
            }
            Err(object_store::Error::NotFound { .. }) => {
                debug!("No object at {}", self.location);
                Ok(None)
            }
            Err(e) => Err(classify_store_error(e, "get")),
        }
    }

    #[instrument(skip(self, data), fields(location = %self.location, len = data.len()), level = "debug")]
    async fn store(&self, data: &[u8]) -> Result<Fingerprint, StorageError> {
        let payload = PutPayload::from(Bytes::copy_from_slice(data));
        let result = self
            .store
            .put(&self.object, payload)
            .await
            .map_err(|e| classify_store_error(e, "put"))?;

        let fingerprint = result
            .e_tag
            .map(Fingerprint)
            .unwrap_or_else(|| Fingerprint::of(data));
        debug!("Stored {} bytes to {} ({})", data.len(), self.location, fingerprint);
        Ok(fingerprint)
    }

    async fn exists(&self) -> Result<bool, StorageError> {
        match self.store.head(&self.object).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(classify_store_error(e, "head")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn adapter() -> GcsAdapter {
        GcsAdapter::from_store(Arc::new(InMemory::new()), "bucket", "dir/app.db")
    }

    #[tokio::test]
    async fn test_fetch_missing_is_none() {
        let adapter = adapter();
        assert_eq!(adapter.fetch().await.unwrap(), None);
        assert!(!adapter.exists().await.unwrap());
        assert!(adapter.describe().await.reachable);
    }

    #[tokio::test]
    async fn test_store_then_fetch() {
        let adapter = adapter();
        let payload = vec![7u8; 1024];
        adapter.store(&payload).await.unwrap();
        assert!(adapter.exists().await.unwrap());
        assert_eq!(adapter.fetch().await.unwrap(), Some(payload));
        assert_eq!(adapter.location(), "gs://bucket/dir/app.db");
    }

    #[test]
    fn test_from_descriptor_requires_credential_file() {
        let descriptor = BackendDescriptor::new(
            BackendKind::CloudObject(CloudProvider::Gcs),
            "gs://bucket/app.db",
            Credentials::None,
        );
        assert!(matches!(
            GcsAdapter::from_descriptor(&descriptor),
            Err(StorageError::Configuration(_))
        ));
    }
}
