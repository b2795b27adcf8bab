use async_trait::async_trait;
use dbfile_storage_core::{
    meta, BackendDescriptor, BackendKind, CloudProvider, Credentials, Fingerprint, RemoteAdapter,
    StorageError,
};
use reqwest::{Client as HttpClient, StatusCode};
use tracing::{debug, instrument};

use crate::classify::classify_status;

/// Vercel Blob REST client for a single named object.
///
/// Uploads `PUT` to the upload URL; downloads `GET` the public or configured
/// download URL. Both carry the read/write token as a bearer.
#[derive(Clone)]
pub struct BlobAdapter {
    http_client: HttpClient,
    upload_url: String,
    download_url: String,
    token: String,
}

impl BlobAdapter {
    pub fn new(
        upload_url: impl Into<String>,
        download_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            upload_url: upload_url.into(),
            download_url: download_url.into(),
            token: token.into(),
        }
    }

    /// Build from a resolved `cloud_object(vercel_blob)` descriptor.
    pub fn from_descriptor(descriptor: &BackendDescriptor) -> Result<Self, StorageError> {
        if descriptor.kind != BackendKind::CloudObject(CloudProvider::VercelBlob) {
            return Err(StorageError::Configuration(format!(
                "Expected a vercel_blob descriptor, got {}",
                descriptor.kind
            )));
        }
        let Credentials::BearerToken(token) = &descriptor.credentials else {
            return Err(StorageError::Configuration(
                "Blob descriptor carries no token".to_string(),
            ));
        };
        let download_url = descriptor
            .metadata(meta::DOWNLOAD_URL)
            .unwrap_or(&descriptor.location);

        Ok(Self::new(&descriptor.location, download_url, token))
    }

    fn transport_error(e: reqwest::Error, action: &str) -> StorageError {
        let message = format!("Blob {} request failed: {}", action, e);
        if e.is_timeout() {
            StorageError::Timeout(message)
        } else if e.is_builder() {
            StorageError::Configuration(message)
        } else {
            StorageError::Transient(message)
        }
    }

    async fn status_error(response: reqwest::Response, action: &str) -> StorageError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        classify_status(
            status.as_u16(),
            format!("Blob {} failed with status {}: {}", action, status, text),
        )
    }
}

impl std::fmt::Debug for BlobAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobAdapter")
            .field("upload_url", &self.upload_url)
            .field("download_url", &self.download_url)
            .finish()
    }
}

#[async_trait]
impl RemoteAdapter for BlobAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::CloudObject(CloudProvider::VercelBlob)
    }

    fn location(&self) -> &str {
        &self.upload_url
    }

    #[instrument(skip(self), fields(url = %self.download_url), level = "debug")]
    async fn fetch(&self) -> Result<Option<Vec<u8>>, StorageError> {
        let response = self
            .http_client
            .get(&self.download_url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "GET"))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("No blob at {}", self.download_url);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Self::status_error(response, "GET").await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::transport_error(e, "GET body"))?;
        debug!("Fetched {} bytes from {}", bytes.len(), self.download_url);
        Ok(Some(bytes.to_vec()))
    }

    #[instrument(skip(self, data), fields(url = %self.upload_url, len = data.len()), level = "debug")]
    async fn store(&self, data: &[u8]) -> Result<Fingerprint, StorageError> {
        let response = self
            .http_client
            .put(&self.upload_url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/octet-stream")
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "PUT"))?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(Self::status_error(response, "PUT").await);
        }

        let fingerprint = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(|tag| Fingerprint(tag.trim_matches('"').to_string()))
            .unwrap_or_else(|| Fingerprint::of(data));
        debug!("Stored {} bytes to {} ({})", data.len(), self.upload_url, fingerprint);
        Ok(fingerprint)
    }

    async fn exists(&self) -> Result<bool, StorageError> {
        let response = self
            .http_client
            .head(&self.download_url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| Self::transport_error(e, "HEAD"))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(Self::status_error(response, "HEAD").await);
        }
        Ok(true)
    }
}
