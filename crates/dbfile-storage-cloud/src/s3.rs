use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials as S3Credentials};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use dbfile_storage_core::{
    meta, parse_object_uri, BackendDescriptor, BackendKind, CloudProvider, Credentials,
    Fingerprint, RemoteAdapter, StorageError,
};
use tracing::{debug, instrument};

use crate::classify::classify_status;

/// S3 (or S3-compatible) object holding the database file.
///
/// With a custom endpoint (MinIO, R2) requests use path-style addressing.
#[derive(Clone)]
pub struct S3Adapter {
    s3_client: S3Client,
    bucket: String,
    key: String,
    location: String,
}

impl S3Adapter {
    pub fn new(s3_client: S3Client, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let key = key.into();
        let location = format!("s3://{}/{}", bucket, key);
        Self {
            s3_client,
            bucket,
            key,
            location,
        }
    }

    /// Build the client from a resolved `cloud_object(s3)` descriptor.
    pub fn from_descriptor(descriptor: &BackendDescriptor) -> Result<Self, StorageError> {
        if descriptor.kind != BackendKind::CloudObject(CloudProvider::S3) {
            return Err(StorageError::Configuration(format!(
                "Expected an s3 descriptor, got {}",
                descriptor.kind
            )));
        }

        let Credentials::AccessKey {
            access_key_id,
            secret_access_key,
        } = &descriptor.credentials
        else {
            return Err(StorageError::Configuration(
                "S3 descriptor carries no access key".to_string(),
            ));
        };

        let (bucket, key) = match (
            descriptor.metadata(meta::BUCKET),
            descriptor.metadata(meta::KEY),
        ) {
            (Some(bucket), Some(key)) => (bucket, key),
            _ => parse_object_uri(&descriptor.location, "s3").ok_or_else(|| {
                StorageError::Configuration(format!(
                    "Invalid S3 location: {}",
                    descriptor.location
                ))
            })?,
        };

        let credentials = S3Credentials::new(access_key_id, secret_access_key, None, None, "env");
        let region = descriptor.metadata(meta::REGION).unwrap_or("us-east-1");

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.to_string()))
            // The sync engine owns retries.
            .retry_config(RetryConfig::disabled());
        if let Some(endpoint) = descriptor.metadata(meta::ENDPOINT) {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        let s3_client = S3Client::from_conf(builder.build());
        Ok(Self::new(s3_client, bucket, key))
    }
}

impl std::fmt::Debug for S3Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Adapter")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .finish()
    }
}

fn classify_sdk_error<E>(err: &SdkError<E, HttpResponse>, action: &str) -> StorageError
where
    E: std::error::Error + 'static,
{
    let message = format!("S3 {} failed: {}", action, DisplayErrorContext(err));
    match err {
        SdkError::TimeoutError(_) => StorageError::Timeout(message),
        SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StorageError::Transient(message)
        }
        SdkError::ConstructionFailure(_) => StorageError::Configuration(message),
        SdkError::ServiceError(ctx) => classify_status(ctx.raw().status().as_u16(), message),
        _ => StorageError::Transient(message),
    }
}

#[async_trait]
impl RemoteAdapter for S3Adapter {
    fn kind(&self) -> BackendKind {
        BackendKind::CloudObject(CloudProvider::S3)
    }

    fn location(&self) -> &str {
        &self.location
    }

    #[instrument(skip(self), fields(location = %self.location), level = "debug")]
    async fn fetch(&self) -> Result<Option<Vec<u8>>, StorageError> {
        let result = self
            .s3_client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| {
                        StorageError::Transient(format!("Failed to read S3 object body: {}", e))
                    })?
                    .into_bytes();
                debug!("Fetched {} bytes from {}", bytes.len(), self.location);
                Ok(Some(bytes.to_vec()))
            }
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    debug!("No object at {}", self.location);
                    Ok(None)
                } else {
                    Err(classify_sdk_error(&e, "get_object"))
                }
            }
        }
    }

    #[instrument(skip(self, data), fields(location = %self.location, len = data.len()), level = "debug")]
    async fn store(&self, data: &[u8]) -> Result<Fingerprint, StorageError> {
        let output = self
            .s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .content_type("application/octet-stream")
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e, "put_object"))?;

        let fingerprint = output
            .e_tag()
            .map(|tag| Fingerprint(tag.trim_matches('"').to_string()))
            .unwrap_or_else(|| Fingerprint::of(data));
        debug!("Stored {} bytes to {} ({})", data.len(), self.location, fingerprint);
        Ok(fingerprint)
    }

    async fn exists(&self) -> Result<bool, StorageError> {
        let result = self
            .s3_client
            .head_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(classify_sdk_error(&e, "head_object")),
        }
    }
}
