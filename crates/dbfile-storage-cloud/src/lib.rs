//! Cloud object storage backends.
//!
//! One adapter per provider, all implementing `RemoteAdapter`:
//! - `S3Adapter`: AWS S3 and S3-compatible stores (aws-sdk-s3)
//! - `GcsAdapter`: Google Cloud Storage (object_store)
//! - `BlobAdapter`: Vercel Blob REST API (reqwest)

mod blob;
mod classify;
mod gcs;
mod s3;

use std::sync::Arc;

use dbfile_storage_core::{BackendDescriptor, CloudProvider, RemoteAdapter, StorageError};

pub use blob::BlobAdapter;
pub use gcs::GcsAdapter;
pub use s3::S3Adapter;

/// Build the adapter for a `cloud_object` descriptor.
pub fn cloud_adapter(
    descriptor: &BackendDescriptor,
) -> Result<Arc<dyn RemoteAdapter>, StorageError> {
    let provider = descriptor.kind.provider().ok_or_else(|| {
        StorageError::Configuration(format!(
            "{} is not a cloud object backend",
            descriptor.kind
        ))
    })?;

    let adapter: Arc<dyn RemoteAdapter> = match provider {
        CloudProvider::S3 => Arc::new(S3Adapter::from_descriptor(descriptor)?),
        CloudProvider::Gcs => Arc::new(GcsAdapter::from_descriptor(descriptor)?),
        CloudProvider::VercelBlob => Arc::new(BlobAdapter::from_descriptor(descriptor)?),
    };
    Ok(adapter)
}
