use std::sync::Arc;

use dbfile_storage_cloud::cloud_adapter;
use dbfile_storage_core::{BackendDescriptor, BackendKind, RemoteAdapter, StorageError};
use dbfile_storage_network::NetworkPathAdapter;

/// Build the remote adapter for a resolved descriptor.
///
/// `None` for kinds that keep no remote copy.
pub fn adapter_for(
    descriptor: &BackendDescriptor,
) -> Result<Option<Arc<dyn RemoteAdapter>>, StorageError> {
    let adapter: Arc<dyn RemoteAdapter> = match descriptor.kind {
        BackendKind::None | BackendKind::RelationalPassthrough => return Ok(None),
        BackendKind::NetworkPath => Arc::new(NetworkPathAdapter::from_descriptor(descriptor)?),
        BackendKind::CloudObject(_) => cloud_adapter(descriptor)?,
    };
    Ok(Some(adapter))
}
