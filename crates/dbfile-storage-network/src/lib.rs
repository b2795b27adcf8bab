//! Network-mounted path backend.
//!
//! The durable copy is a plain file on a mounted share (NFS, SMB, a platform
//! volume). Uploads write a temp sibling and rename it over the target while
//! holding an exclusive lock on `<file>.lock`, so readers on other hosts never
//! see a half-written file.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dbfile_storage_core::{
    sidecar_path, BackendDescriptor, BackendKind, Fingerprint, RemoteAdapter, RemoteDescription,
    StorageError,
};
use fs2::FileExt;
use tokio::fs;
use tracing::{debug, instrument};

/// Remote adapter for a file on a mounted filesystem.
#[derive(Debug, Clone)]
pub struct NetworkPathAdapter {
    path: PathBuf,
    location: String,
}

impl NetworkPathAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let location = path.to_string_lossy().into_owned();
        Self { path, location }
    }

    /// Build from a resolved descriptor of kind [`BackendKind::NetworkPath`].
    pub fn from_descriptor(descriptor: &BackendDescriptor) -> Result<Self, StorageError> {
        if descriptor.kind != BackendKind::NetworkPath {
            return Err(StorageError::Configuration(format!(
                "Expected a network_path descriptor, got {}",
                descriptor.kind
            )));
        }
        Ok(Self::new(&descriptor.location))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Map an I/O failure on the share to a storage error category.
fn classify_io(e: std::io::Error, action: &str, path: &Path) -> StorageError {
    let message = format!("Failed to {} {}: {}", action, path.display(), e);
    match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound(message),
        ErrorKind::PermissionDenied => StorageError::Auth(message),
        ErrorKind::WouldBlock => StorageError::Lock(message),
        // Stale handles, interrupted mounts and the like.
        _ => StorageError::Transient(message),
    }
}

fn write_locked(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let lock_path = sidecar_path(path, ".lock");
    let lock = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| classify_io(e, "open lock file", &lock_path))?;

    match lock.try_lock_exclusive() {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::WouldBlock => {
            return Err(StorageError::Lock(format!(
                "{} is locked by another writer",
                path.display()
            )));
        }
        Err(e) => return Err(classify_io(e, "lock", &lock_path)),
    }

    let temp_path = sidecar_path(path, ".sync.tmp");
    let result = (|| {
        let mut file = std::fs::File::create(&temp_path)
            .map_err(|e| classify_io(e, "create temp file", &temp_path))?;
        file.write_all(data)
            .map_err(|e| classify_io(e, "write temp file", &temp_path))?;
        file.sync_all()
            .map_err(|e| classify_io(e, "flush temp file", &temp_path))?;
        std::fs::rename(&temp_path, path).map_err(|e| classify_io(e, "rename temp file to", path))
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    let _ = FileExt::unlock(&lock);
    result
}

#[async_trait]
impl RemoteAdapter for NetworkPathAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::NetworkPath
    }

    fn location(&self) -> &str {
        &self.location
    }

    #[instrument(skip(self), fields(path = %self.location), level = "debug")]
    async fn fetch(&self) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(&self.path).await {
            Ok(bytes) => {
                debug!("Read {} bytes from {}", bytes.len(), self.location);
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No file at {}", self.location);
                Ok(None)
            }
            Err(e) => Err(classify_io(e, "read", &self.path)),
        }
    }

    #[instrument(skip(self, data), fields(path = %self.location, len = data.len()), level = "debug")]
    async fn store(&self, data: &[u8]) -> Result<Fingerprint, StorageError> {
        let path = self.path.clone();
        let bytes = data.to_vec();
        let fingerprint = Fingerprint::of(&bytes);

        tokio::task::spawn_blocking(move || write_locked(&path, &bytes))
            .await
            .map_err(|e| StorageError::Internal(format!("Store task failed: {}", e)))??;

        debug!("Stored {} bytes to {}", data.len(), self.location);
        Ok(fingerprint)
    }

    async fn exists(&self) -> Result<bool, StorageError> {
        fs::try_exists(&self.path)
            .await
            .map_err(|e| classify_io(e, "stat", &self.path))
    }

    async fn describe(&self) -> RemoteDescription {
        let reachable = fs::metadata(self.parent())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        RemoteDescription {
            kind: self.kind(),
            location: self.location.clone(),
            reachable,
        }
    }
}
