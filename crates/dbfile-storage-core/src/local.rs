use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, instrument};

use crate::error::StorageError;
use crate::remote::Fingerprint;

/// Sibling of `path` with `suffix` appended to the file name (`app.db` -> `app.db.lock`).
pub fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("db"));
    name.push(suffix);
    path.with_file_name(name)
}

/// The embedded database file on local disk.
///
/// The store treats the file as an opaque blob. It never creates the file on its
/// own: the data-access layer does that, or [`LocalWorkingStore::replace`] installs
/// downloaded bytes.
///
/// Readers and writers coordinate through an advisory lock on a sidecar
/// `<file>.lock`: [`snapshot`](Self::snapshot) takes it shared, while
/// [`replace`](Self::replace) and [`lock_exclusive`](Self::lock_exclusive) take it
/// exclusively. The lock is per open handle, so it also excludes callers inside
/// this process. Do not call `replace` or `snapshot` while holding a guard from
/// `lock_exclusive` on the same thread.
#[derive(Debug, Clone)]
pub struct LocalWorkingStore {
    path: PathBuf,
    lock_path: PathBuf,
}

/// Exclusive hold on the working copy. Released on drop.
#[derive(Debug)]
pub struct WorkingCopyGuard {
    file: File,
}

impl Drop for WorkingCopyGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl LocalWorkingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = sidecar_path(&path, ".lock");
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Size of the working copy in bytes, if it exists.
    pub fn size(&self) -> Option<u64> {
        fs::metadata(&self.path)
            .ok()
            .filter(|m| m.is_file())
            .map(|m| m.len())
    }

    /// SHA-256 of the current file contents, `None` if the file does not exist.
    pub fn checksum(&self) -> Result<Option<Fingerprint>, StorageError> {
        match self.snapshot() {
            Ok(bytes) => Ok(Some(Fingerprint::of(&bytes))),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Read the whole file under a shared lock.
    #[instrument(skip(self), fields(path = %self.path.display()), level = "debug")]
    pub fn snapshot(&self) -> Result<Vec<u8>, StorageError> {
        if !self.exists() {
            return Err(StorageError::NotFound(format!(
                "Working copy {} does not exist",
                self.path.display()
            )));
        }

        let lock = self.open_lock_file()?;
        lock.lock_shared().map_err(|e| {
            StorageError::Lock(format!(
                "Failed to take shared lock on {}: {}",
                self.lock_path.display(),
                e
            ))
        })?;

        let result = fs::read(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(format!(
                "Working copy {} disappeared",
                self.path.display()
            )),
            _ => StorageError::Io(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            )),
        });
        let _ = FileExt::unlock(&lock);

        let bytes = result?;
        debug!("Read {} bytes from working copy", bytes.len());
        Ok(bytes)
    }

    /// Hold the working copy exclusively, e.g. while the data-access layer mutates it.
    ///
    /// Blocks until every shared reader is done.
    pub fn lock_exclusive(&self) -> Result<WorkingCopyGuard, StorageError> {
        self.ensure_parent()?;
        let file = self.open_lock_file()?;
        file.lock_exclusive().map_err(|e| {
            StorageError::Lock(format!(
                "Failed to take exclusive lock on {}: {}",
                self.lock_path.display(),
                e
            ))
        })?;
        Ok(WorkingCopyGuard { file })
    }

    /// Atomically replace the working copy with `data`.
    #[instrument(skip(self, data), fields(path = %self.path.display(), len = data.len()), level = "debug")]
    pub fn replace(&self, data: &[u8]) -> Result<(), StorageError> {
        self.replace_if(data, || true).map(|_| ())
    }

    /// Like [`replace`](Self::replace), but `install` is asked first while the
    /// exclusive lock is held. Returns whether the bytes were installed.
    pub fn replace_if(
        &self,
        data: &[u8],
        install: impl FnOnce() -> bool,
    ) -> Result<bool, StorageError> {
        let _guard = self.lock_exclusive()?;
        if !install() {
            debug!("Replacement of {} declined", self.path.display());
            return Ok(false);
        }

        let temp_path = sidecar_path(&self.path, ".sync.tmp");
        fs::write(&temp_path, data).map_err(|e| {
            StorageError::Io(format!(
                "Failed to write temp file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            StorageError::Io(format!(
                "Failed to rename temp file to {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!("Installed {} bytes as working copy", data.len());
        Ok(true)
    }

    fn ensure_parent(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::Io(format!(
                    "Failed to create parent directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    fn open_lock_file(&self) -> Result<File, StorageError> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| {
                StorageError::Io(format!(
                    "Failed to open lock file {}: {}",
                    self.lock_path.display(),
                    e
                ))
            })
    }
}
