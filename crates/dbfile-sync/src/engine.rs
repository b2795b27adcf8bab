use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dbfile_storage_core::{
    BackendDescriptor, Fingerprint, LocalWorkingStore, RemoteAdapter, StorageError,
};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::retry::{retry, RetryPolicy};
use crate::state::{
    EngineState, SyncAction, SyncOperation, SyncOutcome, SyncReport, SyncState,
};

/// Tuning knobs for the engine.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub retry: RetryPolicy,
    /// Bound on the whole startup download, retries included.
    pub startup_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::remote(),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

struct Shared {
    state: EngineState,
    sync: SyncState,
    /// Bumped on every committed write; an upload only clears `dirty` if no
    /// write arrived while it ran.
    generation: u64,
    /// The remote copy has been loaded (or found empty) at least once.
    remote_loaded: bool,
}

struct Inner {
    descriptor: BackendDescriptor,
    store: LocalWorkingStore,
    remote: Option<Arc<dyn RemoteAdapter>>,
    options: SyncOptions,
    shared: Mutex<Shared>,
    idle: Notify,
}

/// Single-flight marker. Whoever holds it owns the transfer; it is released
/// together with the final state update so no write can slip between them.
struct InFlight {
    inner: Arc<Inner>,
    released: bool,
}

impl InFlight {
    /// The caller already cleared `sync_in_progress` while holding the lock.
    fn disarm(mut self) {
        self.released = true;
        self.inner.idle.notify_waiters();
    }

    fn release(mut self, update: impl FnOnce(&mut Shared)) {
        {
            let mut shared = self.inner.shared.lock();
            update(&mut shared);
            shared.sync.sync_in_progress = false;
        }
        self.released = true;
        self.inner.idle.notify_waiters();
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.released {
            // Task was cancelled or panicked mid-transfer.
            {
                let mut shared = self.inner.shared.lock();
                shared.sync.sync_in_progress = false;
                if matches!(
                    shared.state,
                    EngineState::SyncingDown | EngineState::SyncingUp
                ) {
                    shared.state = EngineState::Degraded;
                }
            }
            self.inner.idle.notify_waiters();
        }
    }
}

/// Keeps the local working copy and the remote copy consistent.
///
/// Cheap to clone; all clones drive the same engine. At most one transfer runs
/// at a time per engine.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

impl SyncEngine {
    pub fn new(
        descriptor: BackendDescriptor,
        store: LocalWorkingStore,
        remote: Option<Arc<dyn RemoteAdapter>>,
        options: SyncOptions,
    ) -> Self {
        let sync = SyncState::new(store.path().to_path_buf());
        Self {
            inner: Arc::new(Inner {
                descriptor,
                store,
                remote,
                options,
                shared: Mutex::new(Shared {
                    state: EngineState::Cold,
                    sync,
                    generation: 0,
                    remote_loaded: false,
                }),
                idle: Notify::new(),
            }),
        }
    }

    pub fn descriptor(&self) -> &BackendDescriptor {
        &self.inner.descriptor
    }

    pub fn local_store(&self) -> &LocalWorkingStore {
        &self.inner.store
    }

    pub fn remote(&self) -> Option<&Arc<dyn RemoteAdapter>> {
        self.inner.remote.as_ref()
    }

    pub fn state(&self) -> EngineState {
        self.inner.shared.lock().state
    }

    pub fn sync_state(&self) -> SyncState {
        self.inner.shared.lock().sync.clone()
    }

    pub fn is_sync_in_progress(&self) -> bool {
        self.inner.shared.lock().sync.sync_in_progress
    }

    /// Populate the working copy from the remote before serving requests.
    ///
    /// Never fails: a download that errors or exceeds the startup timeout
    /// leaves the engine `DEGRADED` and the process keeps going.
    #[instrument(skip(self), fields(backend = %self.inner.descriptor.kind), level = "debug")]
    pub async fn start(&self) -> SyncReport {
        if !self.inner.descriptor.kind.needs_sync() {
            {
                let mut shared = self.inner.shared.lock();
                shared.state = EngineState::Ready;
                shared.remote_loaded = true;
            }
            info!(
                "Storage backend {} keeps no remote copy, ready",
                self.inner.descriptor.kind
            );
            return self.report(SyncAction::LocalOnly);
        }

        let Some(guard) = self.try_begin() else {
            return self.report(SyncAction::InFlight);
        };
        let Some(remote) = self.inner.remote.clone() else {
            let message = format!(
                "No adapter available for {}",
                self.inner.descriptor.kind
            );
            warn!("{}, starting degraded", message);
            guard.release(|shared| {
                shared.state = EngineState::Degraded;
                shared.sync.last_error = Some(message.clone());
                shared.sync.last_outcome =
                    Some(SyncOutcome::failed(SyncOperation::Download, message.clone()));
            });
            return self.report(SyncAction::Failed { error: message });
        };

        info!("Downloading working copy from {}", remote.location());
        let result = match timeout(
            self.inner.options.startup_timeout,
            self.download(&remote, SyncOperation::Download, &guard),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(StorageError::Timeout(format!(
                "Startup download exceeded {:?}",
                self.inner.options.startup_timeout
            ))),
        };

        match self.finish_download(guard, SyncOperation::Download, result) {
            Ok(report) => report,
            Err(e) => {
                warn!("Startup download failed, serving in degraded mode: {}", e);
                self.report(SyncAction::Failed {
                    error: e.to_string(),
                })
            }
        }
    }

    /// Hook for the data-access layer after every committed mutation.
    ///
    /// Marks the working copy dirty and schedules a background upload unless one
    /// is already running, in which case the running one picks up this write.
    /// Call it before releasing the working copy's exclusive lock, so a
    /// concurrent download sees the write before deciding to install.
    pub fn on_write_committed(&self) {
        if !self.inner.descriptor.kind.needs_sync() || self.inner.remote.is_none() {
            return;
        }

        let guard = {
            let mut shared = self.inner.shared.lock();
            shared.sync.dirty = true;
            shared.generation += 1;
            if shared.sync.sync_in_progress {
                debug!("Write coalesced into the running sync");
                None
            } else {
                shared.sync.sync_in_progress = true;
                Some(InFlight {
                    inner: self.inner.clone(),
                    released: false,
                })
            }
        };

        if let Some(guard) = guard {
            self.spawn_upload(guard);
        }
    }

    fn spawn_upload(&self, guard: InFlight) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let engine = self.clone();
                handle.spawn(async move {
                    if let Err(e) = engine.upload(guard).await {
                        warn!("Background upload failed: {}", e);
                    }
                });
            }
            Err(_) => {
                warn!("No async runtime available, upload deferred to the next sync");
                drop(guard);
            }
        }
    }

    /// Manual sync: upload if dirty, otherwise a no-op success.
    ///
    /// When the startup download never succeeded and nothing is dirty, the
    /// download is retried instead. Returns immediately if a sync is running.
    #[instrument(skip(self), level = "debug")]
    pub async fn sync_now(&self) -> Result<SyncReport, StorageError> {
        if !self.inner.descriptor.kind.needs_sync() {
            return Ok(self.report(SyncAction::LocalOnly));
        }
        let Some(remote) = self.inner.remote.clone() else {
            return Err(StorageError::Configuration(format!(
                "No adapter available for {}",
                self.inner.descriptor.kind
            )));
        };
        let Some(guard) = self.try_begin() else {
            debug!("Sync requested while another is running");
            return Ok(self.report(SyncAction::InFlight));
        };

        let (dirty, remote_loaded) = {
            let shared = self.inner.shared.lock();
            (shared.sync.dirty, shared.remote_loaded)
        };

        if dirty {
            self.upload(guard).await
        } else if !remote_loaded {
            info!("Retrying download from {}", remote.location());
            let result = self.download(&remote, SyncOperation::Download, &guard).await;
            self.finish_download(guard, SyncOperation::Download, result)
        } else {
            guard.release(|shared| shared.state = EngineState::Ready);
            let report = self.report(SyncAction::UpToDate);
            self.schedule_pending_upload();
            Ok(report)
        }
    }

    /// Replace the working copy with the remote object regardless of local state.
    ///
    /// Repair path for a working copy the data-access layer cannot read.
    #[instrument(skip(self), level = "debug")]
    pub async fn force_refetch(&self) -> Result<SyncReport, StorageError> {
        if !self.inner.descriptor.kind.needs_sync() {
            return Err(StorageError::Configuration(format!(
                "Backend {} keeps no remote copy to re-fetch",
                self.inner.descriptor.kind
            )));
        }
        let Some(remote) = self.inner.remote.clone() else {
            return Err(StorageError::Configuration(format!(
                "No adapter available for {}",
                self.inner.descriptor.kind
            )));
        };
        let Some(guard) = self.try_begin() else {
            return Ok(self.report(SyncAction::InFlight));
        };

        warn!("Re-fetching working copy from {}", remote.location());
        let result = self.download(&remote, SyncOperation::Refetch, &guard).await;
        self.finish_download(guard, SyncOperation::Refetch, result)
    }

    /// Wait for the running sync, then push pending changes, all within `deadline`.
    pub async fn shutdown(&self, deadline: Duration) {
        if !self.inner.descriptor.kind.needs_sync() {
            return;
        }

        let final_sync = async {
            loop {
                self.wait_idle().await;
                if !self.inner.shared.lock().sync.dirty {
                    return Ok(None);
                }
                match self.sync_now().await {
                    Ok(report) if report.action == SyncAction::InFlight => continue,
                    other => return other.map(Some),
                }
            }
        };

        match timeout(deadline, final_sync).await {
            Ok(Ok(Some(report))) => info!("Final sync done: {:?}", report.action),
            Ok(Ok(None)) => debug!("Nothing to sync at shutdown"),
            Ok(Err(e)) => warn!("Final sync failed, local changes may be lost: {}", e),
            Err(_) => warn!(
                "Final sync did not finish within {:?}, local changes may be lost",
                deadline
            ),
        }
    }

    /// Resolve once no sync is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.is_sync_in_progress() {
                return;
            }
            notified.await;
        }
    }

    /// Writes coalesced into a download still need an upload of their own.
    fn schedule_pending_upload(&self) {
        let guard = {
            let mut shared = self.inner.shared.lock();
            if !shared.sync.dirty || shared.sync.sync_in_progress {
                return;
            }
            shared.sync.sync_in_progress = true;
            InFlight {
                inner: self.inner.clone(),
                released: false,
            }
        };
        self.spawn_upload(guard);
    }

    fn try_begin(&self) -> Option<InFlight> {
        let mut shared = self.inner.shared.lock();
        if shared.sync.sync_in_progress {
            return None;
        }
        shared.sync.sync_in_progress = true;
        Some(InFlight {
            inner: self.inner.clone(),
            released: false,
        })
    }

    /// Fetch the remote object and install it. The guard proves we own the transfer.
    ///
    /// Returns the action and the write generation the working copy reflects.
    /// A plain download never installs over a write committed since it began;
    /// a refetch always does.
    async fn download(
        &self,
        remote: &Arc<dyn RemoteAdapter>,
        operation: SyncOperation,
        _guard: &InFlight,
    ) -> Result<(SyncAction, u64), StorageError> {
        let started = {
            let mut shared = self.inner.shared.lock();
            shared.state = EngineState::SyncingDown;
            shared.generation
        };

        let fetched = retry("download", &self.inner.options.retry, || remote.fetch()).await?;
        let Some(bytes) = fetched else {
            info!("No remote copy at {} yet, starting fresh", remote.location());
            return Ok((SyncAction::RemoteEmpty, started));
        };

        let len = bytes.len() as u64;
        let fingerprint = Fingerprint::of(&bytes);
        let store = self.inner.store.clone();
        let inner = self.inner.clone();
        let overwrite_local = operation == SyncOperation::Refetch;
        let (installed, seen) = tokio::task::spawn_blocking(move || {
            let mut seen = started;
            // Checked under the working-copy lock, which writers hold while mutating.
            let installed = store.replace_if(&bytes, || {
                seen = inner.shared.lock().generation;
                overwrite_local || seen == started
            })?;
            Ok::<_, StorageError>((installed, seen))
        })
        .await
        .map_err(|e| StorageError::Internal(format!("Install task failed: {}", e)))??;

        if !installed {
            info!(
                "Local writes landed during download from {}, keeping them",
                remote.location()
            );
            return Ok((SyncAction::LocalNewer, seen));
        }

        self.inner.shared.lock().sync.remote_fingerprint = Some(fingerprint);
        info!("Installed {} bytes from {}", len, remote.location());
        Ok((SyncAction::Downloaded { bytes: len }, seen))
    }

    fn finish_download(
        &self,
        guard: InFlight,
        operation: SyncOperation,
        result: Result<(SyncAction, u64), StorageError>,
    ) -> Result<SyncReport, StorageError> {
        match result {
            Ok((action, seen)) => {
                guard.release(|shared| {
                    shared.state = EngineState::Ready;
                    shared.remote_loaded = true;
                    if matches!(action, SyncAction::Downloaded { .. }) {
                        shared.sync.last_synced_at = Some(Utc::now());
                        // Local copy equals the remote unless a write landed after install.
                        if shared.generation == seen {
                            shared.sync.dirty = false;
                        }
                    }
                    shared.sync.last_error = None;
                    shared.sync.last_outcome = Some(SyncOutcome::succeeded(operation));
                });
                let report = self.report(action);
                self.schedule_pending_upload();
                Ok(report)
            }
            Err(e) => {
                let message = e.to_string();
                guard.release(|shared| {
                    shared.state = EngineState::Degraded;
                    shared.sync.last_error = Some(message.clone());
                    shared.sync.last_outcome = Some(SyncOutcome::failed(operation, message));
                });
                Err(e)
            }
        }
    }

    /// Upload the latest working copy until no write arrived during the transfer.
    async fn upload(&self, guard: InFlight) -> Result<SyncReport, StorageError> {
        let Some(remote) = self.inner.remote.clone() else {
            guard.release(|_| {});
            return Err(StorageError::Internal("upload without adapter".to_string()));
        };

        loop {
            let generation = {
                let mut shared = self.inner.shared.lock();
                shared.state = EngineState::SyncingUp;
                shared.generation
            };

            match self.upload_once(&remote).await {
                Ok((fingerprint, bytes)) => {
                    // Clearing dirty and releasing happen under one lock, so a write
                    // either lands before (and we go again) or starts its own upload.
                    let done = {
                        let mut shared = self.inner.shared.lock();
                        shared.sync.remote_fingerprint = Some(fingerprint.clone());
                        shared.sync.last_synced_at = Some(Utc::now());
                        shared.sync.last_error = None;
                        shared.sync.last_outcome =
                            Some(SyncOutcome::succeeded(SyncOperation::Upload));
                        shared.remote_loaded = true;
                        if shared.generation == generation {
                            shared.sync.dirty = false;
                            shared.sync.sync_in_progress = false;
                            shared.state = EngineState::Ready;
                            true
                        } else {
                            false
                        }
                    };
                    if !done {
                        debug!("Writes arrived during upload, uploading again");
                        continue;
                    }

                    guard.disarm();
                    info!("Uploaded {} bytes to {}", bytes, remote.location());
                    return Ok(self.report(SyncAction::Uploaded { fingerprint, bytes }));
                }
                Err(e) => {
                    let message = e.to_string();
                    guard.release(|shared| {
                        shared.state = EngineState::Degraded;
                        shared.sync.last_error = Some(message.clone());
                        shared.sync.last_outcome =
                            Some(SyncOutcome::failed(SyncOperation::Upload, message));
                    });
                    warn!("Upload to {} failed: {}", remote.location(), e);
                    return Err(e);
                }
            }
        }
    }

    async fn upload_once(
        &self,
        remote: &Arc<dyn RemoteAdapter>,
    ) -> Result<(Fingerprint, u64), StorageError> {
        // Read into memory first so no local lock is held across network I/O.
        let store = self.inner.store.clone();
        let bytes = tokio::task::spawn_blocking(move || store.snapshot())
            .await
            .map_err(|e| StorageError::Internal(format!("Snapshot task failed: {}", e)))??;

        let fingerprint =
            retry("upload", &self.inner.options.retry, || remote.store(&bytes)).await?;
        Ok((fingerprint, bytes.len() as u64))
    }

    fn report(&self, action: SyncAction) -> SyncReport {
        let shared = self.inner.shared.lock();
        SyncReport {
            action,
            state: shared.state,
            sync: shared.sync.clone(),
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("SyncEngine")
            .field("backend", &self.inner.descriptor.kind)
            .field("state", &shared.state)
            .field("dirty", &shared.sync.dirty)
            .finish()
    }
}
