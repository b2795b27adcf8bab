use std::path::PathBuf;

use chrono::{DateTime, Utc};
use dbfile_storage_core::Fingerprint;
use serde::Serialize;

/// Lifecycle of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineState {
    /// Created, `start()` not called yet.
    Cold,
    /// Populating the working copy from the remote.
    SyncingDown,
    Ready,
    /// Pushing the working copy to the remote.
    SyncingUp,
    /// The last transfer failed. Never terminal: the next write or manual sync retries.
    Degraded,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            EngineState::Cold => "COLD",
            EngineState::SyncingDown => "SYNCING_DOWN",
            EngineState::Ready => "READY",
            EngineState::SyncingUp => "SYNCING_UP",
            EngineState::Degraded => "DEGRADED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Download,
    Upload,
    Refetch,
}

/// Result of the most recent transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub operation: SyncOperation,
    pub success: bool,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncOutcome {
    pub(crate) fn succeeded(operation: SyncOperation) -> Self {
        Self {
            operation,
            success: true,
            at: Utc::now(),
            error: None,
        }
    }

    pub(crate) fn failed(operation: SyncOperation, error: String) -> Self {
        Self {
            operation,
            success: false,
            at: Utc::now(),
            error: Some(error),
        }
    }
}

/// Bookkeeping for the working copy versus its remote counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncState {
    pub local_path: PathBuf,
    pub remote_fingerprint: Option<Fingerprint>,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Local file changed since the last successful upload.
    pub dirty: bool,
    pub sync_in_progress: bool,
    pub last_error: Option<String>,
    pub last_outcome: Option<SyncOutcome>,
}

impl SyncState {
    pub(crate) fn new(local_path: PathBuf) -> Self {
        Self {
            local_path,
            remote_fingerprint: None,
            last_synced_at: None,
            dirty: false,
            sync_in_progress: false,
            last_error: None,
            last_outcome: None,
        }
    }
}

/// What a sync request did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    Uploaded { fingerprint: Fingerprint, bytes: u64 },
    Downloaded { bytes: u64 },
    /// The remote holds no object yet; the working copy was left as is.
    RemoteEmpty,
    /// A write landed while downloading; the remote copy was not installed and
    /// the local copy is queued for upload instead.
    LocalNewer,
    /// Nothing to upload.
    UpToDate,
    /// Another sync was already running; this request did nothing.
    InFlight,
    /// The backend keeps no remote copy.
    LocalOnly,
    /// Startup only: the download failed and the engine is degraded.
    Failed { error: String },
}

/// Returned by manual sync operations: the action plus the resulting state.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    #[serde(flatten)]
    pub action: SyncAction,
    pub state: EngineState,
    pub sync: SyncState,
}
