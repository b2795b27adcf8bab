use std::path::PathBuf;

use chrono::{DateTime, Utc};
use dbfile_storage_core::{BackendKind, CloudProvider, Fingerprint};
use serde::Serialize;

use crate::engine::SyncEngine;
use crate::state::{EngineState, SyncOutcome};

/// The working copy as seen on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalFileInfo {
    pub path: PathBuf,
    pub exists: bool,
    pub size_bytes: Option<u64>,
}

/// Point-in-time view of the persistence layer, served by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// `none`, `network_path`, `cloud_object` or `relational_passthrough`.
    pub backend_kind: String,
    pub provider: Option<CloudProvider>,
    pub location: Option<String>,
    /// Whether data survives an environment reset. Always false for `none`.
    pub persistent: bool,
    pub state: EngineState,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub dirty: bool,
    pub sync_in_progress: bool,
    /// Result of probing the remote copy. `None` for backends that mirror
    /// nothing (`none`, `relational_passthrough`).
    pub reachable: Option<bool>,
    pub remote_fingerprint: Option<Fingerprint>,
    pub last_error: Option<String>,
    pub last_outcome: Option<SyncOutcome>,
    /// Absent for relational passthrough, which has no working file.
    pub local: Option<LocalFileInfo>,
}

/// Builds [`StatusSnapshot`]s from the engine on demand.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    engine: SyncEngine,
}

impl StatusReporter {
    pub fn new(engine: SyncEngine) -> Self {
        Self { engine }
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        let descriptor = self.engine.descriptor();
        let kind = descriptor.kind;

        // Probe before reading state so the snapshot reflects the latest transfer.
        let reachable = match self.engine.remote() {
            Some(remote) => Some(remote.describe().await.reachable),
            None => None,
        };
        let state = self.engine.state();
        let sync = self.engine.sync_state();

        let local = match kind {
            BackendKind::RelationalPassthrough => None,
            _ => {
                let store = self.engine.local_store();
                Some(LocalFileInfo {
                    path: store.path().to_path_buf(),
                    exists: store.exists(),
                    size_bytes: store.size(),
                })
            }
        };

        StatusSnapshot {
            backend_kind: kind.label().to_string(),
            provider: kind.provider(),
            location: Some(descriptor.location.clone()).filter(|l| !l.is_empty()),
            persistent: kind.is_persistent(),
            state,
            last_synced_at: sync.last_synced_at,
            dirty: sync.dirty,
            sync_in_progress: sync.sync_in_progress,
            reachable,
            remote_fingerprint: sync.remote_fingerprint,
            last_error: sync.last_error,
            last_outcome: sync.last_outcome,
            local,
        }
    }
}
