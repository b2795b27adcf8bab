//! Synchronization between the local working copy and its durable remote.
//!
//! `SyncEngine` owns the state machine (COLD, SYNCING_DOWN, READY, SYNCING_UP,
//! DEGRADED) and the single-flight discipline; `StatusReporter` turns its state
//! into a serializable snapshot.

mod engine;
mod retry;
mod state;
mod status;

pub use engine::{SyncEngine, SyncOptions};
pub use retry::{retry, RetryPolicy};
pub use state::{EngineState, SyncAction, SyncOperation, SyncOutcome, SyncReport, SyncState};
pub use status::{LocalFileInfo, StatusReporter, StatusSnapshot};
