//! Core types for embedded database file persistence.
//!
//! This crate defines what the adapters and the sync engine share:
//! - `ConfigSnapshot`: configuration signals captured once at startup
//! - `resolve`: picks exactly one `BackendDescriptor` from those signals
//! - `RemoteAdapter`: whole-object fetch/store against a durable location
//! - `LocalWorkingStore`: the on-disk working copy and its sidecar lock

mod config;
mod descriptor;
mod error;
mod local;
mod remote;
mod resolver;

pub use config::{keys, ConfigSnapshot, DEFAULT_BUCKET, DEFAULT_DB_FILE_NAME};
pub use descriptor::{
    meta, parse_object_uri, BackendDescriptor, BackendKind, CloudProvider, Credentials,
};
pub use error::StorageError;
pub use local::{sidecar_path, LocalWorkingStore, WorkingCopyGuard};
pub use remote::{Fingerprint, RemoteAdapter, RemoteDescription};
pub use resolver::{resolve, resolve_with, FsProbe, Probe, VERCEL_BLOB_API};
