use std::time::Duration;

use clap::Parser;
use dbfile_sync::{RetryPolicy, SyncOptions};

/// Server knobs. Storage backend signals are read separately into a `ConfigSnapshot`.
#[derive(Parser, Debug, Clone)]
#[command(name = "dbfile-server")]
#[command(about = "Storage status and admin sync endpoints for an embedded database file")]
pub struct Config {
    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "STORAGE_HOST")]
    pub host: String,

    /// Port to bind to
    #[arg(long, default_value = "8080", env = "STORAGE_PORT")]
    pub port: u16,

    /// Bearer token for the admin endpoints (disabled when unset)
    #[arg(long, env = "STORAGE_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Bound on the startup download, retries included
    #[arg(long, default_value = "30", env = "STORAGE_STARTUP_TIMEOUT_SECS")]
    pub startup_timeout_secs: u64,

    /// Bound on the final sync at shutdown
    #[arg(long, default_value = "10", env = "STORAGE_SHUTDOWN_DEADLINE_SECS")]
    pub shutdown_deadline_secs: u64,

    /// Bound on each single remote operation
    #[arg(long, default_value = "60", env = "STORAGE_OPERATION_TIMEOUT_SECS")]
    pub operation_timeout_secs: u64,

    /// Attempts per remote operation for transient failures
    #[arg(long, default_value = "3", env = "STORAGE_RETRY_ATTEMPTS")]
    pub retry_attempts: usize,
}

impl Config {
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            retry: RetryPolicy::remote()
                .with_max_attempts(self.retry_attempts)
                .with_attempt_timeout(Duration::from_secs(self.operation_timeout_secs)),
            startup_timeout: Duration::from_secs(self.startup_timeout_secs),
        }
    }

    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_secs(self.shutdown_deadline_secs)
    }
}
