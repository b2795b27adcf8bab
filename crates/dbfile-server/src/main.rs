//! Standalone storage server.
//!
//! On start it:
//! - Captures the storage signals and resolves exactly one backend
//! - Downloads the working copy before accepting requests
//! - Serves the status and admin sync endpoints
//! - Pushes pending changes on shutdown, bounded by a deadline

use std::sync::Arc;

use clap::Parser;
use dbfile_server::auth::AdminToken;
use dbfile_server::backends::adapter_for;
use dbfile_server::config::Config;
use dbfile_server::{router, AppState};
use dbfile_storage_core::{resolve, ConfigSnapshot, LocalWorkingStore};
use dbfile_sync::SyncEngine;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    info!("Starting dbfile-server v{}", env!("CARGO_PKG_VERSION"));
    info!("  Host: {}", config.host);
    info!("  Port: {}", config.port);

    let snapshot = ConfigSnapshot::from_env();
    let descriptor = resolve(&snapshot);
    let working_path = snapshot.working_path();
    info!("  Backend: {}", descriptor.kind);
    info!("  Persistent: {}", descriptor.kind.is_persistent());
    info!("  Working copy: {}", working_path.display());

    let remote = match adapter_for(&descriptor) {
        Ok(remote) => remote,
        Err(e) => {
            warn!("Could not set up the {} adapter: {}", descriptor.kind, e);
            None
        }
    };

    let admin = match config.admin_token.as_deref() {
        Some(token) => {
            info!("  Admin endpoints: enabled");
            Some(Arc::new(AdminToken::new(token)))
        }
        None => {
            warn!("  Admin endpoints: DISABLED (set STORAGE_ADMIN_TOKEN to enable)");
            None
        }
    };

    let engine = SyncEngine::new(
        descriptor,
        LocalWorkingStore::new(working_path),
        remote,
        config.sync_options(),
    );
    let report = engine.start().await;
    info!("Storage ready in state {} ({:?})", report.state, report.action);

    let app = router(AppState::new(engine.clone(), admin));

    // Bind and serve
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Flushing pending changes");
    engine.shutdown(config.shutdown_deadline()).await;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, initiating shutdown"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM, initiating shutdown");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
