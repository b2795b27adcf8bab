//! HTTP handlers for the storage endpoints.
//!
//! Implements:
//! - GET /health - Liveness
//! - GET /api/storage/status - Backend, persistence and last sync outcome
//! - POST /api/storage/sync - Admin: upload pending changes now
//! - POST /api/storage/refetch - Admin: replace the working copy from the remote

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use dbfile_storage_core::StorageError;
use dbfile_sync::{
    EngineState, StatusReporter, StatusSnapshot, SyncAction, SyncEngine, SyncReport, SyncState,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::{require_admin, SharedAdminToken};
use crate::error::{storage_status, Result};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: SyncEngine,
    pub reporter: StatusReporter,
    pub admin: Option<SharedAdminToken>,
}

impl AppState {
    pub fn new(engine: SyncEngine, admin: Option<SharedAdminToken>) -> Self {
        Self {
            reporter: StatusReporter::new(engine.clone()),
            engine,
            admin,
        }
    }
}

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub backend: &'static str,
}

/// GET /health - Health check endpoint.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        backend: state.engine.descriptor().kind.label(),
    })
}

/// GET /api/storage/status
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.reporter.snapshot().await)
}

/// Outcome of an admin sync action, successful or not.
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SyncAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    pub state: EngineState,
    pub sync: SyncState,
}

impl SyncResponse {
    fn from_result(
        engine: &SyncEngine,
        result: std::result::Result<SyncReport, StorageError>,
    ) -> (StatusCode, Self) {
        match result {
            Ok(report) => (
                StatusCode::OK,
                Self {
                    success: true,
                    result: Some(report.action),
                    error: None,
                    code: None,
                    state: report.state,
                    sync: report.sync,
                },
            ),
            Err(e) => (
                storage_status(&e),
                Self {
                    success: false,
                    result: None,
                    error: Some(e.to_string()),
                    code: Some(e.code()),
                    state: engine.state(),
                    sync: engine.sync_state(),
                },
            ),
        }
    }
}

/// POST /api/storage/sync - Admin-only manual sync.
pub async fn sync_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    require_admin(state.admin.as_deref(), &headers)?;

    info!("Manual sync requested");
    let result = state.engine.sync_now().await;
    if let Err(e) = &result {
        warn!("Manual sync failed: {}", e);
    }
    let (status, body) = SyncResponse::from_result(&state.engine, result);
    Ok((status, Json(body)).into_response())
}

/// POST /api/storage/refetch - Admin-only forced download.
pub async fn refetch_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response> {
    require_admin(state.admin.as_deref(), &headers)?;

    warn!("Forced re-fetch requested");
    let result = state.engine.force_refetch().await;
    if let Err(e) = &result {
        warn!("Forced re-fetch failed: {}", e);
    }
    let (status, body) = SyncResponse::from_result(&state.engine, result);
    Ok((status, Json(body)).into_response())
}
