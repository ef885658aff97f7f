//! Orchestrator API handlers.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use autodeliver_core::{OrchestratorStatus, PassSummary};

use crate::state::AppState;

/// Error response
#[derive(Debug, Serialize)]
pub struct OrchestratorErrorResponse {
    pub error: String,
}

/// Get orchestrator status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<OrchestratorStatus> {
    Json(state.orchestrator().status().await)
}

/// Run one pass now and return its summary.
///
/// Waits for an in-flight pass of the loop to finish first.
pub async fn trigger_pass(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PassSummary>, (StatusCode, Json<OrchestratorErrorResponse>)> {
    info!("Pass triggered via API");
    match state.orchestrator().run_once().await {
        Ok(summary) => Ok(Json(summary)),
        Err(e) => {
            error!("Triggered pass failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(OrchestratorErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}
