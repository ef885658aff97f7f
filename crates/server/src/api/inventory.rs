//! Inventory and ledger API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use autodeliver_core::{DeliveryRecord, PoolStats};

use crate::state::AppState;

/// Pool overview response
#[derive(Debug, Serialize)]
pub struct InventoryResponse {
    pub pools: Vec<PoolStats>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn internal_error(e: impl std::fmt::Display) -> ApiError {
    error!("Inventory request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

/// Per-pool card counts
pub async fn list_pools(
    State(state): State<Arc<AppState>>,
) -> Result<Json<InventoryResponse>, ApiError> {
    let pools = state.inventory().pool_stats().map_err(internal_error)?;
    Ok(Json(InventoryResponse { pools }))
}

/// Ledger record for one order
pub async fn get_delivery(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<DeliveryRecord>, ApiError> {
    match state.inventory().get_delivery(&order_id) {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No delivery recorded for order {}", order_id),
            }),
        )),
        Err(e) => Err(internal_error(e)),
    }
}
