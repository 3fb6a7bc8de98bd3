use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::{
    error::ApiError,
    models::{HealthResponse, ObjectView, PaymentView, StatsResponse},
    state::AppState,
};
use crate::ledger::LedgerStore;

/// Health check endpoint (GET /health)
///
/// Reports unhealthy with 503 when the ledger cannot be read.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (status_code, status) = match state.ledger.check() {
        Ok(_) => (StatusCode::OK, "healthy"),
        Err(err) => {
            tracing::warn!(error = %err, "Ledger unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };

    let response = HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}

/// Catalog listing (GET /objects), soonest expiry first
pub async fn list_objects(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let objects: Vec<ObjectView> = state
        .ledger
        .list_objects()
        .await?
        .into_iter()
        .map(ObjectView::from)
        .collect();

    Ok(Json(objects))
}

/// Object detail (GET /objects/{cid})
pub async fn get_object(
    State(state): State<AppState>,
    Path(cid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let object = state
        .ledger
        .get_object(&cid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("object {cid}")))?;

    Ok(Json(ObjectView::from(object)))
}

/// Payment status (GET /payments/{order_id})
pub async fn get_payment(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let payment = state
        .ledger
        .get_payment(&order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("payment {order_id}")))?;

    Ok(Json(PaymentView::from(payment)))
}

/// Operator counters (GET /operators/stats)
pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let store = state.ledger.stats()?;

    Ok(Json(StatsResponse {
        store,
        jobs: state.metrics.snapshot(),
    }))
}
