//! Read-only catalog over the ledger
//!
//! - `GET /health`
//! - `GET /objects` (ascending `ends_at`)
//! - `GET /objects/{cid}`
//! - `GET /payments/{order_id}`
//! - `GET /operators/stats`

mod error;
pub mod models;
pub mod services;
pub mod state;

pub use error::ApiError;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use services::{get_object, get_payment, health, list_objects, stats};
use state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/objects", get(list_objects))
        .route("/objects/{cid}", get(get_object))
        .route("/payments/{order_id}", get(get_payment))
        .route("/operators/stats", get(stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
