//! Response bodies of the catalog endpoints.
//!
//! An object is rendered with its derived expiry:
//!
//! ```json
//! {
//!   "cid": "bafy...",
//!   "sizegb": 2.0,
//!   "pinned_at": "2026-01-01T00:00:00Z",
//!   "ends_at": "2026-01-06T00:00:00Z",
//!   "notes": ["order 1001"]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{Object, Payment, StoreStats};
use crate::observability::MetricsSnapshot;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ObjectView {
    pub cid: String,
    pub sizegb: f64,
    pub pinned_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub notes: Vec<String>,
}

impl From<Object> for ObjectView {
    fn from(object: Object) -> Self {
        let ends_at = object.ends_at();
        Self {
            cid: object.cid,
            sizegb: object.size_gb,
            pinned_at: object.pinned_at,
            ends_at,
            notes: object.notes,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PaymentView {
    pub order_id: String,
    pub cid: String,
    pub paid_at: DateTime<Utc>,
    pub amount: i64,
    pub processed: bool,
    pub tries: u32,
    pub given_up: bool,
}

impl From<Payment> for PaymentView {
    fn from(payment: Payment) -> Self {
        Self {
            order_id: payment.order_id,
            cid: payment.cid,
            paid_at: payment.paid_at,
            amount: payment.amount,
            processed: payment.processed,
            tries: payment.tries,
            given_up: payment.given_up,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub store: StoreStats,
    pub jobs: MetricsSnapshot,
}
