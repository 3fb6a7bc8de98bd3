//! Ledger entities and the request/response types of the ledger operations.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A pinned content item.
///
/// `lifespan_secs` only ever grows; `ends_at` is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub cid: String,
    pub size_gb: f64,
    pub pinned_at: DateTime<Utc>,
    pub lifespan_secs: u64,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Object {
    pub fn lifespan(&self) -> Duration {
        Duration::from_secs(self.lifespan_secs)
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        let lifespan = i64::try_from(self.lifespan_secs).unwrap_or(i64::MAX);
        TimeDelta::try_seconds(lifespan)
            .and_then(|delta| self.pinned_at.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ends_at() < now
    }
}

/// A claim of funds intended to extend one object's retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub order_id: String,
    pub cid: String,
    pub amount: i64,
    pub paid_at: DateTime<Utc>,
    #[serde(default)]
    pub note: String,
    pub processed: bool,
    pub tries: u32,
    pub given_up: bool,
}

/// Input of `insert_payment`
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: String,
    pub cid: String,
    pub amount: i64,
    pub note: String,
}

/// One member of a settlement attempt set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedPayment {
    pub order_id: String,
    pub cid: String,
    pub amount: i64,
}

/// Result of one atomic claim: payments to attempt now, and payments given up
/// in the same transaction.
#[derive(Debug, Clone, Default)]
pub struct ClaimBatch {
    pub attempts: Vec<ClaimedPayment>,
    pub given_up: Vec<String>,
}

/// Input of `settle_payment`
#[derive(Debug, Clone)]
pub struct Settlement {
    pub order_id: String,
    pub cid: String,
    pub size_gb: f64,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// First settlement for the cid; the object row was inserted
    Created,
    /// The cid existed; its lifespan was extended
    Extended,
    /// The payment was already processed; nothing was merged
    AlreadyProcessed,
}
