use std::sync::Arc;

use crate::ledger::FjallLedger;
use crate::observability::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<FjallLedger>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(ledger: Arc<FjallLedger>, metrics: Arc<Metrics>) -> Self {
        Self { ledger, metrics }
    }
}
