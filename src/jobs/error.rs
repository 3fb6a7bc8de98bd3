use std::time::Duration;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::pinning::PinError;

/// Why a payment amount cannot be turned into a pin extension
#[derive(Debug, Error, PartialEq)]
pub enum ExtensionError {
    #[error("price per GB must be positive and finite, got {0}")]
    InvalidPrice(f64),

    #[error("realized size must be positive and finite, got {0} GB")]
    InvalidSize(f64),

    #[error("payment amount must not be negative, got {0}")]
    NegativeAmount(i64),

    #[error("extension of {0} hours is not representable")]
    Overflow(f64),
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("pinning service failed for {cid}: {source}")]
    Pinning {
        cid: String,
        #[source]
        source: PinError,
    },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("cannot compute extension for payment {order_id}: {source}")]
    InvalidExtension {
        order_id: String,
        #[source]
        source: ExtensionError,
    },

    #[error("settlement batch did not complete within {0:?}")]
    Timeout(Duration),

    #[error("{missing} settlement attempts ended without reporting")]
    Aborted { missing: usize },
}

impl JobError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, JobError::Timeout(_))
    }
}
