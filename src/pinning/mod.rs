//! Pinning service clients
//!
//! The pinning service holds content off-box by cid. Both operations are
//! idempotent: pinning an already pinned cid reports its realized size again,
//! unpinning an absent cid succeeds.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use http::{HttpPinner, HttpPinnerConfig};
pub use memory::MemoryPinner;

#[derive(Debug, Error)]
pub enum PinError {
    #[error("pin request failed: {0}")]
    RequestFailed(String),

    #[error("pin request timed out")]
    Timeout,

    #[error("pinning service rejected request with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid pinning service response: {0}")]
    InvalidResponse(String),
}

impl PinError {
    /// Whether another attempt of the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            PinError::RequestFailed(_) | PinError::Timeout => true,
            PinError::Rejected { status, .. } => *status >= 500 || *status == 429,
            PinError::InvalidResponse(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PinError>;

#[async_trait]
pub trait PinningService: Send + Sync {
    /// Pin `cid`, requesting `size_gb` of storage; returns the realized size
    async fn pin(&self, cid: &str, size_gb: f64) -> Result<f64>;

    /// Release the pin on `cid`
    async fn unpin(&self, cid: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(PinError::Timeout.is_retryable());
        assert!(PinError::RequestFailed("reset".into()).is_retryable());
        assert!(PinError::Rejected { status: 503, message: String::new() }.is_retryable());
        assert!(PinError::Rejected { status: 429, message: String::new() }.is_retryable());
        assert!(!PinError::Rejected { status: 400, message: String::new() }.is_retryable());
        assert!(!PinError::InvalidResponse("bad json".into()).is_retryable());
    }
}
