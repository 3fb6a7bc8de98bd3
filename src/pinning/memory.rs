//! In-process pinning service for development and tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{PinError, PinningService, Result};

type RealizeFn = Box<dyn Fn(&str, f64) -> f64 + Send + Sync>;

#[derive(Default)]
struct MemoryState {
    pins: HashMap<String, f64>,
    pin_calls: HashMap<String, usize>,
    unpin_calls: HashMap<String, usize>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
}

/// Idempotent in-memory pinning service
///
/// Realized size defaults to the requested size. Individual cids can be made
/// to fail or to never answer.
pub struct MemoryPinner {
    state: Mutex<MemoryState>,
    realize: RealizeFn,
}

impl Default for MemoryPinner {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPinner {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            realize: Box::new(|_, requested| requested),
        }
    }

    /// Compute realized sizes with `realize(cid, requested)`
    pub fn with_realized_size<F>(realize: F) -> Self
    where
        F: Fn(&str, f64) -> f64 + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(MemoryState::default()),
            realize: Box::new(realize),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock only means another test thread panicked mid-call
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every pin/unpin call for `cid` fail
    pub fn fail_cid(&self, cid: &str) {
        self.state().failing.insert(cid.to_string());
    }

    /// Make every pin call for `cid` wait forever
    pub fn hang_cid(&self, cid: &str) {
        self.state().hanging.insert(cid.to_string());
    }

    /// Clear injected failures and hangs for `cid`
    pub fn recover_cid(&self, cid: &str) {
        let mut state = self.state();
        state.failing.remove(cid);
        state.hanging.remove(cid);
    }

    pub fn is_pinned(&self, cid: &str) -> bool {
        self.state().pins.contains_key(cid)
    }

    pub fn pin_calls(&self, cid: &str) -> usize {
        self.state().pin_calls.get(cid).copied().unwrap_or(0)
    }

    pub fn unpin_calls(&self, cid: &str) -> usize {
        self.state().unpin_calls.get(cid).copied().unwrap_or(0)
    }
}

#[async_trait]
impl PinningService for MemoryPinner {
    async fn pin(&self, cid: &str, size_gb: f64) -> Result<f64> {
        {
            let mut state = self.state();
            *state.pin_calls.entry(cid.to_string()).or_default() += 1;

            if state.failing.contains(cid) {
                return Err(PinError::RequestFailed(format!("injected failure for {}", cid)));
            }

            if !state.hanging.contains(cid) {
                let realized = *state
                    .pins
                    .entry(cid.to_string())
                    .or_insert_with(|| (self.realize)(cid, size_gb));
                tracing::debug!(cid, requested = size_gb, realized, "Memory pin");
                return Ok(realized);
            }
        }

        // Injected hang
        std::future::pending::<Result<f64>>().await
    }

    async fn unpin(&self, cid: &str) -> Result<()> {
        let mut state = self.state();
        *state.unpin_calls.entry(cid.to_string()).or_default() += 1;

        if state.failing.contains(cid) {
            return Err(PinError::RequestFailed(format!("injected failure for {}", cid)));
        }

        state.pins.remove(cid);
        tracing::debug!(cid, "Memory unpin");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pin_is_idempotent() {
        let pinner = MemoryPinner::with_realized_size(|_, requested| requested * 2.0);

        assert_eq!(pinner.pin("c1", 1.5).await.unwrap(), 3.0);
        assert_eq!(pinner.pin("c1", 1.5).await.unwrap(), 3.0);
        assert!(pinner.is_pinned("c1"));
        assert_eq!(pinner.pin_calls("c1"), 2);
    }

    #[tokio::test]
    async fn test_unpin_is_idempotent() {
        let pinner = MemoryPinner::new();
        pinner.pin("c1", 1.0).await.unwrap();

        pinner.unpin("c1").await.unwrap();
        pinner.unpin("c1").await.unwrap();
        assert!(!pinner.is_pinned("c1"));
        assert_eq!(pinner.unpin_calls("c1"), 2);
    }

    #[tokio::test]
    async fn test_injected_failure_and_recovery() {
        let pinner = MemoryPinner::new();
        pinner.fail_cid("c1");

        assert!(pinner.pin("c1", 1.0).await.is_err());
        assert!(pinner.unpin("c1").await.is_err());

        pinner.recover_cid("c1");
        assert_eq!(pinner.pin("c1", 1.0).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_hanging_pin_never_answers() {
        let pinner = MemoryPinner::new();
        pinner.hang_cid("c1");

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(50), pinner.pin("c1", 1.0)).await;
        assert!(result.is_err());
        assert_eq!(pinner.pin_calls("c1"), 1);
        assert!(!pinner.is_pinned("c1"));
    }
}
