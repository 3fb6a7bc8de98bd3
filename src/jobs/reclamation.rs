//! Reclamation job: unpins and forgets objects whose retention has elapsed

use bon::Builder;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::error::JobError;
use crate::ledger::LedgerStore;
use crate::observability::Metrics;
use crate::pinning::PinningService;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclamationReport {
    /// Cids unpinned and deleted, in processing order
    pub reclaimed: Vec<String>,
}

#[derive(Builder)]
pub struct ReclamationJob {
    ledger: Arc<dyn LedgerStore>,
    pinner: Arc<dyn PinningService>,
    #[builder(default)]
    metrics: Arc<Metrics>,
}

impl ReclamationJob {
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Reclaim every expired object, one at a time
    ///
    /// The first failure stops the run. Objects reclaimed before it stay
    /// reclaimed; the failed one is still expired and is picked up again by
    /// the next run. A row is deleted only after its unpin succeeded.
    pub async fn run(&self) -> Result<ReclamationReport, JobError> {
        let span = info_span!("reclamation", run_id = %Uuid::now_v7());
        self.run_batch().instrument(span).await
    }

    async fn run_batch(&self) -> Result<ReclamationReport, JobError> {
        let cids = self.ledger.list_expired_object_cids().await?;
        if cids.is_empty() {
            debug!("No expired objects");
            return Ok(ReclamationReport::default());
        }

        debug!(cids = %cids.join(","), "Erasing ended objects");

        let mut report = ReclamationReport::default();
        for cid in cids {
            if let Err(source) = self.pinner.unpin(&cid).await {
                self.metrics.reclamation_failed();
                warn!(cid = %cid, error = %source, reclaimed = report.reclaimed.len(), "Unpin failed, stopping reclamation");
                return Err(JobError::Pinning { cid, source });
            }

            if let Err(e) = self.ledger.delete_object(&cid).await {
                self.metrics.reclamation_failed();
                warn!(cid = %cid, error = %e, "Delete failed after unpin, stopping reclamation");
                return Err(e.into());
            }

            self.metrics.object_reclaimed();
            debug!(cid = %cid, "Reclaimed object");
            report.reclaimed.push(cid);
        }

        info!(reclaimed = report.reclaimed.len(), "Reclamation complete");
        Ok(report)
    }
}
