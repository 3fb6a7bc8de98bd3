//! Settlement job: turns unprocessed payments into pin extensions
//!
//! One run claims the attempt set atomically, pins every claimed payment in
//! its own task, settles each successful pin in one ledger transaction and
//! aggregates the outcomes under a wall-clock ceiling. A timed-out run does
//! not cancel its attempts; they finish in the background and their ledger
//! writes stand.

use bon::Builder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::error::{ExtensionError, JobError};
use crate::ledger::{ClaimedPayment, LedgerStore, SettleOutcome, Settlement};
use crate::observability::Metrics;
use crate::pinning::PinningService;

/// Attempts allowed before a payment is given up at claim time
pub const DEFAULT_RETRY_CEILING: u32 = 5;

/// Wall-clock budget for aggregating one settlement run
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Storage to request for a payment: `amount / price_per_gb`
pub fn requested_size_gb(amount: i64, price_per_gb: f64) -> Result<f64, ExtensionError> {
    check_price(price_per_gb)?;
    if amount < 0 {
        return Err(ExtensionError::NegativeAmount(amount));
    }
    Ok(amount as f64 / price_per_gb)
}

/// Retention bought by `amount` for an object of `realized_size_gb`
///
/// `hours = (amount / (price_per_gb / 24)) / realized_size_gb`, evaluated as
/// `amount * 24 / (price_per_gb * realized_size_gb)` to keep whole results exact.
pub fn extension_for(
    amount: i64,
    price_per_gb: f64,
    realized_size_gb: f64,
) -> Result<Duration, ExtensionError> {
    check_price(price_per_gb)?;
    if !realized_size_gb.is_finite() || realized_size_gb <= 0.0 {
        return Err(ExtensionError::InvalidSize(realized_size_gb));
    }
    if amount < 0 {
        return Err(ExtensionError::NegativeAmount(amount));
    }

    let hours = amount as f64 * 24.0 / (price_per_gb * realized_size_gb);
    Duration::try_from_secs_f64(hours * 3600.0).map_err(|_| ExtensionError::Overflow(hours))
}

fn check_price(price_per_gb: f64) -> Result<(), ExtensionError> {
    if !price_per_gb.is_finite() || price_per_gb <= 0.0 {
        return Err(ExtensionError::InvalidPrice(price_per_gb));
    }
    Ok(())
}

/// Outcome counts of one settlement run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementReport {
    /// Payments in the attempt set
    pub claimed: usize,
    /// Payments given up during the claim
    pub given_up: usize,
    /// Attempts that created or extended an object
    pub settled: usize,
    /// Attempts whose payment had been processed by someone else meanwhile
    pub already_processed: usize,
}

#[derive(Builder)]
pub struct SettlementJob {
    ledger: Arc<dyn LedgerStore>,
    pinner: Arc<dyn PinningService>,
    price_per_gb: f64,
    #[builder(default = DEFAULT_RETRY_CEILING)]
    retry_ceiling: u32,
    #[builder(default = DEFAULT_BATCH_TIMEOUT)]
    batch_timeout: Duration,
    /// Upper bound on attempts in flight; unbounded when unset
    max_concurrency: Option<usize>,
    #[builder(default)]
    metrics: Arc<Metrics>,
}

/// What each attempt task needs; shares nothing mutable with its siblings
#[derive(Clone)]
struct AttemptContext {
    ledger: Arc<dyn LedgerStore>,
    pinner: Arc<dyn PinningService>,
    price_per_gb: f64,
}

struct AttemptResult {
    order_id: String,
    result: Result<SettleOutcome, JobError>,
}

impl SettlementJob {
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    fn context(&self) -> AttemptContext {
        AttemptContext {
            ledger: self.ledger.clone(),
            pinner: self.pinner.clone(),
            price_per_gb: self.price_per_gb,
        }
    }

    /// Run one settlement batch
    ///
    /// Returns the first attempt error, or [`JobError::Timeout`] if the
    /// batch does not finish within the configured ceiling.
    pub async fn run(&self) -> Result<SettlementReport, JobError> {
        let span = info_span!("settlement", run_id = %Uuid::now_v7());
        self.run_batch().instrument(span).await
    }

    async fn run_batch(&self) -> Result<SettlementReport, JobError> {
        let batch = self
            .ledger
            .claim_unprocessed_payments(self.retry_ceiling)
            .await?;

        for order_id in &batch.given_up {
            warn!(order_id = %order_id, retry_ceiling = self.retry_ceiling, "Payment given up");
        }
        self.metrics.payments_given_up(batch.given_up.len());
        self.metrics.payments_claimed(batch.attempts.len());

        let mut report = SettlementReport {
            claimed: batch.attempts.len(),
            given_up: batch.given_up.len(),
            ..Default::default()
        };

        if batch.attempts.is_empty() {
            debug!("No payments to settle");
            return Ok(report);
        }

        info!(claimed = report.claimed, given_up = report.given_up, "Settling payments");

        let expected = batch.attempts.len();
        // Capacity for every result, so attempts never block on a slow collector
        let (tx, mut rx) = mpsc::channel::<AttemptResult>(expected);
        let limiter = self
            .max_concurrency
            .filter(|limit| *limit > 0)
            .map(|limit| Arc::new(Semaphore::new(limit)));

        for claim in batch.attempts {
            let ctx = self.context();
            let tx = tx.clone();
            let limiter = limiter.clone();
            let metrics = self.metrics.clone();

            tokio::spawn(
                async move {
                    let _permit = match limiter {
                        Some(limiter) => limiter.acquire_owned().await.ok(),
                        None => None,
                    };

                    let order_id = claim.order_id.clone();
                    let result = attempt(&ctx, claim).await;
                    match &result {
                        Ok(_) => metrics.payment_settled(),
                        Err(e) => {
                            metrics.payment_failed();
                            warn!(order_id = %order_id, error = %e, "Settlement attempt failed");
                        }
                    }

                    // The collector is gone once the batch has timed out
                    let _ = tx.send(AttemptResult { order_id, result }).await;
                }
                .in_current_span(),
            );
        }
        drop(tx);

        let collect = async move {
            let mut received = 0;
            while received < expected {
                let Some(AttemptResult { order_id, result }) = rx.recv().await else {
                    return Err(JobError::Aborted {
                        missing: expected - received,
                    });
                };
                received += 1;

                match result {
                    Ok(SettleOutcome::AlreadyProcessed) => {
                        debug!(order_id = %order_id, "Payment was already processed");
                        report.already_processed += 1;
                    }
                    Ok(_) => report.settled += 1,
                    Err(e) => return Err(e),
                }
            }
            Ok(report)
        };

        match tokio::time::timeout(self.batch_timeout, collect).await {
            Ok(result) => {
                if let Ok(report) = &result {
                    info!(settled = report.settled, "Settlement batch complete");
                }
                result
            }
            Err(_) => {
                self.metrics.batch_timed_out();
                warn!(timeout = ?self.batch_timeout, "Settlement batch timed out");
                Err(JobError::Timeout(self.batch_timeout))
            }
        }
    }
}

/// Pin one claimed payment and settle it
async fn attempt(ctx: &AttemptContext, claim: ClaimedPayment) -> Result<SettleOutcome, JobError> {
    let ClaimedPayment {
        order_id,
        cid,
        amount,
    } = claim;

    debug!(order_id = %order_id, amount, cid = %cid, "Processing payment");

    let requested = requested_size_gb(amount, ctx.price_per_gb).map_err(|source| {
        JobError::InvalidExtension {
            order_id: order_id.clone(),
            source,
        }
    })?;

    let realized = ctx
        .pinner
        .pin(&cid, requested)
        .await
        .map_err(|source| JobError::Pinning {
            cid: cid.clone(),
            source,
        })?;

    let duration = extension_for(amount, ctx.price_per_gb, realized).map_err(|source| {
        JobError::InvalidExtension {
            order_id: order_id.clone(),
            source,
        }
    })?;

    let outcome = ctx
        .ledger
        .settle_payment(Settlement {
            order_id: order_id.clone(),
            cid: cid.clone(),
            size_gb: realized,
            duration,
        })
        .await?;

    info!(
        order_id = %order_id,
        cid = %cid,
        size_gb = realized,
        hours = duration.as_secs_f64() / 3600.0,
        ?outcome,
        "Payment settled"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_matches_reference_scenario() {
        // amount 100, price 10/GB, realized 2 GB -> 120 hours
        assert_eq!(requested_size_gb(100, 10.0).unwrap(), 10.0);
        let duration = extension_for(100, 10.0, 2.0).unwrap();
        assert_eq!(duration, Duration::from_secs(120 * 3600));
    }

    #[test]
    fn test_extension_scales_inversely_with_size() {
        let small = extension_for(100, 10.0, 1.0).unwrap();
        let large = extension_for(100, 10.0, 4.0).unwrap();
        assert_eq!(small, large * 4);
    }

    #[test]
    fn test_zero_amount_buys_nothing() {
        assert_eq!(extension_for(0, 10.0, 1.0).unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_extension_rejects_bad_inputs() {
        assert_eq!(extension_for(100, 10.0, 0.0), Err(ExtensionError::InvalidSize(0.0)));
        assert!(matches!(
            extension_for(100, 10.0, f64::NAN),
            Err(ExtensionError::InvalidSize(_))
        ));
        assert_eq!(extension_for(100, 0.0, 1.0), Err(ExtensionError::InvalidPrice(0.0)));
        assert_eq!(extension_for(100, -1.0, 1.0), Err(ExtensionError::InvalidPrice(-1.0)));
        assert_eq!(extension_for(-5, 10.0, 1.0), Err(ExtensionError::NegativeAmount(-5)));
        assert!(matches!(
            extension_for(i64::MAX, 1e-300, 1e-300),
            Err(ExtensionError::Overflow(_))
        ));
        assert_eq!(requested_size_gb(100, 0.0), Err(ExtensionError::InvalidPrice(0.0)));
    }
}
