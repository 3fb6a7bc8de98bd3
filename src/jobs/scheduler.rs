//! Periodic driver for the settlement and reclamation jobs
//!
//! Each job gets its own loop and cadence. A loop awaits its run before the
//! next tick, so a job never overlaps with itself.

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::error::JobError;
use super::reclamation::ReclamationJob;
use super::settlement::SettlementJob;

pub struct Scheduler {
    settlement: Arc<SettlementJob>,
    reclamation: Arc<ReclamationJob>,
    settle_interval: Duration,
    reclaim_interval: Duration,
}

impl Scheduler {
    pub fn new(
        settlement: Arc<SettlementJob>,
        reclamation: Arc<ReclamationJob>,
        settle_interval: Duration,
        reclaim_interval: Duration,
    ) -> Self {
        Self {
            settlement,
            reclamation,
            settle_interval,
            reclaim_interval,
        }
    }

    /// Run both loops until `shutdown` flips to `true` or its sender is dropped
    ///
    /// A run in progress at shutdown is abandoned; every ledger write it
    /// already made is atomic, and whatever it did not finish is selected
    /// again next time.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let settlement = self.settlement.clone();
        let settle = run_every("settlement", self.settle_interval, shutdown.clone(), move || {
            let job = settlement.clone();
            async move { job.run().await }
        });

        let reclamation = self.reclamation.clone();
        let reclaim = run_every("reclamation", self.reclaim_interval, shutdown, move || {
            let job = reclamation.clone();
            async move { job.run().await }
        });

        tokio::join!(settle, reclaim);
        info!("Scheduler stopped");
    }
}

async fn run_every<F, Fut, T>(
    job: &'static str,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, JobError>>,
    T: Debug,
{
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(job, every = ?every, "Starting periodic job");

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_requested(&mut shutdown) => break,
        }

        tokio::select! {
            result = tick() => match result {
                Ok(report) => info!(job, ?report, "Job run complete"),
                Err(e) if e.is_timeout() => error!(job, error = %e, "Job run timed out"),
                Err(e) => error!(job, error = %e, "Job run failed"),
            },
            _ = shutdown_requested(&mut shutdown) => break,
        }
    }

    info!(job, "Periodic job stopping");
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also means stop
    let _ = shutdown.wait_for(|stop| *stop).await;
}
