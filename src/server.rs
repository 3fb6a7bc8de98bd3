use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::RecordPaymentArgs;
use pinkeep::api::{self, state::AppState};
use pinkeep::config::{Config, PinningProvider};
use pinkeep::jobs::{ReclamationJob, Scheduler, SettlementJob};
use pinkeep::ledger::{FjallLedger, LedgerStore, NewPayment};
use pinkeep::observability::Metrics;
use pinkeep::pinning::{HttpPinner, MemoryPinner, PinningService};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

struct Components {
    ledger: Arc<FjallLedger>,
    settlement: Arc<SettlementJob>,
    reclamation: Arc<ReclamationJob>,
    metrics: Arc<Metrics>,
}

fn open_ledger(config: &Config) -> Result<Arc<FjallLedger>, AnyError> {
    info!(path = %config.server.ledger_path.display(), "Opening ledger");
    let ledger = FjallLedger::open(&config.server.ledger_path)
        .map_err(|e| format!("Failed to open ledger: {}", e))?;
    Ok(Arc::new(ledger))
}

fn build_pinner(config: &Config) -> Result<Arc<dyn PinningService>, AnyError> {
    match config.pinning.provider {
        PinningProvider::Http => {
            let http = config.http_pinner();
            info!(endpoint = %http.endpoint, "Using HTTP pinning service");
            let pinner = HttpPinner::new(http)
                .map_err(|e| format!("Failed to build pinning client: {}", e))?;
            Ok(Arc::new(pinner))
        }
        PinningProvider::Memory => {
            warn!("Using in-memory pinning service; pins do not outlive the process");
            Ok(Arc::new(MemoryPinner::new()))
        }
    }
}

fn build(config: &Config) -> Result<Components, AnyError> {
    let ledger = open_ledger(config)?;
    let pinner = build_pinner(config)?;
    let metrics = Arc::new(Metrics::new());

    let settlement = SettlementJob::builder()
        .ledger(ledger.clone())
        .pinner(pinner.clone())
        .price_per_gb(config.pricing.price_per_gb)
        .retry_ceiling(config.jobs.retry_ceiling)
        .batch_timeout(config.jobs.batch_timeout.as_duration())
        .maybe_max_concurrency(config.jobs.concurrency_limit())
        .metrics(metrics.clone())
        .build();

    let reclamation = ReclamationJob::builder()
        .ledger(ledger.clone())
        .pinner(pinner)
        .metrics(metrics.clone())
        .build();

    Ok(Components {
        ledger,
        settlement: Arc::new(settlement),
        reclamation: Arc::new(reclamation),
        metrics,
    })
}

pub async fn serve(config: Config) -> Result<(), AnyError> {
    let components = build(&config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = Scheduler::new(
        components.settlement.clone(),
        components.reclamation.clone(),
        config.jobs.settle_interval.as_duration(),
        config.jobs.reclaim_interval.as_duration(),
    );
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    let state = AppState::new(components.ledger.clone(), components.metrics.clone());
    let app = api::router(state);

    let address = config.server.bind_addr;
    let listener = TcpListener::bind(address).await?;
    info!(%address, "pinkeep API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_handle.await {
        warn!(error = %e, "Scheduler task ended abnormally");
    }

    components.ledger.persist()?;
    Ok(())
}

pub async fn settle_once(config: Config) -> Result<(), AnyError> {
    let components = build(&config)?;
    let report = components.settlement.run().await;
    components.ledger.persist()?;

    let report = report?;
    info!(
        claimed = report.claimed,
        given_up = report.given_up,
        settled = report.settled,
        already_processed = report.already_processed,
        "Settlement finished"
    );
    Ok(())
}

pub async fn reclaim_once(config: Config) -> Result<(), AnyError> {
    let components = build(&config)?;
    let report = components.reclamation.run().await;
    components.ledger.persist()?;

    let report = report?;
    info!(reclaimed = report.reclaimed.len(), "Reclamation finished");
    Ok(())
}

pub async fn record_payment(config: Config, args: RecordPaymentArgs) -> Result<(), AnyError> {
    let ledger = open_ledger(&config)?;

    ledger
        .insert_payment(NewPayment {
            order_id: args.order_id.clone(),
            cid: args.cid.clone(),
            amount: args.amount,
            note: args.note,
        })
        .await?;
    ledger.persist()?;

    info!(order_id = %args.order_id, cid = %args.cid, amount = args.amount, "Payment recorded");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
