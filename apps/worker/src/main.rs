//! Consentry expiry sweeper runtime.

#![forbid(unsafe_code)]

mod config;
mod sweeper;

use std::time::Duration;

use consentry_core::AppError;
use tracing::{info, warn};

use crate::config::WorkerConfig;
use crate::sweeper::Sweeper;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let sweeper = Sweeper::build(&config).await?;

    info!(
        worker_id = %config.worker_id,
        target = config.target.label(),
        batch_size = config.batch_size,
        lease_seconds = config.lease_seconds,
        sweep_interval_ms = config.sweep_interval_ms,
        "consentry-worker started"
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(config.sweep_interval_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match sweeper.run_once(&config).await {
            Ok(Some(report)) => info!(
                worker_id = %config.worker_id,
                examined = report.examined,
                expired = report.expired,
                skipped = report.skipped,
                "expiry sweep finished"
            ),
            Ok(None) => info!(
                worker_id = %config.worker_id,
                "expiry sweep lease held by another sweeper"
            ),
            Err(error) => warn!(
                worker_id = %config.worker_id,
                error = %error,
                "expiry sweep failed"
            ),
        }
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
