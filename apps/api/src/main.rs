//! Consentry API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod dev_seed;
mod dto;
mod error;
mod expiry_sweeper;
mod handlers;
mod middleware;
mod state;

use std::time::Duration;

use consentry_core::AppError;
use tracing::info;

use crate::api_config::{ApiConfig, ConsentStoreConfig};
use crate::expiry_sweeper::InProcessSweeper;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    api_config::init_tracing();

    let config = ApiConfig::load()?;

    let postgres_pool = match &config.consent_store {
        ConsentStoreConfig::Postgres { database_url } => {
            Some(api_services::connect_and_migrate(database_url).await?)
        }
        ConsentStoreConfig::Memory => None,
    };

    if config.migrate_only {
        info!("database migrations applied successfully");
        return Ok(());
    }

    let redis_client = config
        .redis_url
        .as_deref()
        .map(api_services::build_redis_client)
        .transpose()?;

    let app_state = api_services::build_app_state(&config, postgres_pool, redis_client);

    if config.dev_seed_demo_data {
        dev_seed::run(&app_state.consent_service).await?;
    }

    if config.expiry_sweep_interval_seconds > 0 {
        InProcessSweeper {
            service: app_state.expiry_sweep_service.clone(),
            holder_id: format!("api-{}", std::process::id()),
            interval: Duration::from_secs(config.expiry_sweep_interval_seconds),
            batch_size: config.expiry_sweep_batch_size,
            lease_seconds: config.expiry_sweep_lease_seconds,
        }
        .spawn();
    } else {
        info!("in-process expiry sweeper disabled");
    }

    let app = api_router::build_router(app_state, &config.frontend_url)?;
    let address = config.socket_address()?;

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(%address, store = config.consent_store.label(), "consentry-api listening");

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
