use std::sync::Arc;
use std::time::Duration;

use consentry_application::{Clock, ExpirySweepService, SweepLeaseCoordinator, SweepReport};
use consentry_core::{AppError, AppResult};
use consentry_infrastructure::{
    InMemorySweepLeaseCoordinator, PostgresConsentRepository, RedisSweepLeaseCoordinator,
    SystemClock,
};
use reqwest::header;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::{SweepTarget, WorkerConfig};

const SWEEP_LEASE_KEY_PREFIX: &str = "consentry:lease";
const WORKER_ID_HEADER: &str = "x-consentry-worker-id";

#[derive(Debug, Serialize)]
struct ExpirySweepRequest {
    batch_size: usize,
}

#[derive(Debug, Deserialize)]
struct ExpirySweepResponse {
    lease_acquired: bool,
    examined: usize,
    expired: usize,
    skipped: usize,
}

impl ExpirySweepResponse {
    fn into_report(self) -> Option<SweepReport> {
        self.lease_acquired.then_some(SweepReport {
            examined: self.examined,
            expired: self.expired,
            skipped: self.skipped,
        })
    }
}

/// Runs one sweep per tick against the configured target.
pub enum Sweeper {
    Store(ExpirySweepService),
    Api {
        http_client: reqwest::Client,
        endpoint: String,
        shared_secret: String,
    },
}

impl Sweeper {
    pub async fn build(config: &WorkerConfig) -> AppResult<Self> {
        match &config.target {
            SweepTarget::Store { database_url } => {
                let pool = connect_pool(database_url).await?;
                let lease_coordinator = build_lease_coordinator(config.redis_url.as_deref())?;
                Ok(Self::Store(build_sweep_service(pool, lease_coordinator)))
            }
            SweepTarget::Api {
                base_url,
                shared_secret,
            } => {
                let http_client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(15))
                    .build()
                    .map_err(|error| {
                        AppError::Internal(format!("failed to build HTTP client: {error}"))
                    })?;

                Ok(Self::Api {
                    http_client,
                    endpoint: format!("{base_url}/api/internal/expiry-sweeps"),
                    shared_secret: shared_secret.clone(),
                })
            }
        }
    }

    /// Returns `None` when another sweeper holds the lease.
    pub async fn run_once(&self, config: &WorkerConfig) -> AppResult<Option<SweepReport>> {
        match self {
            Self::Store(service) => {
                service
                    .sweep_once(
                        config.worker_id.as_str(),
                        config.batch_size,
                        config.lease_seconds,
                    )
                    .await
            }
            Self::Api {
                http_client,
                endpoint,
                shared_secret,
            } => {
                let response = http_client
                    .post(endpoint.as_str())
                    .header(header::AUTHORIZATION, format!("Bearer {shared_secret}"))
                    .header(WORKER_ID_HEADER, config.worker_id.as_str())
                    .json(&ExpirySweepRequest {
                        batch_size: config.batch_size,
                    })
                    .send()
                    .await
                    .map_err(|error| {
                        AppError::Internal(format!("failed to call expiry sweep endpoint: {error}"))
                    })?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(AppError::Internal(format!(
                        "expiry sweep endpoint returned {status}: {body}"
                    )));
                }

                let payload = response
                    .json::<ExpirySweepResponse>()
                    .await
                    .map_err(|error| {
                        AppError::Internal(format!(
                            "failed to parse expiry sweep response body: {error}"
                        ))
                    })?;

                Ok(payload.into_report())
            }
        }
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_lease_coordinator(redis_url: Option<&str>) -> AppResult<Arc<dyn SweepLeaseCoordinator>> {
    match redis_url {
        Some(redis_url) => {
            let client = redis::Client::open(redis_url)
                .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;
            Ok(Arc::new(RedisSweepLeaseCoordinator::new(
                client,
                SWEEP_LEASE_KEY_PREFIX,
            )))
        }
        None => {
            tracing::warn!("REDIS_URL is not set; sweep lease only guards this process");
            Ok(Arc::new(InMemorySweepLeaseCoordinator::new()))
        }
    }
}

fn build_sweep_service(
    pool: PgPool,
    lease_coordinator: Arc<dyn SweepLeaseCoordinator>,
) -> ExpirySweepService {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    ExpirySweepService::new(
        Arc::new(PostgresConsentRepository::new(pool)),
        lease_coordinator,
        clock,
    )
}
