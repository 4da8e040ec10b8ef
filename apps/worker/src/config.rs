use std::env;
use std::str::FromStr;

use consentry_core::{AppError, AppResult};

/// Where the worker settles due grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepTarget {
    /// Sweep the Postgres store directly under a worker-held lease.
    Store { database_url: String },
    /// Ask the API to sweep through its internal route.
    Api {
        base_url: String,
        shared_secret: String,
    },
}

impl SweepTarget {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Store { .. } => "store",
            Self::Api { .. } => "api",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_id: String,
    pub target: SweepTarget,
    pub redis_url: Option<String>,
    pub sweep_interval_ms: u64,
    pub batch_size: usize,
    pub lease_seconds: u32,
}

impl WorkerConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let value = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let worker_id = value("WORKER_ID").unwrap_or_else(|| format!("worker-{}", std::process::id()));

        let target = match value("DATABASE_URL") {
            Some(database_url) => SweepTarget::Store { database_url },
            None => SweepTarget::Api {
                base_url: value("WORKER_API_BASE_URL")
                    .unwrap_or_else(|| "http://127.0.0.1:3001".to_owned())
                    .trim_end_matches('/')
                    .to_owned(),
                shared_secret: value("WORKER_SHARED_SECRET").ok_or_else(|| {
                    AppError::Validation(
                        "WORKER_SHARED_SECRET is required when DATABASE_URL is not set".to_owned(),
                    )
                })?,
            },
        };

        let sweep_interval_ms = parse_or("WORKER_SWEEP_INTERVAL_MS", value("WORKER_SWEEP_INTERVAL_MS"), 30_000_u64)?;
        let batch_size = parse_or("WORKER_SWEEP_BATCH_SIZE", value("WORKER_SWEEP_BATCH_SIZE"), 100_usize)?;
        let lease_seconds = parse_or("WORKER_LEASE_SECONDS", value("WORKER_LEASE_SECONDS"), 30_u32)?;

        if sweep_interval_ms == 0 {
            return Err(AppError::Validation(
                "WORKER_SWEEP_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        if batch_size == 0 {
            return Err(AppError::Validation(
                "WORKER_SWEEP_BATCH_SIZE must be greater than zero".to_owned(),
            ));
        }

        if lease_seconds == 0 {
            return Err(AppError::Validation(
                "WORKER_LEASE_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            worker_id,
            target,
            redis_url: value("REDIS_URL"),
            sweep_interval_ms,
            batch_size,
            lease_seconds,
        })
    }
}

fn parse_or<T>(name: &str, value: Option<String>, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(value) => value.parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
