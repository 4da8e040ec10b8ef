use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use consentry_core::AppError;
use tracing_subscriber::EnvFilter;

const MIN_SHARED_SECRET_LENGTH: usize = 32;

/// Backing store for consent data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentStoreConfig {
    Memory,
    Postgres { database_url: String },
}

impl ConsentStoreConfig {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub consent_store: ConsentStoreConfig,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub gateway_shared_secret: String,
    pub worker_shared_secret: String,
    pub redis_url: Option<String>,
    pub expiry_sweep_interval_seconds: u64,
    pub expiry_sweep_batch_size: usize,
    pub expiry_sweep_lease_seconds: u32,
    pub dev_seed_demo_data: bool,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let consent_store = match env::var("CONSENT_STORE")
            .unwrap_or_else(|_| "memory".to_owned())
            .as_str()
        {
            "memory" => ConsentStoreConfig::Memory,
            "postgres" => ConsentStoreConfig::Postgres {
                database_url: required_non_empty_env("DATABASE_URL")?,
            },
            other => {
                return Err(AppError::Validation(format!(
                    "CONSENT_STORE must be either 'memory' or 'postgres', got '{other}'"
                )));
            }
        };

        if migrate_only && consent_store == ConsentStoreConfig::Memory {
            return Err(AppError::Validation(
                "migrate requires CONSENT_STORE=postgres".to_owned(),
            ));
        }

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_owned());
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env::var("API_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3001);

        let gateway_shared_secret = shared_secret_env("GATEWAY_SHARED_SECRET")?;
        let worker_shared_secret = shared_secret_env("WORKER_SHARED_SECRET")?;

        let redis_url = env::var("REDIS_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());

        let expiry_sweep_interval_seconds =
            parse_env_or("EXPIRY_SWEEP_INTERVAL_SECONDS", 60_u64)?;
        let expiry_sweep_batch_size = parse_env_or("EXPIRY_SWEEP_BATCH_SIZE", 100_usize)?;
        if expiry_sweep_batch_size == 0 {
            return Err(AppError::Validation(
                "EXPIRY_SWEEP_BATCH_SIZE must be greater than zero".to_owned(),
            ));
        }
        let expiry_sweep_lease_seconds = parse_env_or("EXPIRY_SWEEP_LEASE_SECONDS", 30_u32)?;
        if expiry_sweep_lease_seconds == 0 {
            return Err(AppError::Validation(
                "EXPIRY_SWEEP_LEASE_SECONDS must be greater than zero".to_owned(),
            ));
        }

        let dev_seed_demo_data = env::var("DEV_SEED_DEMO_DATA")
            .unwrap_or_else(|_| "false".to_owned())
            .eq_ignore_ascii_case("true");

        Ok(Self {
            migrate_only,
            consent_store,
            frontend_url,
            api_host,
            api_port,
            gateway_shared_secret,
            worker_shared_secret,
            redis_url,
            expiry_sweep_interval_seconds,
            expiry_sweep_batch_size,
            expiry_sweep_lease_seconds,
            dev_seed_demo_data,
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn required_non_empty_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

fn shared_secret_env(name: &str) -> Result<String, AppError> {
    let value = required_env(name)?;
    if value.len() < MIN_SHARED_SECRET_LENGTH {
        return Err(AppError::Validation(format!(
            "{name} must be at least {MIN_SHARED_SECRET_LENGTH} characters"
        )));
    }

    Ok(value)
}

fn parse_env_or<T: FromStr>(name: &str, default: T) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        _ => Ok(default),
    }
}
