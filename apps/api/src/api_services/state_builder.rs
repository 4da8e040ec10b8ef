use std::sync::Arc;

use consentry_application::{
    AuditLogRepository, AuthorizationService, Clock, ConsentGrantRepository,
    ConsentRequestRepository, ConsentService, ExpirySweepService, PresenceChallengeRepository,
    PresenceService, SweepLeaseCoordinator,
};
use consentry_infrastructure::{
    InMemoryAuditRepository, InMemoryConsentRepository, InMemoryPresenceChallengeRepository,
    InMemorySweepLeaseCoordinator, PostgresAuditLogRepository, PostgresConsentRepository, PostgresPresenceChallengeRepository, RedisSweepLeaseCoordinator,
    SystemClock,
};
use sqlx::PgPool;

use crate::api_config::ApiConfig;
use crate::state::AppState;

const SWEEP_LEASE_KEY_PREFIX: &str = "consentry:lease";

struct ConsentStores {
    requests: Arc<dyn ConsentRequestRepository>,
    grants: Arc<dyn ConsentGrantRepository>,
    audit_log: Arc<dyn AuditLogRepository>,
    challenges: Arc<dyn PresenceChallengeRepository>,
}

impl ConsentStores {
    fn postgres(pool: PgPool) -> Self {
        let consents = Arc::new(PostgresConsentRepository::new(pool.clone()));
        Self {
            requests: consents.clone(),
            grants: consents,
            audit_log: Arc::new(PostgresAuditLogRepository::new(pool.clone())),
            challenges: Arc::new(PostgresPresenceChallengeRepository::new(pool)),
        }
    }

    fn in_memory() -> Self {
        let audit = Arc::new(InMemoryAuditRepository::new());
        let consents = Arc::new(InMemoryConsentRepository::new(audit.clone()));
        Self {
            requests: consents.clone(),
            grants: consents,
            challenges: Arc::new(InMemoryPresenceChallengeRepository::new(audit.clone())),
            audit_log: audit,
        }
    }
}

/// Wires services over Postgres when a pool is given, otherwise over
/// process-local stores.
pub fn build_app_state(
    config: &ApiConfig,
    postgres_pool: Option<PgPool>,
    redis_client: Option<redis::Client>,
) -> AppState {
    let stores = match postgres_pool.clone() {
        Some(pool) => ConsentStores::postgres(pool),
        None => ConsentStores::in_memory(),
    };

    let lease_coordinator: Arc<dyn SweepLeaseCoordinator> = match redis_client.clone() {
        Some(client) => Arc::new(RedisSweepLeaseCoordinator::new(
            client,
            SWEEP_LEASE_KEY_PREFIX,
        )),
        None => Arc::new(InMemorySweepLeaseCoordinator::new()),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let authorization_service = AuthorizationService::new();

    AppState {
        consent_service: ConsentService::new(
            authorization_service,
            stores.requests,
            stores.grants.clone(),
            stores.audit_log,
            clock.clone(),
        ),
        presence_service: PresenceService::new(
            authorization_service,
            stores.grants.clone(),
            stores.challenges,
            clock.clone(),
        ),
        expiry_sweep_service: ExpirySweepService::new(stores.grants, lease_coordinator, clock),
        gateway_shared_secret: config.gateway_shared_secret.clone(),
        worker_shared_secret: config.worker_shared_secret.clone(),
        expiry_sweep_batch_size: config.expiry_sweep_batch_size,
        expiry_sweep_lease_seconds: config.expiry_sweep_lease_seconds,
        postgres_pool,
        redis_client,
    }
}
