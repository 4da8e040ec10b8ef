use consentry_application::{ConsentService, ExpirySweepService, PresenceService};
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub consent_service: ConsentService,
    pub presence_service: PresenceService,
    pub expiry_sweep_service: ExpirySweepService,
    pub gateway_shared_secret: String,
    pub worker_shared_secret: String,
    pub expiry_sweep_batch_size: usize,
    pub expiry_sweep_lease_seconds: u32,
    pub postgres_pool: Option<PgPool>,
    pub redis_client: Option<redis::Client>,
}
