use super::checks::{check_consent_store, check_redis};
use super::*;

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let consent_store = check_consent_store(state.postgres_pool.clone()).await;
    let redis = check_redis(state.redis_client.clone()).await;

    let ready = consent_store.status == "ok" && redis.status != "error";
    let status = if ready { "ok" } else { "degraded" };
    let http_status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            ready,
            consent_store,
            redis,
        }),
    )
}
