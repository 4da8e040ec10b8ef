use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use consentry_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;
mod worker_internal;

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    Ok(build_routes(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors::build_cors_layer(frontend_url)?))
}

fn build_routes(app_state: AppState) -> Router {
    let consent_routes = Router::new()
        .route(
            "/api/v1/consent-requests",
            get(handlers::consent_requests::list_consent_requests_handler)
                .post(handlers::consent_requests::create_consent_request_handler),
        )
        .route(
            "/api/v1/consent-requests/{request_id}/approve",
            post(handlers::consent_requests::approve_consent_request_handler),
        )
        .route(
            "/api/v1/consent-requests/{request_id}/deny",
            post(handlers::consent_requests::deny_consent_request_handler),
        )
        .route(
            "/api/v1/consents",
            get(handlers::consents::list_consents_handler),
        )
        .route(
            "/api/v1/consents/expiring",
            get(handlers::consents::list_expiring_consents_handler),
        )
        .route(
            "/api/v1/consents/{consent_id}/revoke",
            post(handlers::consents::revoke_consent_handler),
        )
        .route(
            "/api/v1/consents/{consent_id}/presence-challenges",
            post(handlers::presence::issue_presence_challenge_handler),
        )
        .route(
            "/api/v1/consents/{consent_id}/presence-sessions",
            post(handlers::presence::verify_presence_challenge_handler),
        )
        .route(
            "/api/v1/access-checks",
            post(handlers::access_checks::check_access_handler),
        )
        .route(
            "/api/v1/audit-log",
            get(handlers::audit_log::list_audit_log_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_gateway_identity,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(consent_routes)
        .merge(worker_internal::build_worker_internal_routes(
            app_state.clone(),
        ))
        .with_state(app_state)
}
