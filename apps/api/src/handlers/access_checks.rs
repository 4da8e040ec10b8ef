use axum::Json;
use axum::extract::{Extension, State};

use consentry_application::AccessCheckInput;
use consentry_core::ActorIdentity;
use consentry_domain::AccessDecision;

use crate::dto::{AccessCheckRequest, AccessCheckResponse};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn check_access_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Json(payload): Json<AccessCheckRequest>,
) -> ApiResult<Json<AccessCheckResponse>> {
    let decision = state
        .consent_service
        .check_access(
            &actor,
            AccessCheckInput {
                patient_pin: payload.patient_pin,
                category: payload.category,
                episode_id: payload.episode_id,
                recorded_at: payload.recorded_at,
            },
        )
        .await?;

    match decision {
        AccessDecision::Allow {
            consent_id,
            matched_scope,
        } => Ok(Json(AccessCheckResponse::allowed(
            consent_id.to_string(),
            matched_scope,
        ))),
        AccessDecision::Deny(reason) => {
            tracing::info!(
                subject = actor.subject(),
                code = reason.code(),
                "access attempt refused"
            );
            Err(ApiError::AccessDenied(reason))
        }
    }
}
