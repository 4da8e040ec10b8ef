use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;

use consentry_application::{ApproveConsentRequestInput, CreateConsentRequestInput};
use consentry_core::ActorIdentity;
use consentry_domain::ConsentRequestId;

use crate::dto::{
    ApproveConsentRequestRequest, ConsentRequestResponse, ConsentResponse,
    CreateConsentRequestRequest, DenyConsentRequestRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct ConsentRequestListQuery {
    pub status: Option<String>,
}

pub async fn create_consent_request_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Json(payload): Json<CreateConsentRequestRequest>,
) -> ApiResult<(StatusCode, Json<ConsentRequestResponse>)> {
    let request = state
        .consent_service
        .create_request(
            &actor,
            CreateConsentRequestInput {
                patient_pin: payload.patient_pin,
                scope: payload.scope,
                purpose: payload.purpose,
                episode_id: payload.episode_id,
                duration_minutes: payload.duration_minutes,
                requester_type: payload.requester_type,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ConsentRequestResponse::from(request)),
    ))
}

pub async fn list_consent_requests_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Query(query): Query<ConsentRequestListQuery>,
) -> ApiResult<Json<Vec<ConsentRequestResponse>>> {
    let requests = state
        .consent_service
        .list_requests(&actor, query.status.as_deref())
        .await?
        .into_iter()
        .map(ConsentRequestResponse::from)
        .collect();

    Ok(Json(requests))
}

pub async fn approve_consent_request_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(request_id): Path<String>,
    Json(payload): Json<ApproveConsentRequestRequest>,
) -> ApiResult<(StatusCode, Json<ConsentResponse>)> {
    let request_id = ConsentRequestId::parse(request_id.as_str())?;
    let consent = state
        .consent_service
        .approve_request(
            &actor,
            request_id,
            ApproveConsentRequestInput {
                scope: payload.scope,
                duration_minutes: payload.duration_minutes,
            },
        )
        .await?;

    tracing::info!(
        request_id = %request_id,
        consent_id = %consent.id(),
        expires_at = %consent.expires_at(),
        "consent granted"
    );

    Ok((StatusCode::CREATED, Json(ConsentResponse::from(consent))))
}

pub async fn deny_consent_request_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(request_id): Path<String>,
    Json(payload): Json<DenyConsentRequestRequest>,
) -> ApiResult<Json<ConsentRequestResponse>> {
    let request_id = ConsentRequestId::parse(request_id.as_str())?;
    let request = state
        .consent_service
        .deny_request(&actor, request_id, payload.reason)
        .await?;

    Ok(Json(ConsentRequestResponse::from(request)))
}
