use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;

use consentry_core::ActorIdentity;
use consentry_domain::ConsentId;

use crate::dto::{
    PresenceChallengeResponse, PresenceSessionResponse, VerifyPresenceChallengeRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn issue_presence_challenge_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(consent_id): Path<String>,
) -> ApiResult<(StatusCode, Json<PresenceChallengeResponse>)> {
    let consent_id = ConsentId::parse(consent_id.as_str())?;
    let challenge = state
        .presence_service
        .issue_challenge(&actor, consent_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PresenceChallengeResponse::from(challenge)),
    ))
}

pub async fn verify_presence_challenge_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(consent_id): Path<String>,
    Json(payload): Json<VerifyPresenceChallengeRequest>,
) -> ApiResult<(StatusCode, Json<PresenceSessionResponse>)> {
    let consent_id = ConsentId::parse(consent_id.as_str())?;
    let session = state
        .presence_service
        .verify_challenge(&actor, consent_id, payload.code.as_str())
        .await?;

    tracing::info!(
        consent_id = %consent_id,
        session_id = %session.session_id,
        "presence session started"
    );

    Ok((
        StatusCode::CREATED,
        Json(PresenceSessionResponse::from(session)),
    ))
}
