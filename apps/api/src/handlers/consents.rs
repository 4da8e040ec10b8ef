use axum::Json;
use axum::extract::{Extension, Path, Query, State};

use consentry_application::ConsentListFilter;
use consentry_core::ActorIdentity;
use consentry_domain::ConsentId;

use crate::dto::{ConsentResponse, RevokeConsentRequest};
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct ConsentListQuery {
    pub status: Option<String>,
    pub patient_pin: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct ExpiringConsentsQuery {
    pub within_minutes: Option<u32>,
}

pub async fn list_consents_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Query(query): Query<ConsentListQuery>,
) -> ApiResult<Json<Vec<ConsentResponse>>> {
    let consents = state
        .consent_service
        .list_consents(
            &actor,
            ConsentListFilter {
                status: query.status,
                patient_pin: query.patient_pin,
            },
        )
        .await?
        .into_iter()
        .map(ConsentResponse::from)
        .collect();

    Ok(Json(consents))
}

pub async fn list_expiring_consents_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Query(query): Query<ExpiringConsentsQuery>,
) -> ApiResult<Json<Vec<ConsentResponse>>> {
    let consents = state
        .consent_service
        .list_expiring_consents(&actor, query.within_minutes)
        .await?
        .into_iter()
        .map(ConsentResponse::from)
        .collect();

    Ok(Json(consents))
}

pub async fn revoke_consent_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Path(consent_id): Path<String>,
    Json(payload): Json<RevokeConsentRequest>,
) -> ApiResult<Json<ConsentResponse>> {
    let consent_id = ConsentId::parse(consent_id.as_str())?;
    let consent = state
        .consent_service
        .revoke_consent(&actor, consent_id, payload.reason)
        .await?;

    tracing::info!(consent_id = %consent_id, "consent revoked");

    Ok(Json(ConsentResponse::from(consent)))
}
