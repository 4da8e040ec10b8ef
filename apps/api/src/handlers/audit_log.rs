use axum::Json;
use axum::extract::{Extension, Query, State};

use consentry_application::AuditLogListInput;
use consentry_core::ActorIdentity;

use crate::dto::AuditLogEntryResponse;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct AuditLogQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub action: Option<String>,
}

pub async fn list_audit_log_handler(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    Query(query): Query<AuditLogQuery>,
) -> ApiResult<Json<Vec<AuditLogEntryResponse>>> {
    let entries = state
        .consent_service
        .list_audit_log(
            &actor,
            AuditLogListInput {
                limit: query.limit,
                offset: query.offset,
                action: query.action,
            },
        )
        .await?
        .into_iter()
        .map(AuditLogEntryResponse::from)
        .collect();

    Ok(Json(entries))
}
