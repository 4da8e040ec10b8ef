use std::str::FromStr;

use chrono::{DateTime, Utc};
use consentry_core::{AppError, AppResult};
use consentry_domain::{
    AccessDuration, Consent, ConsentId, ConsentRequest, ConsentRequestId, ConsentRequestSnapshot,
    ConsentRequestStatus, ConsentSnapshot, ConsentStatus, PatientPin, Requester, RequesterType,
    ScopeSet,
};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, FromRow)]
pub(super) struct ConsentRequestRow {
    id: Uuid,
    patient_pin: String,
    requester_id: String,
    requester_name: String,
    requester_type: String,
    scope: Vec<String>,
    purpose: String,
    episode_id: Option<String>,
    requested_duration_minutes: i32,
    status: String,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    resolved_by: Option<String>,
    resolution_note: Option<String>,
}

impl ConsentRequestRow {
    fn into_snapshot(self) -> AppResult<ConsentRequestSnapshot> {
        let minutes = u32::try_from(self.requested_duration_minutes).map_err(|_| {
            AppError::Validation("requested duration must not be negative".to_owned())
        })?;

        Ok(ConsentRequestSnapshot {
            id: ConsentRequestId::from_uuid(self.id),
            patient_pin: PatientPin::new(self.patient_pin)?,
            requester: Requester::new(
                self.requester_id,
                self.requester_name,
                RequesterType::from_str(self.requester_type.as_str())?,
            )?,
            scope: ScopeSet::from_transport(self.scope.as_slice())?,
            purpose: self.purpose,
            episode_id: self.episode_id,
            requested_duration: AccessDuration::from_minutes(minutes)?,
            created_at: self.created_at,
            status: ConsentRequestStatus::from_str(self.status.as_str())?,
            resolved_at: self.resolved_at,
            resolved_by: self.resolved_by,
            resolution_note: self.resolution_note,
        })
    }
}

impl TryFrom<ConsentRequestRow> for ConsentRequest {
    type Error = AppError;

    fn try_from(row: ConsentRequestRow) -> AppResult<Self> {
        let id = row.id;
        let snapshot = row
            .into_snapshot()
            .map_err(|error| stored_row_error("consent request", id, error))?;

        ConsentRequest::restore(snapshot)
    }
}

#[derive(Debug, FromRow)]
pub(super) struct ConsentRow {
    id: Uuid,
    request_id: Uuid,
    patient_pin: String,
    requester_id: String,
    requester_name: String,
    requester_type: String,
    scope: Vec<String>,
    episode_id: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
    revoked_by: Option<String>,
    revoke_reason: Option<String>,
    expired_at: Option<DateTime<Utc>>,
}

impl ConsentRow {
    fn into_snapshot(self) -> AppResult<ConsentSnapshot> {
        Ok(ConsentSnapshot {
            id: ConsentId::from_uuid(self.id),
            request_id: ConsentRequestId::from_uuid(self.request_id),
            patient_pin: PatientPin::new(self.patient_pin)?,
            requester: Requester::new(
                self.requester_id,
                self.requester_name,
                RequesterType::from_str(self.requester_type.as_str())?,
            )?,
            scope: ScopeSet::from_transport(self.scope.as_slice())?,
            episode_id: self.episode_id,
            status: ConsentStatus::from_str(self.status.as_str())?,
            created_at: self.created_at,
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
            revoked_by: self.revoked_by,
            revoke_reason: self.revoke_reason,
            expired_at: self.expired_at,
        })
    }
}

impl TryFrom<ConsentRow> for Consent {
    type Error = AppError;

    fn try_from(row: ConsentRow) -> AppResult<Self> {
        let id = row.id;
        let snapshot = row
            .into_snapshot()
            .map_err(|error| stored_row_error("consent", id, error))?;

        Consent::restore(snapshot)
    }
}

fn stored_row_error(label: &str, id: Uuid, error: AppError) -> AppError {
    AppError::Internal(format!("stored {label} '{id}' is invalid: {error}"))
}

pub(super) fn scope_values(scope: &ScopeSet) -> Vec<String> {
    scope
        .storage_values()
        .into_iter()
        .map(str::to_owned)
        .collect()
}
