use consentry_domain::{Consent, ConsentRequest};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::timestamp;

/// Incoming payload for a provider's consent request.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/create-consent-request-request.ts"
)]
pub struct CreateConsentRequestRequest {
    pub patient_pin: String,
    pub scope: Vec<String>,
    pub purpose: String,
    pub episode_id: Option<String>,
    pub duration_minutes: Option<u32>,
    pub requester_type: Option<String>,
}

/// Incoming payload for approving a request, optionally narrowing it.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/approve-consent-request-request.ts"
)]
pub struct ApproveConsentRequestRequest {
    pub scope: Option<Vec<String>>,
    pub duration_minutes: Option<u32>,
}

/// Incoming payload for denying a request.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/deny-consent-request-request.ts"
)]
pub struct DenyConsentRequestRequest {
    pub reason: Option<String>,
}

/// Incoming payload for revoking a grant.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/revoke-consent-request.ts"
)]
pub struct RevokeConsentRequest {
    pub reason: Option<String>,
}

/// API representation of a consent request.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/consent-request-response.ts"
)]
pub struct ConsentRequestResponse {
    pub request_id: String,
    pub patient_pin: String,
    pub requester_id: String,
    pub requester_name: String,
    pub requester_type: String,
    pub scope: Vec<String>,
    pub purpose: String,
    pub episode_id: Option<String>,
    pub requested_duration_minutes: u32,
    pub status: String,
    pub created_at: String,
    pub resolved_at: Option<String>,
    pub resolved_by: Option<String>,
    pub resolution_note: Option<String>,
}

impl From<ConsentRequest> for ConsentRequestResponse {
    fn from(request: ConsentRequest) -> Self {
        Self {
            request_id: request.id().to_string(),
            patient_pin: request.patient_pin().as_str().to_owned(),
            requester_id: request.requester().requester_id().to_owned(),
            requester_name: request.requester().requester_name().to_owned(),
            requester_type: request.requester().requester_type().as_str().to_owned(),
            scope: owned_values(request.scope().storage_values()),
            purpose: request.purpose().to_owned(),
            episode_id: request.episode_id().map(ToOwned::to_owned),
            requested_duration_minutes: request.requested_duration().minutes(),
            status: request.status().as_str().to_owned(),
            created_at: timestamp(request.created_at()),
            resolved_at: request.resolved_at().map(timestamp),
            resolved_by: request.resolved_by().map(ToOwned::to_owned),
            resolution_note: request.resolution_note().map(ToOwned::to_owned),
        }
    }
}

/// API representation of a consent grant.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/consent-response.ts"
)]
pub struct ConsentResponse {
    pub consent_id: String,
    pub request_id: String,
    pub patient_pin: String,
    pub requester_id: String,
    pub requester_name: String,
    pub requester_type: String,
    pub scope: Vec<String>,
    pub episode_id: Option<String>,
    pub status: String,
    pub created_at: String,
    pub expires_at: String,
    pub revoked_at: Option<String>,
    pub revoked_by: Option<String>,
    pub revoke_reason: Option<String>,
    pub expired_at: Option<String>,
}

impl From<Consent> for ConsentResponse {
    fn from(consent: Consent) -> Self {
        Self {
            consent_id: consent.id().to_string(),
            request_id: consent.request_id().to_string(),
            patient_pin: consent.patient_pin().as_str().to_owned(),
            requester_id: consent.requester().requester_id().to_owned(),
            requester_name: consent.requester().requester_name().to_owned(),
            requester_type: consent.requester().requester_type().as_str().to_owned(),
            scope: owned_values(consent.scope().storage_values()),
            episode_id: consent.episode_id().map(ToOwned::to_owned),
            status: consent.status().as_str().to_owned(),
            created_at: timestamp(consent.created_at()),
            expires_at: timestamp(consent.expires_at()),
            revoked_at: consent.revoked_at().map(timestamp),
            revoked_by: consent.revoked_by().map(ToOwned::to_owned),
            revoke_reason: consent.revoke_reason().map(ToOwned::to_owned),
            expired_at: consent.expired_at().map(timestamp),
        }
    }
}

fn owned_values(values: Vec<&'static str>) -> Vec<String> {
    values.into_iter().map(ToOwned::to_owned).collect()
}
