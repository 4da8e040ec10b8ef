use chrono::{DateTime, Utc};
use consentry_domain::ConsentScope;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Incoming payload describing one attempt to read patient data.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/access-check-request.ts"
)]
pub struct AccessCheckRequest {
    pub patient_pin: String,
    pub category: String,
    pub episode_id: Option<String>,
    #[ts(type = "string")]
    pub recorded_at: DateTime<Utc>,
}

/// Successful access decision.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/access-check-response.ts"
)]
pub struct AccessCheckResponse {
    pub allowed: bool,
    pub consent_id: String,
    pub matched_scope: String,
}

impl AccessCheckResponse {
    pub fn allowed(consent_id: String, matched_scope: ConsentScope) -> Self {
        Self {
            allowed: true,
            consent_id,
            matched_scope: matched_scope.as_str().to_owned(),
        }
    }
}
