use consentry_application::{IssuedPresenceChallenge, PresenceSession};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::timestamp;

/// Incoming payload carrying the code the patient shared.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/verify-presence-challenge-request.ts"
)]
pub struct VerifyPresenceChallengeRequest {
    pub code: String,
}

/// One-time code shown on the patient's device. Returned only once.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/presence-challenge-response.ts"
)]
pub struct PresenceChallengeResponse {
    pub challenge_id: String,
    pub consent_id: String,
    pub code: String,
    pub expires_at: String,
}

impl From<IssuedPresenceChallenge> for PresenceChallengeResponse {
    fn from(challenge: IssuedPresenceChallenge) -> Self {
        Self {
            challenge_id: challenge.challenge_id.to_string(),
            consent_id: challenge.consent_id.to_string(),
            code: challenge.code,
            expires_at: timestamp(challenge.expires_at),
        }
    }
}

/// Provider-present session started from a verified code.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/presence-session-response.ts"
)]
pub struct PresenceSessionResponse {
    pub session_id: String,
    pub consent_id: String,
    pub started_at: String,
    pub expires_at: String,
}

impl From<PresenceSession> for PresenceSessionResponse {
    fn from(session: PresenceSession) -> Self {
        Self {
            session_id: session.session_id.to_string(),
            consent_id: session.consent_id.to_string(),
            started_at: timestamp(session.started_at),
            expires_at: timestamp(session.expires_at),
        }
    }
}
