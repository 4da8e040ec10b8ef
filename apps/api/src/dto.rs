mod access;
mod audit;
mod common;
mod consents;
mod presence;
mod sweeps;

pub use access::{AccessCheckRequest, AccessCheckResponse};
pub use audit::AuditLogEntryResponse;
pub use common::{HealthDependencyStatus, HealthResponse};
pub use consents::{
    ApproveConsentRequestRequest, ConsentRequestResponse, ConsentResponse,
    CreateConsentRequestRequest, DenyConsentRequestRequest, RevokeConsentRequest,
};
pub use presence::{
    PresenceChallengeResponse, PresenceSessionResponse, VerifyPresenceChallengeRequest,
};
pub use sweeps::{ExpirySweepRequest, ExpirySweepResponse};

use chrono::{DateTime, SecondsFormat, Utc};

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::{
        AccessCheckRequest, AccessCheckResponse, ApproveConsentRequestRequest,
        AuditLogEntryResponse, ConsentRequestResponse, ConsentResponse,
        CreateConsentRequestRequest, DenyConsentRequestRequest, ExpirySweepRequest,
        ExpirySweepResponse, HealthDependencyStatus, HealthResponse, PresenceChallengeResponse,
        PresenceSessionResponse, RevokeConsentRequest, VerifyPresenceChallengeRequest,
    };

    use crate::error::ErrorResponse;
    use ts_rs::Config;
    use ts_rs::TS;

    #[test]
    fn export_ts_bindings() -> Result<(), ts_rs::ExportError> {
        let config = Config::default();

        AccessCheckRequest::export(&config)?;
        AccessCheckResponse::export(&config)?;
        ApproveConsentRequestRequest::export(&config)?;
        AuditLogEntryResponse::export(&config)?;
        ConsentRequestResponse::export(&config)?;
        ConsentResponse::export(&config)?;
        CreateConsentRequestRequest::export(&config)?;
        DenyConsentRequestRequest::export(&config)?;
        ErrorResponse::export(&config)?;
        ExpirySweepRequest::export(&config)?;
        ExpirySweepResponse::export(&config)?;
        HealthDependencyStatus::export(&config)?;
        HealthResponse::export(&config)?;
        PresenceChallengeResponse::export(&config)?;
        PresenceSessionResponse::export(&config)?;
        RevokeConsentRequest::export(&config)?;
        VerifyPresenceChallengeRequest::export(&config)?;

        Ok(())
    }
}
