use chrono::{DateTime, Utc};
use consentry_core::AppResult;
use consentry_domain::{AuditAction, Consent, ConsentStatus};

use crate::{AuditEvent, ConsentGrantRepository};

/// Resource type label for consent grants in the audit log.
pub(crate) const CONSENT_RESOURCE_TYPE: &str = "consent";

/// Resource type label for consent requests in the audit log.
pub(crate) const CONSENT_REQUEST_RESOURCE_TYPE: &str = "consent_request";

/// Outcome of settling a possibly-due grant.
pub(crate) enum ExpiryOutcome {
    /// The grant was not due.
    NotDue(Consent),
    /// This caller recorded the expiry.
    Expired(Consent),
    /// Another writer moved the grant first; holds the stored state.
    Lost(Consent),
}

impl ExpiryOutcome {
    pub(crate) fn into_consent(self) -> Consent {
        match self {
            Self::NotDue(consent) | Self::Expired(consent) | Self::Lost(consent) => consent,
        }
    }
}

/// Records the expiry of a due grant with compare-and-swap semantics.
///
/// The audit entry travels with the `active -> expired` swap, so only the
/// writer that wins it leaves a record and a failed write leaves the grant
/// due for the next attempt.
pub(crate) async fn settle_expiry(
    grants: &dyn ConsentGrantRepository,
    consent: Consent,
    actor: &str,
    now: DateTime<Utc>,
) -> AppResult<ExpiryOutcome> {
    let mut expired = consent.clone();
    if !expired.expire(now) {
        return Ok(ExpiryOutcome::NotDue(consent));
    }

    let event = AuditEvent {
        actor: actor.to_owned(),
        action: AuditAction::ConsentGrantExpired,
        resource_type: CONSENT_RESOURCE_TYPE.to_owned(),
        resource_id: expired.id().to_string(),
        patient_pin: expired.patient_pin().clone(),
        resulting_state: ConsentStatus::Expired.as_str().to_owned(),
        detail: Some(format!(
            "consent for '{}' expired at '{}'",
            expired.requester().requester_id(),
            expired.expires_at().to_rfc3339()
        )),
        occurred_at: now,
    };

    if !grants
        .transition_consent(&expired, ConsentStatus::Active, &event)
        .await?
    {
        let stored = grants
            .find_consent(consent.id())
            .await?
            .unwrap_or(expired);
        return Ok(ExpiryOutcome::Lost(stored));
    }

    Ok(ExpiryOutcome::Expired(expired))
}
