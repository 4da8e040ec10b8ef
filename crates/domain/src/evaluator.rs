use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::consent::{Consent, ConsentId, ConsentStatus};
use crate::scope::{ConsentScope, DataAccessAttempt};

/// Why an access attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDenyReason {
    /// No grant exists between the provider and the patient.
    NoActiveConsent,
    /// The only grants were revoked.
    ConsentRevoked,
    /// The only grants are past their expiry.
    ConsentExpired,
    /// An active grant exists but none of its scopes covers the record.
    ScopeViolation,
}

impl AccessDenyReason {
    /// Returns the stable error code surfaced to clients.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoActiveConsent | Self::ConsentRevoked => "ACCESS_DENIED",
            Self::ConsentExpired => "CONSENT_EXPIRED",
            Self::ScopeViolation => "SCOPE_VIOLATION",
        }
    }

    /// Returns a human-readable explanation.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoActiveConsent => "no consent has been granted for this patient",
            Self::ConsentRevoked => "consent was revoked by the patient",
            Self::ConsentExpired => "consent has expired",
            Self::ScopeViolation => "requested record is outside the granted scope",
        }
    }
}

/// Outcome of evaluating an access attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Access is permitted by a grant.
    Allow {
        /// Grant that permits access.
        consent_id: ConsentId,
        /// Scope that covers the record.
        matched_scope: ConsentScope,
    },
    /// Access is refused.
    Deny(AccessDenyReason),
}

/// Evaluates one attempt against a single grant.
#[must_use]
pub fn evaluate_access(
    consent: &Consent,
    attempt: &DataAccessAttempt,
    now: DateTime<Utc>,
) -> AccessDecision {
    match consent.effective_status(now) {
        ConsentStatus::Revoked => AccessDecision::Deny(AccessDenyReason::ConsentRevoked),
        ConsentStatus::Expired => AccessDecision::Deny(AccessDenyReason::ConsentExpired),
        ConsentStatus::Active => consent
            .scope()
            .iter()
            .find(|scope| scope.covers(attempt, consent.episode_id(), now))
            .map_or(
                AccessDecision::Deny(AccessDenyReason::ScopeViolation),
                |matched_scope| AccessDecision::Allow {
                    consent_id: consent.id(),
                    matched_scope,
                },
            ),
    }
}

/// Evaluates one attempt against every grant a provider holds for a patient.
///
/// Any allowing grant wins. Otherwise the most informative refusal is
/// reported: a scope violation on a live grant before an expired grant,
/// before a revoked grant, before no grant at all.
#[must_use]
pub fn evaluate_access_across<'a>(
    consents: impl IntoIterator<Item = &'a Consent>,
    attempt: &DataAccessAttempt,
    now: DateTime<Utc>,
) -> AccessDecision {
    let mut strongest = AccessDenyReason::NoActiveConsent;

    for consent in consents {
        match evaluate_access(consent, attempt, now) {
            allow @ AccessDecision::Allow { .. } => return allow,
            AccessDecision::Deny(reason) => strongest = strongest.max(reason),
        }
    }

    AccessDecision::Deny(strongest)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{AccessDecision, AccessDenyReason, evaluate_access, evaluate_access_across};
    use crate::consent::{
        AccessDuration, ApprovalDecision, Consent, ConsentRequest, NewConsentRequest,
    };
    use crate::patient::{PatientPin, Requester, RequesterType};
    use crate::scope::{ConsentScope, DataAccessAttempt, RecordCategory, ScopeSet};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 24, 10, 30, 0)
            .single()
            .unwrap_or_default()
    }

    fn grant(scopes: &[ConsentScope], minutes: u32) -> Consent {
        let input = NewConsentRequest {
            patient_pin: PatientPin::new("UHB1234").unwrap_or_else(|_| unreachable!()),
            requester: Requester::new("L001", "MedLab Services", RequesterType::Lab)
                .unwrap_or_else(|_| unreachable!()),
            scope: ScopeSet::new(scopes.iter().copied()).unwrap_or_else(|_| unreachable!()),
            purpose: "Blood work".to_owned(),
            episode_id: Some("EP-1".to_owned()),
            requested_duration: AccessDuration::from_minutes(minutes)
                .unwrap_or_else(|_| unreachable!()),
        };
        let mut request = ConsentRequest::open(input, now()).unwrap_or_else(|_| unreachable!());
        request
            .approve(
                ApprovalDecision {
                    scope: None,
                    duration: None,
                },
                "patient-1",
                now(),
            )
            .unwrap_or_else(|_| unreachable!())
    }

    fn lab_report() -> DataAccessAttempt {
        DataAccessAttempt {
            category: RecordCategory::LabReport,
            episode_id: None,
            recorded_at: now() - Duration::days(10),
        }
    }

    fn clinical_note() -> DataAccessAttempt {
        DataAccessAttempt {
            category: RecordCategory::ClinicalNote,
            episode_id: None,
            recorded_at: now() - Duration::days(700),
        }
    }

    #[test]
    fn matching_scope_allows() {
        let consent = grant(&[ConsentScope::AllLabs], 60);
        let decision = evaluate_access(&consent, &lab_report(), now());
        assert_eq!(
            decision,
            AccessDecision::Allow {
                consent_id: consent.id(),
                matched_scope: ConsentScope::AllLabs,
            }
        );
    }

    #[test]
    fn out_of_scope_record_is_violation() {
        let consent = grant(&[ConsentScope::AllLabs], 60);
        assert_eq!(
            evaluate_access(&consent, &clinical_note(), now()),
            AccessDecision::Deny(AccessDenyReason::ScopeViolation)
        );
    }

    #[test]
    fn grant_past_expiry_is_expired_before_sweep() {
        let consent = grant(&[ConsentScope::AllLabs], 60);
        let decision = evaluate_access(&consent, &lab_report(), now() + Duration::minutes(60));
        assert_eq!(decision, AccessDecision::Deny(AccessDenyReason::ConsentExpired));
        assert_eq!(AccessDenyReason::ConsentExpired.code(), "CONSENT_EXPIRED");
    }

    #[test]
    fn revoked_grant_denies() {
        let mut consent = grant(&[ConsentScope::AllLabs], 60);
        assert!(consent.revoke("patient-1", None, now()).is_ok());
        assert_eq!(
            evaluate_access(&consent, &lab_report(), now()),
            AccessDecision::Deny(AccessDenyReason::ConsentRevoked)
        );
    }

    #[test]
    fn no_grants_denies_without_consent() {
        let decision = evaluate_access_across(Vec::<&Consent>::new(), &lab_report(), now());
        assert_eq!(decision, AccessDecision::Deny(AccessDenyReason::NoActiveConsent));
        assert_eq!(AccessDenyReason::NoActiveConsent.code(), "ACCESS_DENIED");
    }

    #[test]
    fn any_allowing_grant_wins() {
        let notes = grant(&[ConsentScope::NotesOnly], 60);
        let labs = grant(&[ConsentScope::AllLabs], 60);
        let decision = evaluate_access_across([&notes, &labs], &lab_report(), now());
        assert!(matches!(decision, AccessDecision::Allow { .. }));
    }

    #[test]
    fn scope_violation_outranks_expiry() {
        let expired = grant(&[ConsentScope::NotesOnly], 15);
        let live = grant(&[ConsentScope::AllLabs], 120);
        let later = now() + Duration::minutes(30);
        let decision = evaluate_access_across([&expired, &live], &clinical_note(), later);
        assert_eq!(decision, AccessDecision::Deny(AccessDenyReason::ScopeViolation));
    }

    #[test]
    fn expiry_outranks_revocation() {
        let mut revoked = grant(&[ConsentScope::AllLabs], 120);
        assert!(revoked.revoke("patient-1", None, now()).is_ok());
        let expired = grant(&[ConsentScope::AllLabs], 15);
        let later = now() + Duration::minutes(30);
        let decision = evaluate_access_across([&revoked, &expired], &lab_report(), later);
        assert_eq!(decision, AccessDecision::Deny(AccessDenyReason::ConsentExpired));
    }
}
