//! Provider presence verification with patient-issued one-time codes.
//!
//! Codes are random, stored as SHA-256 hashes, single-use and short-lived.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use consentry_core::{ActorIdentity, AppError, AppResult};
use consentry_domain::{AuditAction, Consent, ConsentId, ConsentStatus, Permission};
use uuid::Uuid;

use crate::expiry::{CONSENT_RESOURCE_TYPE, settle_expiry};
use crate::{
    AuditEvent, AuthorizationService, ChallengeConsumption, Clock, ConsentGrantRepository,
    PresenceChallenge, PresenceChallengeRepository,
};

mod otp_crypto;

/// Lifetime of an issued code.
const CHALLENGE_TTL_MINUTES: i64 = 5;

/// Upper bound for a presence session started from one code.
const SESSION_TTL_MINUTES: i64 = 60;

/// Wrong codes tolerated before a challenge locks.
const MAX_FAILED_ATTEMPTS: u32 = 5;

/// Code returned once to the issuing patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedPresenceChallenge {
    /// Challenge identifier.
    pub challenge_id: Uuid,
    /// Grant the code unlocks.
    pub consent_id: ConsentId,
    /// Raw six-digit code.
    pub code: String,
    /// Code expiry timestamp.
    pub expires_at: DateTime<Utc>,
}

/// Provider-present session started from a redeemed code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSession {
    /// Session identifier.
    pub session_id: Uuid,
    /// Grant the session runs under.
    pub consent_id: ConsentId,
    /// Session start.
    pub started_at: DateTime<Utc>,
    /// Session end; never past the grant's expiry.
    pub expires_at: DateTime<Utc>,
}

/// Application service for presence verification.
#[derive(Clone)]
pub struct PresenceService {
    authorization_service: AuthorizationService,
    grant_repository: Arc<dyn ConsentGrantRepository>,
    challenge_repository: Arc<dyn PresenceChallengeRepository>,
    clock: Arc<dyn Clock>,
}

impl PresenceService {
    /// Creates a presence service from port implementations.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        grant_repository: Arc<dyn ConsentGrantRepository>,
        challenge_repository: Arc<dyn PresenceChallengeRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            authorization_service,
            grant_repository,
            challenge_repository,
            clock,
        }
    }

    /// Issues a one-time code for an active grant owned by the patient.
    pub async fn issue_challenge(
        &self,
        actor: &ActorIdentity,
        consent_id: ConsentId,
    ) -> AppResult<IssuedPresenceChallenge> {
        self.authorization_service
            .require_permission(actor, Permission::ConsentPresenceIssue)?;

        let consent = self.load_consent(consent_id).await?;
        self.authorization_service
            .require_own_pin(actor, consent.patient_pin())?;

        let now = self.clock.now();
        let consent = self.require_active(actor, consent, now).await?;

        let (code, code_hash) = otp_crypto::generate_code(consent.id())?;
        let challenge = PresenceChallenge {
            challenge_id: Uuid::new_v4(),
            consent_id: consent.id(),
            code_hash,
            issued_by: actor.subject().to_owned(),
            issued_at: now,
            expires_at: now + Duration::minutes(CHALLENGE_TTL_MINUTES),
            failed_attempts: 0,
            consumed_at: None,
        };
        let event = AuditEvent {
            actor: actor.subject().to_owned(),
            action: AuditAction::ConsentPresenceChallengeIssued,
            resource_type: CONSENT_RESOURCE_TYPE.to_owned(),
            resource_id: consent.id().to_string(),
            patient_pin: consent.patient_pin().clone(),
            resulting_state: consent.status().as_str().to_owned(),
            detail: Some(format!(
                "issued presence code for '{}' valid until '{}'",
                consent.requester().requester_id(),
                challenge.expires_at.to_rfc3339()
            )),
            occurred_at: now,
        };
        self.challenge_repository
            .create_challenge(&challenge, &event)
            .await?;

        Ok(IssuedPresenceChallenge {
            challenge_id: challenge.challenge_id,
            consent_id: consent.id(),
            code,
            expires_at: challenge.expires_at,
        })
    }

    /// Redeems a code and starts a presence session for the grant's requester.
    pub async fn verify_challenge(
        &self,
        actor: &ActorIdentity,
        consent_id: ConsentId,
        code: &str,
    ) -> AppResult<PresenceSession> {
        self.authorization_service
            .require_permission(actor, Permission::ConsentPresenceVerify)?;

        let consent = self.load_consent(consent_id).await?;
        self.authorization_service
            .require_requester(actor, consent.requester())?;

        let now = self.clock.now();
        let consent = self.require_active(actor, consent, now).await?;

        let challenge = self
            .challenge_repository
            .find_open_challenge(consent.id(), now)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "no open presence challenge exists for consent '{consent_id}'"
                ))
            })?;

        if challenge.failed_attempts >= MAX_FAILED_ATTEMPTS {
            return Err(locked_error(consent_id));
        }

        if otp_crypto::hash_code(consent.id(), code.trim()) != challenge.code_hash {
            let failed_attempts = self
                .challenge_repository
                .record_failed_attempt(challenge.challenge_id)
                .await?;
            if failed_attempts >= MAX_FAILED_ATTEMPTS {
                return Err(locked_error(consent_id));
            }

            return Err(AppError::Unauthorized(format!(
                "invalid presence code, {} attempt(s) left",
                MAX_FAILED_ATTEMPTS - failed_attempts
            )));
        }

        let session = PresenceSession {
            session_id: Uuid::new_v4(),
            consent_id: consent.id(),
            started_at: now,
            expires_at: (challenge.issued_at + Duration::minutes(SESSION_TTL_MINUTES))
                .min(consent.expires_at()),
        };
        let event = AuditEvent {
            actor: actor.subject().to_owned(),
            action: AuditAction::ConsentPresenceVerified,
            resource_type: CONSENT_RESOURCE_TYPE.to_owned(),
            resource_id: consent.id().to_string(),
            patient_pin: consent.patient_pin().clone(),
            resulting_state: consent.status().as_str().to_owned(),
            detail: Some(format!(
                "presence session '{}' started until '{}'",
                session.session_id,
                session.expires_at.to_rfc3339()
            )),
            occurred_at: now,
        };

        // Failures recorded after the read still lock the challenge.
        match self
            .challenge_repository
            .consume_challenge(challenge.challenge_id, now, MAX_FAILED_ATTEMPTS, &event)
            .await?
        {
            ChallengeConsumption::Consumed => Ok(session),
            ChallengeConsumption::Locked => Err(locked_error(consent_id)),
            ChallengeConsumption::AlreadyConsumed => Err(AppError::NotFound(format!(
                "presence challenge '{}' was already used",
                challenge.challenge_id
            ))),
        }
    }

    async fn load_consent(&self, consent_id: ConsentId) -> AppResult<Consent> {
        self.grant_repository
            .find_consent(consent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("consent '{consent_id}' does not exist")))
    }

    async fn require_active(
        &self,
        actor: &ActorIdentity,
        consent: Consent,
        now: DateTime<Utc>,
    ) -> AppResult<Consent> {
        let consent = settle_expiry(
            self.grant_repository.as_ref(),
            consent,
            actor.subject(),
            now,
        )
        .await?
        .into_consent();

        if consent.status() != ConsentStatus::Active {
            return Err(AppError::Conflict(format!(
                "consent '{}' is {}",
                consent.id(),
                consent.status().as_str()
            )));
        }

        Ok(consent)
    }
}

fn locked_error(consent_id: ConsentId) -> AppError {
    AppError::Forbidden(format!(
        "presence challenge for consent '{consent_id}' is locked after {MAX_FAILED_ATTEMPTS} failed attempts"
    ))
}

#[cfg(test)]
mod tests;
