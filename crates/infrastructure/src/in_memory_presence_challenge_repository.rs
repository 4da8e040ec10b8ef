use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consentry_application::{
    AuditEvent, ChallengeConsumption, PresenceChallenge, PresenceChallengeRepository,
};
use consentry_core::{AppError, AppResult};
use consentry_domain::ConsentId;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::InMemoryAuditRepository;

/// In-memory presence challenge store.
#[derive(Debug)]
pub struct InMemoryPresenceChallengeRepository {
    challenges: RwLock<HashMap<Uuid, PresenceChallenge>>,
    audit: Arc<InMemoryAuditRepository>,
}

impl InMemoryPresenceChallengeRepository {
    /// Creates an empty store writing events into `audit`.
    #[must_use]
    pub fn new(audit: Arc<InMemoryAuditRepository>) -> Self {
        Self {
            challenges: RwLock::new(HashMap::new()),
            audit,
        }
    }
}

#[async_trait]
impl PresenceChallengeRepository for InMemoryPresenceChallengeRepository {
    async fn create_challenge(
        &self,
        challenge: &PresenceChallenge,
        event: &AuditEvent,
    ) -> AppResult<()> {
        let mut challenges = self.challenges.write().await;
        challenges.insert(challenge.challenge_id, challenge.clone());
        self.audit.record(std::slice::from_ref(event)).await;
        Ok(())
    }

    async fn find_open_challenge(
        &self,
        consent_id: ConsentId,
        now: DateTime<Utc>,
    ) -> AppResult<Option<PresenceChallenge>> {
        Ok(self
            .challenges
            .read()
            .await
            .values()
            .filter(|challenge| {
                challenge.consent_id == consent_id
                    && challenge.consumed_at.is_none()
                    && challenge.expires_at > now
            })
            .max_by_key(|challenge| challenge.issued_at)
            .cloned())
    }

    async fn record_failed_attempt(&self, challenge_id: Uuid) -> AppResult<u32> {
        let mut challenges = self.challenges.write().await;
        let challenge = challenges.get_mut(&challenge_id).ok_or_else(|| {
            AppError::NotFound(format!("presence challenge '{challenge_id}' does not exist"))
        })?;

        challenge.failed_attempts = challenge.failed_attempts.saturating_add(1);
        Ok(challenge.failed_attempts)
    }

    async fn consume_challenge(
        &self,
        challenge_id: Uuid,
        now: DateTime<Utc>,
        max_failed_attempts: u32,
        event: &AuditEvent,
    ) -> AppResult<ChallengeConsumption> {
        let mut challenges = self.challenges.write().await;
        let challenge = challenges.get_mut(&challenge_id).ok_or_else(|| {
            AppError::NotFound(format!("presence challenge '{challenge_id}' does not exist"))
        })?;

        if challenge.consumed_at.is_some() {
            return Ok(ChallengeConsumption::AlreadyConsumed);
        }
        if challenge.failed_attempts >= max_failed_attempts {
            return Ok(ChallengeConsumption::Locked);
        }

        challenge.consumed_at = Some(now);
        self.audit.record(std::slice::from_ref(event)).await;
        Ok(ChallengeConsumption::Consumed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use consentry_application::{
        AuditEvent, AuditLogQuery, AuditLogRepository, ChallengeConsumption, PresenceChallenge,
        PresenceChallengeRepository,
    };
    use consentry_domain::{AuditAction, ConsentId, PatientPin};
    use uuid::Uuid;

    use super::InMemoryPresenceChallengeRepository;
    use crate::InMemoryAuditRepository;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 24, 10, 30, 0)
            .single()
            .unwrap_or_default()
    }

    fn pin() -> PatientPin {
        PatientPin::new("UHB1234").unwrap_or_else(|_| unreachable!())
    }

    fn event(action: AuditAction) -> AuditEvent {
        AuditEvent {
            actor: "patient-1".to_owned(),
            action,
            resource_type: "consent".to_owned(),
            resource_id: "c-1".to_owned(),
            patient_pin: pin(),
            resulting_state: "active".to_owned(),
            detail: None,
            occurred_at: now(),
        }
    }

    fn challenge() -> PresenceChallenge {
        PresenceChallenge {
            challenge_id: Uuid::new_v4(),
            consent_id: ConsentId::new(),
            code_hash: "hash".to_owned(),
            issued_by: "patient-1".to_owned(),
            issued_at: now(),
            expires_at: now() + Duration::minutes(5),
            failed_attempts: 0,
            consumed_at: None,
        }
    }

    async fn audit_count(audit: &InMemoryAuditRepository) -> usize {
        audit
            .list_recent_entries(AuditLogQuery {
                patient_pin: pin(),
                limit: 200,
                offset: 0,
                action: None,
            })
            .await
            .map(|entries| entries.len())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn locked_challenge_cannot_be_consumed() {
        let audit = Arc::new(InMemoryAuditRepository::new());
        let repository = InMemoryPresenceChallengeRepository::new(audit.clone());
        let stored = challenge();
        assert!(repository
            .create_challenge(&stored, &event(AuditAction::ConsentPresenceChallengeIssued))
            .await
            .is_ok());

        for _ in 0..5 {
            assert!(repository
                .record_failed_attempt(stored.challenge_id)
                .await
                .is_ok());
        }

        let outcome = repository
            .consume_challenge(
                stored.challenge_id,
                now(),
                5,
                &event(AuditAction::ConsentPresenceVerified),
            )
            .await;
        assert_eq!(outcome.ok(), Some(ChallengeConsumption::Locked));
        assert_eq!(audit_count(&audit).await, 1);
    }

    #[tokio::test]
    async fn challenge_is_consumed_once() {
        let audit = Arc::new(InMemoryAuditRepository::new());
        let repository = InMemoryPresenceChallengeRepository::new(audit.clone());
        let stored = challenge();
        assert!(repository
            .create_challenge(&stored, &event(AuditAction::ConsentPresenceChallengeIssued))
            .await
            .is_ok());

        let verified = event(AuditAction::ConsentPresenceVerified);
        let first = repository
            .consume_challenge(stored.challenge_id, now(), 5, &verified)
            .await;
        let second = repository
            .consume_challenge(stored.challenge_id, now(), 5, &verified)
            .await;

        assert_eq!(first.ok(), Some(ChallengeConsumption::Consumed));
        assert_eq!(second.ok(), Some(ChallengeConsumption::AlreadyConsumed));
        assert_eq!(audit_count(&audit).await, 2);
    }
}
