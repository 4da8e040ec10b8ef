use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consentry_core::AppResult;
use consentry_domain::ConsentId;
use uuid::Uuid;

use crate::AuditEvent;

/// Stored presence verification challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceChallenge {
    /// Challenge identifier.
    pub challenge_id: Uuid,
    /// Grant the challenge belongs to.
    pub consent_id: ConsentId,
    /// SHA-256 hash of the one-time code.
    pub code_hash: String,
    /// Patient subject that issued the code.
    pub issued_by: String,
    /// Issue timestamp.
    pub issued_at: DateTime<Utc>,
    /// Code expiry timestamp.
    pub expires_at: DateTime<Utc>,
    /// Number of wrong codes submitted.
    pub failed_attempts: u32,
    /// When the code was redeemed.
    pub consumed_at: Option<DateTime<Utc>>,
}

/// Result of trying to redeem a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeConsumption {
    /// This caller redeemed the challenge.
    Consumed,
    /// The challenge was redeemed earlier or does not exist.
    AlreadyConsumed,
    /// The challenge reached the failed attempt limit.
    Locked,
}

/// Repository port for presence challenges.
#[async_trait]
pub trait PresenceChallengeRepository: Send + Sync {
    /// Stores a new challenge together with its audit event.
    async fn create_challenge(
        &self,
        challenge: &PresenceChallenge,
        event: &AuditEvent,
    ) -> AppResult<()>;

    /// Finds the newest unconsumed, unexpired challenge for a grant.
    async fn find_open_challenge(
        &self,
        consent_id: ConsentId,
        now: DateTime<Utc>,
    ) -> AppResult<Option<PresenceChallenge>>;

    /// Increments the failed attempt counter and returns the new value.
    async fn record_failed_attempt(&self, challenge_id: Uuid) -> AppResult<u32>;

    /// Marks a challenge consumed while it is unconsumed and has fewer than
    /// `max_failed_attempts` failures, appending `event` in the same unit.
    ///
    /// The lock check and the consume happen atomically, so a challenge that
    /// locked after it was read can no longer be redeemed.
    async fn consume_challenge(
        &self,
        challenge_id: Uuid,
        now: DateTime<Utc>,
        max_failed_attempts: u32,
        event: &AuditEvent,
    ) -> AppResult<ChallengeConsumption>;
}
