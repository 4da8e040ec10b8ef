use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use consentry_application::{
    AuditEvent, ChallengeConsumption, PresenceChallenge, PresenceChallengeRepository,
};
use consentry_core::{AppError, AppResult};
use consentry_domain::ConsentId;

use crate::postgres_audit_events::insert_audit_events;

/// PostgreSQL-backed presence challenge store.
#[derive(Clone)]
pub struct PostgresPresenceChallengeRepository {
    pool: PgPool,
}

impl PostgresPresenceChallengeRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start presence transaction: {error}"))
        })
    }

    async fn commit(transaction: Transaction<'_, Postgres>) -> AppResult<()> {
        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit presence transaction: {error}"))
        })
    }
}

#[derive(Debug, FromRow)]
struct PresenceChallengeRow {
    id: Uuid,
    consent_id: Uuid,
    code_hash: String,
    issued_by: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    failed_attempts: i32,
    consumed_at: Option<DateTime<Utc>>,
}

impl From<PresenceChallengeRow> for PresenceChallenge {
    fn from(row: PresenceChallengeRow) -> Self {
        Self {
            challenge_id: row.id,
            consent_id: ConsentId::from_uuid(row.consent_id),
            code_hash: row.code_hash,
            issued_by: row.issued_by,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            failed_attempts: u32::try_from(row.failed_attempts).unwrap_or_default(),
            consumed_at: row.consumed_at,
        }
    }
}

#[async_trait]
impl PresenceChallengeRepository for PostgresPresenceChallengeRepository {
    async fn create_challenge(
        &self,
        challenge: &PresenceChallenge,
        event: &AuditEvent,
    ) -> AppResult<()> {
        let mut transaction = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO presence_challenges (
                id,
                consent_id,
                code_hash,
                issued_by,
                issued_at,
                expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(challenge.challenge_id)
        .bind(challenge.consent_id.as_uuid())
        .bind(challenge.code_hash.as_str())
        .bind(challenge.issued_by.as_str())
        .bind(challenge.issued_at)
        .bind(challenge.expires_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to create presence challenge: {error}"))
        })?;

        insert_audit_events(&mut transaction, std::slice::from_ref(event)).await?;
        Self::commit(transaction).await
    }

    async fn find_open_challenge(
        &self,
        consent_id: ConsentId,
        now: DateTime<Utc>,
    ) -> AppResult<Option<PresenceChallenge>> {
        let row = sqlx::query_as::<_, PresenceChallengeRow>(
            r#"
            SELECT
                id,
                consent_id,
                code_hash,
                issued_by,
                issued_at,
                expires_at,
                failed_attempts,
                consumed_at
            FROM presence_challenges
            WHERE consent_id = $1
              AND consumed_at IS NULL
              AND expires_at > $2
            ORDER BY issued_at DESC
            LIMIT 1
            "#,
        )
        .bind(consent_id.as_uuid())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find presence challenge: {error}"))
        })?;

        Ok(row.map(PresenceChallenge::from))
    }

    async fn record_failed_attempt(&self, challenge_id: Uuid) -> AppResult<u32> {
        let failed_attempts = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE presence_challenges
            SET failed_attempts = failed_attempts + 1
            WHERE id = $1
            RETURNING failed_attempts
            "#,
        )
        .bind(challenge_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to record presence attempt: {error}"))
        })?
        .ok_or_else(|| {
            AppError::NotFound(format!("presence challenge '{challenge_id}' does not exist"))
        })?;

        Ok(u32::try_from(failed_attempts).unwrap_or_default())
    }

    async fn consume_challenge(
        &self,
        challenge_id: Uuid,
        now: DateTime<Utc>,
        max_failed_attempts: u32,
        event: &AuditEvent,
    ) -> AppResult<ChallengeConsumption> {
        let max_failed_attempts = i32::try_from(max_failed_attempts).unwrap_or(i32::MAX);
        let mut transaction = self.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE presence_challenges
            SET consumed_at = $2
            WHERE id = $1
              AND consumed_at IS NULL
              AND failed_attempts < $3
            "#,
        )
        .bind(challenge_id)
        .bind(now)
        .bind(max_failed_attempts)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to consume presence challenge: {error}"))
        })?;

        if result.rows_affected() == 0 {
            let state = sqlx::query_as::<_, (Option<DateTime<Utc>>, i32)>(
                "SELECT consumed_at, failed_attempts FROM presence_challenges WHERE id = $1",
            )
            .bind(challenge_id)
            .fetch_optional(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to load presence challenge: {error}"))
            })?;

            return match state {
                Some((None, failed_attempts)) if failed_attempts >= max_failed_attempts => {
                    Ok(ChallengeConsumption::Locked)
                }
                Some(_) => Ok(ChallengeConsumption::AlreadyConsumed),
                None => Err(AppError::NotFound(format!(
                    "presence challenge '{challenge_id}' does not exist"
                ))),
            };
        }

        insert_audit_events(&mut transaction, std::slice::from_ref(event)).await?;
        Self::commit(transaction).await?;
        Ok(ChallengeConsumption::Consumed)
    }
}
