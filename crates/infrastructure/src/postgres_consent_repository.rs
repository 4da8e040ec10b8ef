use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consentry_application::{
    AuditEvent, ConsentGrantRepository, ConsentQuery, ConsentRequestQuery,
    ConsentRequestRepository,
};
use consentry_core::{AppError, AppResult};
use consentry_domain::{
    Consent, ConsentId, ConsentRequest, ConsentRequestId, ConsentRequestStatus, ConsentStatus,
};
use sqlx::{PgPool, Postgres, Transaction};

mod rows;

use crate::postgres_audit_events::insert_audit_events;
use rows::{ConsentRequestRow, ConsentRow, scope_values};

const CONSENT_REQUEST_COLUMNS: &str = r#"
    id,
    patient_pin,
    requester_id,
    requester_name,
    requester_type,
    scope,
    purpose,
    episode_id,
    requested_duration_minutes,
    status,
    created_at,
    resolved_at,
    resolved_by,
    resolution_note
"#;

const CONSENT_COLUMNS: &str = r#"
    id,
    request_id,
    patient_pin,
    requester_id,
    requester_name,
    requester_type,
    scope,
    episode_id,
    status,
    created_at,
    expires_at,
    revoked_at,
    revoked_by,
    revoke_reason,
    expired_at
"#;

/// PostgreSQL-backed consent request and grant store.
///
/// Every write runs in one transaction with its `consent_audit_log` rows.
#[derive(Clone)]
pub struct PostgresConsentRepository {
    pool: PgPool,
}

impl PostgresConsentRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self, operation: &str) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start {operation} transaction: {error}"))
        })
    }

    async fn commit(transaction: Transaction<'_, Postgres>, operation: &str) -> AppResult<()> {
        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit {operation} transaction: {error}"))
        })
    }

    /// Applies a pending-only resolution update inside a transaction.
    async fn resolve_pending(
        transaction: &mut Transaction<'_, Postgres>,
        request: &ConsentRequest,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE consent_requests
            SET status = $2,
                resolved_at = $3,
                resolved_by = $4,
                resolution_note = $5
            WHERE id = $1
              AND status = 'pending'
            "#,
        )
        .bind(request.id().as_uuid())
        .bind(request.status().as_str())
        .bind(request.resolved_at())
        .bind(request.resolved_by())
        .bind(request.resolution_note())
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to resolve consent request '{}': {error}",
                request.id()
            ))
        })?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let current_status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM consent_requests WHERE id = $1",
        )
        .bind(request.id().as_uuid())
        .fetch_optional(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load consent request '{}': {error}",
                request.id()
            ))
        })?;

        match current_status {
            Some(status) => Err(AppError::Conflict(format!(
                "consent request '{}' is already {status}",
                request.id()
            ))),
            None => Err(AppError::NotFound(format!(
                "consent request '{}' does not exist",
                request.id()
            ))),
        }
    }
}

#[async_trait]
impl ConsentRequestRepository for PostgresConsentRepository {
    async fn create_request(&self, request: &ConsentRequest, event: &AuditEvent) -> AppResult<()> {
        let mut transaction = self.begin("request").await?;

        sqlx::query(
            r#"
            INSERT INTO consent_requests (
                id,
                patient_pin,
                requester_id,
                requester_name,
                requester_type,
                scope,
                purpose,
                episode_id,
                requested_duration_minutes,
                status,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(request.id().as_uuid())
        .bind(request.patient_pin().as_str())
        .bind(request.requester().requester_id())
        .bind(request.requester().requester_name())
        .bind(request.requester().requester_type().as_str())
        .bind(scope_values(request.scope()))
        .bind(request.purpose())
        .bind(request.episode_id())
        .bind(i32::try_from(request.requested_duration().minutes()).map_err(|_| {
            AppError::Validation("requested duration does not fit storage".to_owned())
        })?)
        .bind(request.status().as_str())
        .bind(request.created_at())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to create consent request: {error}"))
        })?;

        insert_audit_events(&mut transaction, std::slice::from_ref(event)).await?;
        Self::commit(transaction, "request").await
    }

    async fn find_request(
        &self,
        request_id: ConsentRequestId,
    ) -> AppResult<Option<ConsentRequest>> {
        let row = sqlx::query_as::<_, ConsentRequestRow>(&format!(
            "SELECT {CONSENT_REQUEST_COLUMNS} FROM consent_requests WHERE id = $1"
        ))
        .bind(request_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find consent request '{request_id}': {error}"
            ))
        })?;

        row.map(ConsentRequest::try_from).transpose()
    }

    async fn list_requests(&self, query: ConsentRequestQuery) -> AppResult<Vec<ConsentRequest>> {
        let rows = sqlx::query_as::<_, ConsentRequestRow>(&format!(
            r#"
            SELECT {CONSENT_REQUEST_COLUMNS}
            FROM consent_requests
            WHERE ($1::TEXT IS NULL OR patient_pin = $1)
              AND ($2::TEXT IS NULL OR requester_id = $2)
              AND ($3::TEXT IS NULL OR status = $3)
            ORDER BY created_at DESC
            "#
        ))
        .bind(query.patient_pin.as_ref().map(|pin| pin.as_str()))
        .bind(query.requester_id)
        .bind(query.status.map(|status| status.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list consent requests: {error}"))
        })?;

        rows.into_iter().map(ConsentRequest::try_from).collect()
    }

    async fn save_approval(
        &self,
        request: &ConsentRequest,
        consent: &Consent,
        events: &[AuditEvent],
    ) -> AppResult<()> {
        if request.status() != ConsentRequestStatus::Approved {
            return Err(AppError::Internal(format!(
                "consent request '{}' is not approved",
                request.id()
            )));
        }

        let mut transaction = self.begin("approval").await?;

        Self::resolve_pending(&mut transaction, request).await?;

        sqlx::query(
            r#"
            INSERT INTO consents (
                id,
                request_id,
                patient_pin,
                requester_id,
                requester_name,
                requester_type,
                scope,
                episode_id,
                status,
                created_at,
                expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(consent.id().as_uuid())
        .bind(consent.request_id().as_uuid())
        .bind(consent.patient_pin().as_str())
        .bind(consent.requester().requester_id())
        .bind(consent.requester().requester_name())
        .bind(consent.requester().requester_type().as_str())
        .bind(scope_values(consent.scope()))
        .bind(consent.episode_id())
        .bind(consent.status().as_str())
        .bind(consent.created_at())
        .bind(consent.expires_at())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            if error
                .as_database_error()
                .is_some_and(|database_error| database_error.is_unique_violation())
            {
                return AppError::Conflict(format!(
                    "consent request '{}' already has a grant",
                    request.id()
                ));
            }

            AppError::Internal(format!("failed to insert consent grant: {error}"))
        })?;

        insert_audit_events(&mut transaction, events).await?;
        Self::commit(transaction, "approval").await
    }

    async fn save_denial(&self, request: &ConsentRequest, event: &AuditEvent) -> AppResult<()> {
        let mut transaction = self.begin("denial").await?;

        Self::resolve_pending(&mut transaction, request).await?;
        insert_audit_events(&mut transaction, std::slice::from_ref(event)).await?;

        Self::commit(transaction, "denial").await
    }
}

#[async_trait]
impl ConsentGrantRepository for PostgresConsentRepository {
    async fn find_consent(&self, consent_id: ConsentId) -> AppResult<Option<Consent>> {
        let row = sqlx::query_as::<_, ConsentRow>(&format!(
            "SELECT {CONSENT_COLUMNS} FROM consents WHERE id = $1"
        ))
        .bind(consent_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find consent '{consent_id}': {error}"))
        })?;

        row.map(Consent::try_from).transpose()
    }

    async fn list_consents(&self, query: ConsentQuery) -> AppResult<Vec<Consent>> {
        let rows = sqlx::query_as::<_, ConsentRow>(&format!(
            r#"
            SELECT {CONSENT_COLUMNS}
            FROM consents
            WHERE ($1::TEXT IS NULL OR patient_pin = $1)
              AND ($2::TEXT IS NULL OR requester_id = $2)
              AND ($3::TEXT IS NULL OR status = $3)
              AND ($4::TIMESTAMPTZ IS NULL OR expires_at <= $4)
            ORDER BY created_at DESC
            "#
        ))
        .bind(query.patient_pin.as_ref().map(|pin| pin.as_str()))
        .bind(query.requester_id)
        .bind(query.status.map(|status| status.as_str()))
        .bind(query.expires_before)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list consents: {error}")))?;

        rows.into_iter().map(Consent::try_from).collect()
    }

    async fn transition_consent(
        &self,
        consent: &Consent,
        expected: ConsentStatus,
        event: &AuditEvent,
    ) -> AppResult<bool> {
        let mut transaction = self.begin("transition").await?;

        let result = sqlx::query(
            r#"
            UPDATE consents
            SET status = $2,
                revoked_at = $3,
                revoked_by = $4,
                revoke_reason = $5,
                expired_at = $6
            WHERE id = $1
              AND status = $7
            "#,
        )
        .bind(consent.id().as_uuid())
        .bind(consent.status().as_str())
        .bind(consent.revoked_at())
        .bind(consent.revoked_by())
        .bind(consent.revoke_reason())
        .bind(consent.expired_at())
        .bind(expected.as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to transition consent '{}': {error}",
                consent.id()
            ))
        })?;

        // Dropping the transaction rolls it back.
        if result.rows_affected() == 0 {
            return Ok(false);
        }

        insert_audit_events(&mut transaction, std::slice::from_ref(event)).await?;
        Self::commit(transaction, "transition").await?;
        Ok(true)
    }

    async fn list_due_for_expiry(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Consent>> {
        let limit = i64::try_from(limit)
            .map_err(|_| AppError::Validation("sweep batch size is too large".to_owned()))?;

        let rows = sqlx::query_as::<_, ConsentRow>(&format!(
            r#"
            SELECT {CONSENT_COLUMNS}
            FROM consents
            WHERE status = 'active'
              AND expires_at <= $1
            ORDER BY expires_at ASC
            LIMIT $2
            "#
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list consents due for expiry: {error}"))
        })?;

        rows.into_iter().map(Consent::try_from).collect()
    }
}
