use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use consentry_application::{AuditLogEntry, AuditLogQuery, AuditLogRepository};
use consentry_core::{AppError, AppResult};

/// PostgreSQL-backed repository for the consent audit trail.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    event_id: uuid::Uuid,
    actor: String,
    action: String,
    resource_type: String,
    resource_id: String,
    patient_pin: String,
    resulting_state: String,
    detail: Option<String>,
    created_at: String,
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn list_recent_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>> {
        let capped_limit = query.limit.clamp(1, 200) as i64;
        let offset = i64::try_from(query.offset)
            .map_err(|_| AppError::Validation("audit log offset is too large".to_owned()))?;
        let rows = sqlx::query_as::<_, AuditLogRow>(
            r#"
            SELECT
                id AS event_id,
                actor,
                action,
                resource_type,
                resource_id,
                patient_pin,
                resulting_state,
                detail,
                to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
            FROM consent_audit_log
            WHERE patient_pin = $1
                AND ($2::TEXT IS NULL OR action = $2)
            ORDER BY consent_audit_log.created_at DESC, seq DESC
            LIMIT $3
            OFFSET $4
            "#,
        )
        .bind(query.patient_pin.as_str())
        .bind(query.action.map(|action| action.as_str()))
        .bind(capped_limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list audit log entries: {error}"))
        })?;

        Ok(rows
            .into_iter()
            .map(|row| AuditLogEntry {
                event_id: row.event_id.to_string(),
                actor: row.actor,
                action: row.action,
                resource_type: row.resource_type,
                resource_id: row.resource_id,
                patient_pin: row.patient_pin,
                resulting_state: row.resulting_state,
                detail: row.detail,
                created_at: row.created_at,
            })
            .collect())
    }
}
