use sqlx::{Postgres, Transaction};

use consentry_application::AuditEvent;
use consentry_core::{AppError, AppResult};

/// Appends audit rows inside the caller's transaction.
///
/// The rows commit or roll back together with the transition they describe.
pub(crate) async fn insert_audit_events(
    transaction: &mut Transaction<'_, Postgres>,
    events: &[AuditEvent],
) -> AppResult<()> {
    for event in events {
        sqlx::query(
            r#"
            INSERT INTO consent_audit_log (
                actor,
                action,
                resource_type,
                resource_id,
                patient_pin,
                resulting_state,
                detail,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.actor.as_str())
        .bind(event.action.as_str())
        .bind(event.resource_type.as_str())
        .bind(event.resource_id.as_str())
        .bind(event.patient_pin.as_str())
        .bind(event.resulting_state.as_str())
        .bind(event.detail.as_deref())
        .bind(event.occurred_at)
        .execute(&mut **transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit event: {error}")))?;
    }

    Ok(())
}
