use std::str::FromStr;

use consentry_core::{ActorIdentity, AppError, AppResult};
use consentry_domain::{AuditAction, Permission};

use super::{AuditLogListInput, ConsentService};
use crate::{AuditLogEntry, AuditLogQuery};

/// Page size used when the caller names none.
const DEFAULT_AUDIT_LOG_LIMIT: usize = 50;

/// Largest page size accepted.
const MAX_AUDIT_LOG_LIMIT: usize = 200;

/// Deepest offset accepted for audit paging.
const MAX_AUDIT_LOG_OFFSET: usize = 5_000;

impl ConsentService {
    /// Lists the patient's own consent audit trail, newest first.
    pub async fn list_audit_log(
        &self,
        actor: &ActorIdentity,
        input: AuditLogListInput,
    ) -> AppResult<Vec<AuditLogEntry>> {
        self.authorization_service
            .require_permission(actor, Permission::ConsentAuditRead)?;

        let patient_pin = self.authorization_service.patient_pin_of(actor)?;
        let action = input
            .action
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(AuditAction::from_str)
            .transpose()?;

        let offset = input.offset.unwrap_or(0);
        if offset > MAX_AUDIT_LOG_OFFSET {
            return Err(AppError::Validation(format!(
                "offset must be at most {MAX_AUDIT_LOG_OFFSET}"
            )));
        }

        self.audit_log_repository
            .list_recent_entries(AuditLogQuery {
                patient_pin,
                limit: input
                    .limit
                    .unwrap_or(DEFAULT_AUDIT_LOG_LIMIT)
                    .clamp(1, MAX_AUDIT_LOG_LIMIT),
                offset,
                action,
            })
            .await
    }
}
