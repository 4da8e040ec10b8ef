use consentry_application::AuditLogEntry;
use serde::Serialize;
use ts_rs::TS;

/// API representation of a consent audit record.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-log-entry-response.ts"
)]
pub struct AuditLogEntryResponse {
    pub event_id: String,
    pub actor: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub patient_pin: String,
    pub resulting_state: String,
    pub detail: Option<String>,
    pub created_at: String,
}

impl From<AuditLogEntry> for AuditLogEntryResponse {
    fn from(entry: AuditLogEntry) -> Self {
        Self {
            event_id: entry.event_id,
            actor: entry.actor,
            action: entry.action,
            resource_type: entry.resource_type,
            resource_id: entry.resource_id,
            patient_pin: entry.patient_pin,
            resulting_state: entry.resulting_state,
            detail: entry.detail,
            created_at: entry.created_at,
        }
    }
}
