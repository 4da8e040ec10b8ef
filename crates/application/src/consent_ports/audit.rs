use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consentry_core::AppResult;
use consentry_domain::{AuditAction, PatientPin};

/// Immutable audit event payload emitted by application services.
///
/// Events are handed to the repository that commits the transition they
/// describe and are written in the same atomic unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Subject that performed the action.
    pub actor: String,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier.
    pub resource_id: String,
    /// Patient whose consent changed.
    pub patient_pin: PatientPin,
    /// Status the resource holds after the action.
    pub resulting_state: String,
    /// Optional audit detail payload.
    pub detail: Option<String>,
    /// When the transition happened.
    pub occurred_at: DateTime<Utc>,
}

/// Audit log entry projection for patient views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogEntry {
    /// Stable event identifier.
    pub event_id: String,
    /// Actor subject.
    pub actor: String,
    /// Stable action identifier.
    pub action: String,
    /// Event resource type.
    pub resource_type: String,
    /// Event resource identifier.
    pub resource_id: String,
    /// Patient the event concerns.
    pub patient_pin: String,
    /// Status the resource held after the event.
    pub resulting_state: String,
    /// Optional event detail.
    pub detail: Option<String>,
    /// Event timestamp in RFC3339.
    pub created_at: String,
}

/// Query parameters for audit log listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogQuery {
    /// Patient whose trail is read.
    pub patient_pin: PatientPin,
    /// Maximum rows returned.
    pub limit: usize,
    /// Number of rows skipped for offset pagination.
    pub offset: usize,
    /// Optional action filter.
    pub action: Option<AuditAction>,
}

/// Repository port for reading the consent audit trail.
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Lists most recent entries for one patient, newest first.
    async fn list_recent_entries(&self, query: AuditLogQuery) -> AppResult<Vec<AuditLogEntry>>;
}
