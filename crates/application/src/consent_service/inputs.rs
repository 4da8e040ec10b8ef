use chrono::{DateTime, Utc};

/// Input payload for opening a consent request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateConsentRequestInput {
    /// Patient PIN as entered by the provider.
    pub patient_pin: String,
    /// Requested scope transport values.
    pub scope: Vec<String>,
    /// Why access is needed.
    pub purpose: String,
    /// Episode that `currentEpisode` refers to.
    pub episode_id: Option<String>,
    /// Requested access duration in minutes.
    pub duration_minutes: Option<u32>,
    /// Requester type claimed by the caller; must match the caller's role.
    pub requester_type: Option<String>,
}

/// Input payload for approving a consent request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApproveConsentRequestInput {
    /// Granted scope transport values; `None` grants everything requested.
    pub scope: Option<Vec<String>>,
    /// Granted duration in minutes; `None` keeps the requested duration.
    pub duration_minutes: Option<u32>,
}

/// Filter for listing grants visible to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsentListFilter {
    /// Optional effective status filter.
    pub status: Option<String>,
    /// Optional patient filter. Patients may only name their own PIN.
    pub patient_pin: Option<String>,
}

/// Input payload for checking one access attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCheckInput {
    /// Patient whose record is read.
    pub patient_pin: String,
    /// Record category transport value.
    pub category: String,
    /// Episode the record belongs to.
    pub episode_id: Option<String>,
    /// Clinical timestamp of the record.
    pub recorded_at: DateTime<Utc>,
}

/// Query parameters for the patient audit log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLogListInput {
    /// Requested page size.
    pub limit: Option<usize>,
    /// Requested offset.
    pub offset: Option<usize>,
    /// Optional action filter.
    pub action: Option<String>,
}
