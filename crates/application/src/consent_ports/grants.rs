use async_trait::async_trait;
use chrono::{DateTime, Utc};
use consentry_core::AppResult;
use consentry_domain::{Consent, ConsentId, ConsentStatus, PatientPin};

use crate::AuditEvent;

/// Filter for listing consent grants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsentQuery {
    /// Restrict to one patient.
    pub patient_pin: Option<PatientPin>,
    /// Restrict to one provider.
    pub requester_id: Option<String>,
    /// Restrict to one stored status.
    pub status: Option<ConsentStatus>,
    /// Restrict to grants expiring at or before this instant.
    pub expires_before: Option<DateTime<Utc>>,
}

/// Repository port for consent grants.
///
/// Grants are inserted only together with an approval, see
/// [`crate::ConsentRequestRepository::save_approval`].
#[async_trait]
pub trait ConsentGrantRepository: Send + Sync {
    /// Finds one grant by id.
    async fn find_consent(&self, consent_id: ConsentId) -> AppResult<Option<Consent>>;

    /// Lists grants matching the filter, newest first.
    async fn list_consents(&self, query: ConsentQuery) -> AppResult<Vec<Consent>>;

    /// Stores a status transition when the stored status still equals
    /// `expected`, appending `event` in the same atomic unit.
    ///
    /// Returns false when another writer moved the grant first; no event is
    /// written then.
    async fn transition_consent(
        &self,
        consent: &Consent,
        expected: ConsentStatus,
        event: &AuditEvent,
    ) -> AppResult<bool>;

    /// Lists up to `limit` active grants whose expiry is at or before `now`,
    /// oldest expiry first.
    async fn list_due_for_expiry(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<Vec<Consent>>;
}
