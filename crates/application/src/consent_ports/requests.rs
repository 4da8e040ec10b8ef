use async_trait::async_trait;
use consentry_core::AppResult;
use consentry_domain::{
    Consent, ConsentRequest, ConsentRequestId, ConsentRequestStatus, PatientPin,
};

use crate::AuditEvent;

/// Filter for listing consent requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsentRequestQuery {
    /// Restrict to one patient.
    pub patient_pin: Option<PatientPin>,
    /// Restrict to one provider.
    pub requester_id: Option<String>,
    /// Restrict to one status.
    pub status: Option<ConsentRequestStatus>,
}

/// Repository port for consent requests.
///
/// Every write stores its audit events in the same atomic unit; a failed
/// write leaves neither the state change nor the events behind.
#[async_trait]
pub trait ConsentRequestRepository: Send + Sync {
    /// Stores a newly opened request together with its audit event.
    async fn create_request(&self, request: &ConsentRequest, event: &AuditEvent) -> AppResult<()>;

    /// Finds one request by id.
    async fn find_request(&self, request_id: ConsentRequestId)
    -> AppResult<Option<ConsentRequest>>;

    /// Lists requests matching the filter, newest first.
    async fn list_requests(&self, query: ConsentRequestQuery) -> AppResult<Vec<ConsentRequest>>;

    /// Stores an approval, inserts its grant and appends `events` in one
    /// atomic step.
    ///
    /// Fails with `Conflict` when the stored request is no longer pending.
    async fn save_approval(
        &self,
        request: &ConsentRequest,
        consent: &Consent,
        events: &[AuditEvent],
    ) -> AppResult<()>;

    /// Stores a denial with its audit event.
    ///
    /// Fails with `Conflict` when the stored request is no longer pending.
    async fn save_denial(&self, request: &ConsentRequest, event: &AuditEvent) -> AppResult<()>;
}
