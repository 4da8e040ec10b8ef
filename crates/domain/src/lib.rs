//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod consent;
mod evaluator;
mod patient;
mod scope;
mod security;

pub use consent::{
    AccessDuration, ApprovalDecision, Consent, ConsentId, ConsentRequest, ConsentRequestId,
    ConsentRequestSnapshot, ConsentRequestStatus, ConsentSnapshot, ConsentStatus,
    NewConsentRequest,
};
pub use evaluator::{AccessDecision, AccessDenyReason, evaluate_access, evaluate_access_across};
pub use patient::{PatientPin, Requester, RequesterType};
pub use scope::{ConsentScope, DataAccessAttempt, RecordCategory, ScopeSet};
pub use security::{AuditAction, Permission};
