//! Application services and ports.

#![forbid(unsafe_code)]

mod authorization_service;
mod consent_ports;
mod consent_service;
mod expiry;
mod expiry_sweep_service;
mod presence_service;

#[cfg(test)]
mod test_fakes;

pub use authorization_service::AuthorizationService;
pub use consent_ports::{
    AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository, ChallengeConsumption, Clock,
    ConsentGrantRepository, ConsentQuery, ConsentRequestQuery, ConsentRequestRepository,
    PresenceChallenge, PresenceChallengeRepository, SweepLease, SweepLeaseCoordinator,
};
pub use consent_service::{
    AccessCheckInput, ApproveConsentRequestInput, AuditLogListInput, ConsentListFilter,
    ConsentService, CreateConsentRequestInput,
};
pub use expiry_sweep_service::{EXPIRY_SWEEPER_SUBJECT, ExpirySweepService, SweepReport};
pub use presence_service::{IssuedPresenceChallenge, PresenceService, PresenceSession};
