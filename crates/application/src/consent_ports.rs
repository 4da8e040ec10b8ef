mod audit;
mod clock;
mod grants;
mod lease;
mod presence;
mod requests;

pub use audit::{AuditEvent, AuditLogEntry, AuditLogQuery, AuditLogRepository};
pub use clock::Clock;
pub use grants::{ConsentGrantRepository, ConsentQuery};
pub use lease::{SweepLease, SweepLeaseCoordinator};
pub use presence::{ChallengeConsumption, PresenceChallenge, PresenceChallengeRepository};
pub use requests::{ConsentRequestQuery, ConsentRequestRepository};
