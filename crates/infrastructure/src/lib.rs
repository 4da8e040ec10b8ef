//! Infrastructure adapters for consent application ports.

#![forbid(unsafe_code)]

mod in_memory_audit_repository;
mod in_memory_consent_repository;
mod in_memory_presence_challenge_repository;
mod in_memory_sweep_lease_coordinator;
mod postgres_audit_events;
mod postgres_audit_log_repository;
mod postgres_consent_repository;
mod postgres_presence_challenge_repository;
mod redis_sweep_lease_coordinator;
mod system_clock;

pub use in_memory_audit_repository::InMemoryAuditRepository;
pub use in_memory_consent_repository::InMemoryConsentRepository;
pub use in_memory_presence_challenge_repository::InMemoryPresenceChallengeRepository;
pub use in_memory_sweep_lease_coordinator::InMemorySweepLeaseCoordinator;
pub use postgres_audit_log_repository::PostgresAuditLogRepository;
pub use postgres_consent_repository::PostgresConsentRepository;
pub use postgres_presence_challenge_repository::PostgresPresenceChallengeRepository;
pub use redis_sweep_lease_coordinator::RedisSweepLeaseCoordinator;
pub use system_clock::SystemClock;
