pub mod access_checks;
pub mod audit_log;
pub mod consent_requests;
pub mod consents;
pub mod health;
pub mod internal_sweeps;
pub mod presence;
