use chrono::{DateTime, Utc};

/// Time source for lifecycle decisions.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}
