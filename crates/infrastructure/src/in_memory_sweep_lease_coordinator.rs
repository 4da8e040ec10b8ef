use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use consentry_application::{SweepLease, SweepLeaseCoordinator};
use consentry_core::{AppError, AppResult};
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct HeldLease {
    token: String,
    expires_at: Instant,
}

/// Process-local sweep lease for single-instance deployments.
#[derive(Debug, Default)]
pub struct InMemorySweepLeaseCoordinator {
    leases: Mutex<HashMap<String, HeldLease>>,
}

impl InMemorySweepLeaseCoordinator {
    /// Creates a coordinator with no held leases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SweepLeaseCoordinator for InMemorySweepLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<SweepLease>> {
        if lease_seconds == 0 {
            return Err(AppError::Validation(
                "sweep lease_seconds must be greater than zero".to_owned(),
            ));
        }

        let now = Instant::now();
        let mut leases = self.leases.lock().await;
        if leases
            .get(scope_key)
            .is_some_and(|held| held.expires_at > now)
        {
            return Ok(None);
        }

        let token = format!("{holder_id}:{}", uuid::Uuid::new_v4());
        leases.insert(
            scope_key.to_owned(),
            HeldLease {
                token: token.clone(),
                expires_at: now + Duration::from_secs(u64::from(lease_seconds)),
            },
        );

        Ok(Some(SweepLease {
            scope_key: scope_key.to_owned(),
            token,
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release_lease(&self, lease: &SweepLease) -> AppResult<()> {
        let mut leases = self.leases.lock().await;
        if leases
            .get(lease.scope_key.as_str())
            .is_some_and(|held| held.token == lease.token)
        {
            leases.remove(lease.scope_key.as_str());
        }

        Ok(())
    }
}
