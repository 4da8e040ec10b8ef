//! Background expiry of grants past their `expires_at`.

use std::sync::Arc;

use consentry_core::{ActorIdentity, AppError, AppResult};

use crate::expiry::{ExpiryOutcome, settle_expiry};
use crate::{Clock, ConsentGrantRepository, SweepLeaseCoordinator};

/// Audit actor recorded for sweeper-driven expiry.
pub const EXPIRY_SWEEPER_SUBJECT: &str = "system:expiry-sweeper";

/// Lease scope shared by every sweeper instance.
const SWEEP_LEASE_SCOPE: &str = "consent-expiry-sweep";

/// Outcome of one sweep iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Due grants read from storage.
    pub examined: usize,
    /// Grants this sweep moved to expired.
    pub expired: usize,
    /// Grants another writer settled first.
    pub skipped: usize,
}

/// Application service running the expiry sweep.
#[derive(Clone)]
pub struct ExpirySweepService {
    grant_repository: Arc<dyn ConsentGrantRepository>,
    lease_coordinator: Arc<dyn SweepLeaseCoordinator>,
    clock: Arc<dyn Clock>,
    actor: ActorIdentity,
}

impl ExpirySweepService {
    /// Creates a sweep service from port implementations.
    #[must_use]
    pub fn new(
        grant_repository: Arc<dyn ConsentGrantRepository>,
        lease_coordinator: Arc<dyn SweepLeaseCoordinator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            grant_repository,
            lease_coordinator,
            clock,
            actor: ActorIdentity::system(EXPIRY_SWEEPER_SUBJECT),
        }
    }

    /// Runs one sweep under the single-runner lease.
    ///
    /// Returns `None` when another sweeper holds the lease.
    pub async fn sweep_once(
        &self,
        holder_id: &str,
        batch_size: usize,
        lease_seconds: u32,
    ) -> AppResult<Option<SweepReport>> {
        if lease_seconds == 0 {
            return Err(AppError::Validation(
                "lease_seconds must be greater than zero".to_owned(),
            ));
        }

        let Some(lease) = self
            .lease_coordinator
            .try_acquire_lease(SWEEP_LEASE_SCOPE, holder_id, lease_seconds)
            .await?
        else {
            return Ok(None);
        };

        let result = self.expire_due(batch_size).await;
        let release_result = self.lease_coordinator.release_lease(&lease).await;

        let report = result?;
        release_result?;
        Ok(Some(report))
    }

    /// Expires up to `batch_size` due grants without taking the lease.
    pub async fn expire_due(&self, batch_size: usize) -> AppResult<SweepReport> {
        if batch_size == 0 {
            return Err(AppError::Validation(
                "batch_size must be greater than zero".to_owned(),
            ));
        }

        let now = self.clock.now();
        let due = self
            .grant_repository
            .list_due_for_expiry(now, batch_size)
            .await?;

        let mut report = SweepReport {
            examined: due.len(),
            ..SweepReport::default()
        };

        for consent in due {
            match settle_expiry(
                self.grant_repository.as_ref(),
                consent,
                self.actor.subject(),
                now,
            )
            .await?
            {
                ExpiryOutcome::Expired(_) => report.expired += 1,
                ExpiryOutcome::NotDue(_) | ExpiryOutcome::Lost(_) => report.skipped += 1,
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests;
