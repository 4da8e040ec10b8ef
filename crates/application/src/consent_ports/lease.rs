use async_trait::async_trait;
use consentry_core::AppResult;

/// Held sweep lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepLease {
    /// Coordination scope key.
    pub scope_key: String,
    /// Lease token used for safe release.
    pub token: String,
    /// Lease holder identity.
    pub holder_id: String,
}

/// Coordination port ensuring a single active expiry sweeper.
#[async_trait]
pub trait SweepLeaseCoordinator: Send + Sync {
    /// Attempts to acquire the lease for the given scope.
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<SweepLease>>;

    /// Releases a lease using token compare-and-delete semantics.
    async fn release_lease(&self, lease: &SweepLease) -> AppResult<()>;
}
