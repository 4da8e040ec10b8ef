//! Redis-backed distributed lease so only one expiry sweeper runs at a time.

use async_trait::async_trait;
use consentry_application::{SweepLease, SweepLeaseCoordinator};
use consentry_core::{AppError, AppResult};
use redis::Script;

const RELEASE_LEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

/// Redis implementation of sweep lease coordination.
#[derive(Clone)]
pub struct RedisSweepLeaseCoordinator {
    client: redis::Client,
    key_prefix: String,
}

impl RedisSweepLeaseCoordinator {
    /// Creates one coordinator adapter.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, scope_key: &str) -> String {
        format!("{}:{scope_key}", self.key_prefix)
    }
}

#[async_trait]
impl SweepLeaseCoordinator for RedisSweepLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<SweepLease>> {
        if scope_key.trim().is_empty() {
            return Err(AppError::Validation(
                "sweep lease scope_key must not be empty".to_owned(),
            ));
        }

        if holder_id.trim().is_empty() {
            return Err(AppError::Validation(
                "sweep lease holder_id must not be empty".to_owned(),
            ));
        }

        if lease_seconds == 0 {
            return Err(AppError::Validation(
                "sweep lease_seconds must be greater than zero".to_owned(),
            ));
        }

        let key = self.key_for(scope_key);
        let token = format!("{holder_id}:{}", uuid::Uuid::new_v4());

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        // SET NX EX keeps acquisition and ttl in one round trip.
        let acquired: Option<String> = redis::cmd("SET")
            .arg(key.as_str())
            .arg(token.as_str())
            .arg("NX")
            .arg("EX")
            .arg(u64::from(lease_seconds))
            .query_async(&mut connection)
            .await
            .map_err(|error| AppError::Internal(format!("failed to acquire sweep lease: {error}")))?;

        if acquired.is_none() {
            tracing::debug!(scope_key, holder_id, "sweep lease held elsewhere");
            return Ok(None);
        }

        Ok(Some(SweepLease {
            scope_key: scope_key.to_owned(),
            token,
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release_lease(&self, lease: &SweepLease) -> AppResult<()> {
        let key = self.key_for(lease.scope_key.as_str());
        let script = Script::new(RELEASE_LEASE_SCRIPT);

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let released = script
            .key(key)
            .arg(lease.token.as_str())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| AppError::Internal(format!("failed to release sweep lease: {error}")))?;

        if released == 0 {
            tracing::warn!(
                scope_key = %lease.scope_key,
                holder_id = %lease.holder_id,
                "sweep lease expired before release"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use consentry_application::SweepLeaseCoordinator;

    use super::RedisSweepLeaseCoordinator;

    fn coordinator() -> Option<RedisSweepLeaseCoordinator> {
        let redis_url = std::env::var("REDIS_URL").ok()?;
        let client = redis::Client::open(redis_url).ok()?;
        Some(RedisSweepLeaseCoordinator::new(
            client,
            format!("consentry-test-{}", uuid::Uuid::new_v4()),
        ))
    }

    #[tokio::test]
    async fn second_holder_waits_until_release() {
        let Some(coordinator) = coordinator() else {
            return;
        };

        let first = coordinator
            .try_acquire_lease("consent-expiry-sweep", "worker-a", 30)
            .await
            .unwrap_or_else(|error| panic!("first acquire failed: {error}"));
        let Some(first) = first else {
            panic!("first holder should acquire the lease");
        };

        let second = coordinator
            .try_acquire_lease("consent-expiry-sweep", "worker-b", 30)
            .await;
        assert!(matches!(second, Ok(None)));

        assert!(coordinator.release_lease(&first).await.is_ok());

        let third = coordinator
            .try_acquire_lease("consent-expiry-sweep", "worker-b", 30)
            .await;
        assert!(matches!(third, Ok(Some(_))));
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected() {
        let client = redis::Client::open("redis://127.0.0.1/");
        let Ok(client) = client else {
            return;
        };
        let coordinator = RedisSweepLeaseCoordinator::new(client, "consentry-test");
        let result = coordinator
            .try_acquire_lease("consent-expiry-sweep", "worker-a", 0)
            .await;
        assert!(result.is_err());
    }
}
