use std::time::Duration;

use async_trait::async_trait;

use crate::app_error::AppResult;

/// Process-wide mutual exclusion backed by an external coordination store.
///
/// The TTL bounds how long a crashed holder can wedge the key; a live holder
/// must release explicitly. Acquisition failure is an expected outcome, not
/// an error.
#[async_trait]
pub trait DistributedLockPort: Send + Sync {
    /// Returns true if the lock was acquired.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> AppResult<bool>;

    /// Releases the lock if this process still holds it. Releasing a key
    /// that expired or was never held is a no-op.
    async fn release(&self, key: &str) -> AppResult<()>;
}
