use std::time::Duration;

use async_trait::async_trait;
use redis::{Script, aio::ConnectionManager};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::dist_lock::DistributedLockPort,
};

/// Lua script for safe release: only the holder's token may delete the key,
/// so a slow process cannot release a lock the TTL already handed to someone
/// else.
const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Redis-backed distributed lock: `SET key token NX PX ttl` to acquire,
/// compare-and-delete to release.
#[derive(Clone)]
pub struct RedisDistributedLock {
    manager: ConnectionManager,
    token: String,
    release_script: Script,
}

impl RedisDistributedLock {
    pub async fn new(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            manager,
            token: Uuid::new_v4().to_string(),
            release_script: Script::new(RELEASE_SCRIPT),
        })
    }
}

#[async_trait]
impl DistributedLockPort for RedisDistributedLock {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        let mut conn = self.manager.clone();
        let acquired: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&self.token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(acquired.is_some())
    }

    async fn release(&self, key: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let _released: i64 = self
            .release_script
            .key(key)
            .arg(&self.token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(())
    }
}
