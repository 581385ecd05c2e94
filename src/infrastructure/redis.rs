use crate::domain::pending::PendingOperation;
use crate::domain::ports::StateStore;
use crate::error::{FlowError, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

const DEFAULT_PREFIX: &str = "paygate:";

/// Distributed [`StateStore`] backed by Redis.
///
/// Same contract as the in-memory store; records are stored as JSON under a
/// key prefix, TTLs map to native `EX` expiry so `cleanup` is a no-op.
#[derive(Clone)]
pub struct RedisStateStore {
    client: redis::Client,
    prefix: String,
}

impl RedisStateStore {
    pub fn open(url: &str) -> Result<Self> {
        Self::open_with_prefix(url, DEFAULT_PREFIX)
    }

    pub fn open_with_prefix(url: &str, prefix: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| FlowError::Store(format!("redis open failed: {e}")))?;
        Ok(Self {
            client,
            prefix: prefix.to_string(),
        })
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| FlowError::Store(format!("redis connect failed: {e}")))
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn set(
        &self,
        key: &str,
        record: PendingOperation,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let payload = serde_json::to_vec(&record)
            .map_err(|e| FlowError::Store(format!("serialize failed: {e}")))?;
        let mut con = self.connection().await?;
        let key = self.prefixed(key);
        match ttl {
            Some(ttl) => {
                let secs = ttl.as_secs().max(1);
                con.set_ex::<_, _, ()>(key, payload, secs)
                    .await
                    .map_err(|e| FlowError::Store(format!("redis set failed: {e}")))?;
            }
            None => {
                con.set::<_, _, ()>(key, payload)
                    .await
                    .map_err(|e| FlowError::Store(format!("redis set failed: {e}")))?;
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<PendingOperation>> {
        let mut con = self.connection().await?;
        let payload: Option<Vec<u8>> = con
            .get(self.prefixed(key))
            .await
            .map_err(|e| FlowError::Store(format!("redis get failed: {e}")))?;
        match payload {
            Some(bytes) => {
                let record = serde_json::from_slice(&bytes)
                    .map_err(|e| FlowError::Store(format!("deserialize failed: {e}")))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut con = self.connection().await?;
        con.del::<_, ()>(self.prefixed(key))
            .await
            .map_err(|e| FlowError::Store(format!("redis del failed: {e}")))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut con = self.connection().await?;
        let pattern = format!("{}*", self.prefix);
        let keys: Vec<String> = con
            .keys(pattern)
            .await
            .map_err(|e| FlowError::Store(format!("redis keys failed: {e}")))?;
        if !keys.is_empty() {
            con.del::<_, ()>(keys)
                .await
                .map_err(|e| FlowError::Store(format!("redis del failed: {e}")))?;
        }
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        // Redis expires keys natively.
        Ok(())
    }
}
