use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

use crate::{
    error::{FlowError, Result},
    state::{FlowState, Session},
    storage::{DEFAULT_SESSION_TTL, SessionStorage},
};

/// Redis-backed session storage. Records live under `<prefix>:<id>` and every save
/// renews their expiry with `SET ... EX`.
pub struct RedisSessionStorage {
    client: redis::Client,
    key_prefix: String,
    ttl: Duration,
}

impl RedisSessionStorage {
    pub fn connect(connection_url: &str) -> Result<Self> {
        Self::with_options(connection_url, "session", DEFAULT_SESSION_TTL)
    }

    pub fn with_options(
        connection_url: &str,
        key_prefix: impl Into<String>,
        ttl: Duration,
    ) -> Result<Self> {
        let client = redis::Client::open(connection_url)
            .map_err(|e| FlowError::StorageError(e.to_string()))?;
        Ok(Self {
            client,
            key_prefix: key_prefix.into(),
            ttl,
        })
    }

    pub fn session_key(&self, id: &str) -> String {
        format!("{}:{}", self.key_prefix, id)
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| FlowError::StorageError(e.to_string()))
    }
}

#[async_trait]
impl<S: FlowState> SessionStorage<S> for RedisSessionStorage {
    async fn save(&self, session: &Session<S>) -> Result<()> {
        let payload = serde_json::to_string(&session.state)?;
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(self.session_key(&session.id), payload, self.ttl_secs())
            .await
            .map_err(|e| FlowError::StorageError(e.to_string()))
    }

    async fn get(&self, id: &str) -> Result<Option<Session<S>>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn
            .get(self.session_key(id))
            .await
            .map_err(|e| FlowError::StorageError(e.to_string()))?;

        payload
            .map(|raw| {
                serde_json::from_str::<S>(&raw)
                    .map(|state| Session::with_state(id, state))
                    .map_err(FlowError::from)
            })
            .transpose()
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(self.session_key(id))
            .await
            .map_err(|e| FlowError::StorageError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed_with_session() {
        let storage = RedisSessionStorage::connect("redis://127.0.0.1:6379").unwrap();
        assert_eq!(storage.session_key("42"), "session:42");
    }

    #[test]
    fn ttl_never_drops_below_one_second() {
        let storage =
            RedisSessionStorage::with_options("redis://127.0.0.1:6379", "s", Duration::ZERO)
                .unwrap();
        assert_eq!(storage.ttl_secs(), 1);
    }
}
