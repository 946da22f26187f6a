use async_trait::async_trait;
use examshop_core::{SessionError, SessionId, SessionStore};
use redis::{AsyncCommands, RedisResult};

/// Browser sessions kept as one Redis hash per session, `session:<id>`.
/// Every write refreshes the TTL.
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
    session_ttl_seconds: u64,
}

impl RedisClient {
    pub async fn new(connection_string: &str, session_ttl_seconds: u64) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self {
            client,
            session_ttl_seconds,
        })
    }

    pub async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    async fn hset_session_field(&self, session: &SessionId, field: &str, value: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = session_key(session);
        let ttl = i64::try_from(self.session_ttl_seconds).unwrap_or(i64::MAX);

        redis::pipe()
            .atomic()
            .hset(&key, field, value)
            .ignore()
            .expire(&key, ttl)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
    }

    async fn hget_session_field(&self, session: &SessionId, field: &str) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.hget(session_key(session), field).await
    }

    async fn hdel_session_field(&self, session: &SessionId, field: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.hdel(session_key(session), field).await
    }
}

fn session_key(session: &SessionId) -> String {
    format!("session:{}", session)
}

fn backend(e: redis::RedisError) -> SessionError {
    SessionError::Backend(e.to_string())
}

#[async_trait]
impl SessionStore for RedisClient {
    async fn get(&self, session: &SessionId, key: &str) -> Result<Option<String>, SessionError> {
        self.hget_session_field(session, key).await.map_err(backend)
    }

    async fn set(&self, session: &SessionId, key: &str, value: &str) -> Result<(), SessionError> {
        self.hset_session_field(session, key, value).await.map_err(backend)
    }

    async fn remove(&self, session: &SessionId, key: &str) -> Result<(), SessionError> {
        self.hdel_session_field(session, key).await.map_err(backend)
    }
}
