use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Opaque identifier of a browser session, carried in the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Accepts client-supplied ids only if they look like ones we issued.
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty() && raw.len() <= 64 && raw.chars().all(|c| c.is_ascii_alphanumeric());
        valid.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session backend failure: {0}")]
    Backend(String),
    #[error("Corrupt session value under '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

/// Key-value storage scoped to one browser session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session: &SessionId, key: &str) -> Result<Option<String>, SessionError>;

    async fn set(&self, session: &SessionId, key: &str, value: &str) -> Result<(), SessionError>;

    /// Removing a missing key is not an error.
    async fn remove(&self, session: &SessionId, key: &str) -> Result<(), SessionError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<SessionId, HashMap<String, String>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session: &SessionId, key: &str) -> Result<Option<String>, SessionError> {
        let entries = self.entries.read().await;
        Ok(entries.get(session).and_then(|fields| fields.get(key)).cloned())
    }

    async fn set(&self, session: &SessionId, key: &str, value: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.write().await;
        entries
            .entry(session.clone())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, session: &SessionId, key: &str) -> Result<(), SessionError> {
        let mut entries = self.entries.write().await;
        if let Some(fields) = entries.get_mut(session) {
            fields.remove(key);
            if fields.is_empty() {
                entries.remove(session);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_parse() {
        let id = SessionId::generate();
        assert_eq!(SessionId::parse(id.as_str()), Some(id));
        assert_eq!(SessionId::parse(""), None);
        assert_eq!(SessionId::parse("../etc/passwd"), None);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = InMemorySessionStore::new();
        let a = SessionId::generate();
        let b = SessionId::generate();

        store.set(&a, "cart", "{}").await.unwrap();
        assert_eq!(store.get(&a, "cart").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(store.get(&b, "cart").await.unwrap(), None);

        store.remove(&a, "cart").await.unwrap();
        store.remove(&a, "cart").await.unwrap();
        assert_eq!(store.get(&a, "cart").await.unwrap(), None);
    }
}
