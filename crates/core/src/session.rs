//! Session storage trait: persistence of conversation snapshots.
//!
//! A session is one conversation with the rule engine. After every turn the
//! gateway serializes the conversation into an opaque blob and hands it to a
//! [`SessionStore`]; before the next turn the blob is loaded back. The store
//! never looks inside the blob.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;

/// Maximum accepted length of a client-supplied session id.
const MAX_ID_LEN: usize = 128;

/// Unique identifier for a session.
///
/// Ids end up in file names, so only ASCII alphanumerics, `-` and `_`
/// are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate a client-supplied id.
    pub fn parse(s: &str) -> Result<Self, SessionError> {
        let valid = !s.is_empty()
            && s.len() <= MAX_ID_LEN
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(SessionError::InvalidId(s.chars().take(40).collect()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = SessionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// A stored session snapshot.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: SessionId,

    /// Opaque conversation snapshot
    pub blob: Vec<u8>,

    /// When the snapshot was last written
    pub updated_at: DateTime<Utc>,
}

/// Listing information for a stored session (no payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: SessionId,
    pub updated_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Pluggable session persistence.
///
/// Implementations: file-backed (one file per session) and in-memory.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Load a session snapshot, `None` if the session is unknown.
    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, SessionError>;

    /// Store (create or overwrite) a session snapshot.
    async fn save(&self, id: &SessionId, blob: Vec<u8>) -> Result<(), SessionError>;

    /// Delete a session. Returns `true` if it existed.
    async fn delete(&self, id: &SessionId) -> Result<bool, SessionError>;

    /// List all stored sessions.
    async fn list(&self) -> Result<Vec<SessionMeta>, SessionError>;

    /// Delete every session last written before `cutoff`.
    /// Returns the number of sessions removed.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, SessionError> {
        let mut removed = 0;
        for meta in self.list().await? {
            if meta.updated_at < cutoff && self.delete(&meta.id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_valid() {
        let id = SessionId::new();
        assert!(SessionId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(SessionId::parse("../../etc/passwd").is_err());
        assert!(SessionId::parse("a/b").is_err());
        assert!(SessionId::parse("").is_err());
        assert!(SessionId::parse(&"x".repeat(MAX_ID_LEN + 1)).is_err());
    }

    #[test]
    fn accepts_client_style_ids() {
        assert!(SessionId::parse("user_42-chat").is_ok());
        assert!(SessionId::parse("6f1c2a7e-9d4b-4f0e-8c1a-2b3c4d5e6f70").is_ok());
    }

    /// Minimal store relying on the default `purge_older_than`.
    #[derive(Default)]
    struct VecStore(std::sync::Mutex<Vec<SessionMeta>>);

    #[async_trait]
    impl SessionStore for VecStore {
        fn name(&self) -> &str {
            "vec"
        }

        async fn load(&self, _id: &SessionId) -> Result<Option<SessionRecord>, SessionError> {
            Ok(None)
        }

        async fn save(&self, id: &SessionId, blob: Vec<u8>) -> Result<(), SessionError> {
            self.0.lock().unwrap().push(SessionMeta {
                id: id.clone(),
                updated_at: Utc::now(),
                size_bytes: blob.len() as u64,
            });
            Ok(())
        }

        async fn delete(&self, id: &SessionId) -> Result<bool, SessionError> {
            let mut items = self.0.lock().unwrap();
            let before = items.len();
            items.retain(|m| &m.id != id);
            Ok(items.len() < before)
        }

        async fn list(&self) -> Result<Vec<SessionMeta>, SessionError> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    #[tokio::test]
    async fn default_purge_deletes_only_older_sessions() {
        let store = VecStore::default();
        store.save(&SessionId::new(), vec![0; 4]).await.unwrap();
        store.0.lock().unwrap()[0].updated_at = Utc::now() - chrono::Duration::days(2);
        store.save(&SessionId::new(), vec![]).await.unwrap();

        let cutoff = Utc::now() - chrono::Duration::days(1);
        assert_eq!(store.purge_older_than(cutoff).await.unwrap(), 1);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let ok: Result<SessionId, _> = serde_json::from_str(r#""abc-123""#);
        assert!(ok.is_ok());
        let bad: Result<SessionId, _> = serde_json::from_str(r#""a b""#);
        assert!(bad.is_err());
    }
}
