//! In-memory session store, for tests and single-process deployments
//! where sessions need not survive a restart.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eliza_core::{SessionError, SessionId, SessionMeta, SessionRecord, SessionStore};
use tokio::sync::RwLock;

/// Session snapshots held in a map.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    records: Arc<RwLock<HashMap<SessionId, SessionRecord>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot with an explicit write time.
    pub async fn save_at(&self, id: &SessionId, blob: Vec<u8>, updated_at: DateTime<Utc>) {
        self.records.write().await.insert(
            id.clone(),
            SessionRecord {
                id: id.clone(),
                blob,
                updated_at,
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, SessionError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn save(&self, id: &SessionId, blob: Vec<u8>) -> Result<(), SessionError> {
        self.save_at(id, blob, Utc::now()).await;
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, SessionError> {
        Ok(self.records.write().await.remove(id).is_some())
    }

    async fn list(&self) -> Result<Vec<SessionMeta>, SessionError> {
        let records = self.records.read().await;
        let mut sessions: Vec<SessionMeta> = records
            .values()
            .map(|r| SessionMeta {
                id: r.id.clone(),
                updated_at: r.updated_at,
                size_bytes: r.blob.len() as u64,
            })
            .collect();
        sessions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(sessions)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, SessionError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| r.updated_at >= cutoff);
        Ok(before - records.len())
    }
}
