//! File-based session store: one snapshot file per session.
//!
//! Storage location: `~/.eliza/sessions/<id>.session`
//!
//! The last-write time is taken from the file's modification time, so a
//! session directory can be inspected or pruned with ordinary tools.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eliza_core::{SessionError, SessionId, SessionMeta, SessionRecord, SessionStore};
use tracing::{debug, warn};

/// File extension of stored snapshots.
const EXTENSION: &str = "session";

/// A directory of session snapshot files.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never observes a half-written snapshot.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: PathBuf) -> Self {
        debug!(dir = %dir.display(), "File session store opened");
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{id}.{EXTENSION}"))
    }

    async fn modified_at(path: &Path) -> Result<(DateTime<Utc>, u64), SessionError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to stat {}: {e}", path.display())))?;
        let modified = meta
            .modified()
            .map_err(|e| SessionError::Storage(format!("No modification time: {e}")))?;
        Ok((DateTime::<Utc>::from(modified), meta.len()))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, id: &SessionId) -> Result<Option<SessionRecord>, SessionError> {
        let path = self.path_for(id);
        let blob = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionError::Storage(format!(
                    "Failed to read session {id}: {e}"
                )));
            }
        };
        let (updated_at, _) = Self::modified_at(&path).await?;
        debug!(session = %id, bytes = blob.len(), "Session loaded");
        Ok(Some(SessionRecord {
            id: id.clone(),
            blob,
            updated_at,
        }))
    }

    async fn save(&self, id: &SessionId, blob: Vec<u8>) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            SessionError::Storage(format!("Failed to create session directory: {e}"))
        })?;

        let path = self.path_for(id);
        let tmp = self.dir.join(format!("{id}.{EXTENSION}.tmp"));
        tokio::fs::write(&tmp, &blob)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to write session {id}: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to commit session {id}: {e}")))?;

        debug!(session = %id, bytes = blob.len(), "Session saved");
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, SessionError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => {
                debug!(session = %id, "Session deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SessionError::Storage(format!(
                "Failed to delete session {id}: {e}"
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<SessionMeta>, SessionError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            // Nothing written yet
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SessionError::Storage(format!(
                    "Failed to read session directory: {e}"
                )));
            }
        };

        let mut sessions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SessionError::Storage(format!("Failed to read session directory: {e}")))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let id = match SessionId::parse(stem) {
                Ok(id) => id,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Skipping foreign file in session directory");
                    continue;
                }
            };
            let (updated_at, size_bytes) = Self::modified_at(&path).await?;
            sessions.push(SessionMeta {
                id,
                updated_at,
                size_bytes,
            });
        }

        sessions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn id(s: &str) -> SessionId {
        SessionId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn save_and_load_persists() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path().join("sessions"));
        store.save(&id("abc"), b"{\"version\":1}".to_vec()).await.unwrap();

        // A second store over the same directory sees the snapshot
        let reopened = FileSessionStore::new(tmp.path().join("sessions"));
        let record = reopened.load(&id("abc")).await.unwrap().unwrap();
        assert_eq!(record.blob, b"{\"version\":1}");
        assert!(record.updated_at <= Utc::now() + Duration::seconds(1));
        assert!(tmp.path().join("sessions").join("abc.session").exists());
    }

    #[tokio::test]
    async fn load_unknown_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf());
        assert!(store.load(&id("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf());
        store.save(&id("s1"), b"one".to_vec()).await.unwrap();
        store.save(&id("s1"), b"two".to_vec()).await.unwrap();
        assert_eq!(store.load(&id("s1")).await.unwrap().unwrap().blob, b"two");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf());
        store.save(&id("gone"), b"x".to_vec()).await.unwrap();
        assert!(store.delete(&id("gone")).await.unwrap());
        assert!(!store.delete(&id("gone")).await.unwrap());
        assert!(store.load(&id("gone")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_skips_foreign_files() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf());
        store.save(&id("b"), b"bb".to_vec()).await.unwrap();
        store.save(&id("a"), b"a".to_vec()).await.unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "hello").unwrap();
        std::fs::write(tmp.path().join("bad name.session"), "x").unwrap();

        let listed = store.list().await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(listed[1].size_bytes, 2);
    }

    #[tokio::test]
    async fn list_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path().join("never-created"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purge_uses_modification_time() {
        let tmp = TempDir::new().unwrap();
        let store = FileSessionStore::new(tmp.path().to_path_buf());
        store.save(&id("s1"), b"x".to_vec()).await.unwrap();
        store.save(&id("s2"), b"y".to_vec()).await.unwrap();

        let removed = store
            .purge_older_than(Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(removed, 0);

        let removed = store
            .purge_older_than(Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(store.list().await.unwrap().is_empty());
    }
}
