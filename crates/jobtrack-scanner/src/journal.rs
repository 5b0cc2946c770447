//! Journal of classifications the sheet did not accept.
//!
//! A write that keeps failing is appended here instead of being dropped and
//! is replayed at the start of the next pass.

use crate::error::{Result, ScanError};
use async_trait::async_trait;
use jobtrack_core::{ApplicationId, CanonicalStatus, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// A reconciliation waiting for the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWrite {
    pub application_id: ApplicationId,
    pub status: CanonicalStatus,
    pub checked_at: Timestamp,
}

/// Durable list of pending writes, at most one per application.
#[async_trait]
pub trait WriteJournal: Send + Sync {
    /// Every pending write, oldest first.
    async fn load(&self) -> Result<Vec<PendingWrite>>;

    /// Add a write, replacing any older one for the same application.
    async fn append(&self, write: PendingWrite) -> Result<()>;

    /// Replace the whole journal.
    async fn replace(&self, writes: Vec<PendingWrite>) -> Result<()>;

    /// Drop the pending write for `id`, if any. A newer status reached the
    /// sheet, so the older one must not be replayed over it.
    async fn remove(&self, id: &ApplicationId) -> Result<()>;
}

fn merge(writes: &mut Vec<PendingWrite>, write: PendingWrite) {
    writes.retain(|w| w.application_id != write.application_id);
    writes.push(write);
}

/// In-process journal, used in tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    writes: Mutex<Vec<PendingWrite>>,
}

impl MemoryJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WriteJournal for MemoryJournal {
    async fn load(&self) -> Result<Vec<PendingWrite>> {
        Ok(self.writes.lock().expect("acquire journal lock").clone())
    }

    async fn append(&self, write: PendingWrite) -> Result<()> {
        merge(&mut self.writes.lock().expect("acquire journal lock"), write);
        Ok(())
    }

    async fn replace(&self, writes: Vec<PendingWrite>) -> Result<()> {
        *self.writes.lock().expect("acquire journal lock") = writes;
        Ok(())
    }

    async fn remove(&self, id: &ApplicationId) -> Result<()> {
        self.writes
            .lock()
            .expect("acquire journal lock")
            .retain(|w| &w.application_id != id);
        Ok(())
    }
}

/// Journal kept as a JSON array in one file.
///
/// Writes go to a sibling temp file first and are renamed into place.
#[derive(Debug)]
pub struct JsonFileJournal {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonFileJournal {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn read(&self) -> Result<Vec<PendingWrite>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(Vec::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, writes: &[PendingWrite]) -> Result<()> {
        if writes.is_empty() {
            return match tokio::fs::remove_file(&self.path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            };
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| ScanError::Journal(format!("{} is not a file path", self.path.display())))?;
        let mut tmp_name = file_name.to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        tokio::fs::write(&tmp, serde_json::to_vec_pretty(writes)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), pending = writes.len(), "saved write journal");
        Ok(())
    }
}

#[async_trait]
impl WriteJournal for JsonFileJournal {
    async fn load(&self) -> Result<Vec<PendingWrite>> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    async fn append(&self, write: PendingWrite) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut writes = self.read().await?;
        merge(&mut writes, write);
        self.write(&writes).await
    }

    async fn replace(&self, writes: Vec<PendingWrite>) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write(&writes).await
    }

    async fn remove(&self, id: &ApplicationId) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut writes = self.read().await?;
        let before = writes.len();
        writes.retain(|w| &w.application_id != id);
        if writes.len() == before {
            return Ok(());
        }
        self.write(&writes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(id: &str, status: CanonicalStatus) -> PendingWrite {
        PendingWrite {
            application_id: ApplicationId::new(id).unwrap(),
            status,
            checked_at: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn test_memory_journal_keeps_latest_per_application() {
        let journal = MemoryJournal::new();
        journal
            .append(pending("a", CanonicalStatus::UnderReview))
            .await
            .unwrap();
        journal.append(pending("b", CanonicalStatus::Open)).await.unwrap();
        journal.append(pending("a", CanonicalStatus::Rejected)).await.unwrap();

        let writes = journal.load().await.unwrap();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].application_id.as_str(), "b");
        assert_eq!(writes[1].status, CanonicalStatus::Rejected);
    }

    #[tokio::test]
    async fn test_file_journal_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("pending-writes.json");

        let journal = JsonFileJournal::new(&path);
        assert!(journal.load().await.unwrap().is_empty());
        journal.append(pending("a", CanonicalStatus::Closed)).await.unwrap();
        journal.append(pending("b", CanonicalStatus::Filled)).await.unwrap();

        let reopened = JsonFileJournal::new(&path);
        let writes = reopened.load().await.unwrap();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].status, CanonicalStatus::Closed);
    }

    #[tokio::test]
    async fn test_file_journal_replace_with_empty_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending-writes.json");
        let journal = JsonFileJournal::new(&path);

        journal.append(pending("a", CanonicalStatus::Closed)).await.unwrap();
        assert!(path.exists());
        journal.replace(Vec::new()).await.unwrap();
        assert!(!path.exists());
        assert!(journal.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_drops_only_that_application() {
        let memory = MemoryJournal::new();
        memory.append(pending("a", CanonicalStatus::Expired)).await.unwrap();
        memory.append(pending("b", CanonicalStatus::Closed)).await.unwrap();
        memory.remove(&ApplicationId::new("a").unwrap()).await.unwrap();
        memory.remove(&ApplicationId::new("missing").unwrap()).await.unwrap();
        let writes = memory.load().await.unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].application_id.as_str(), "b");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending-writes.json");
        let file = JsonFileJournal::new(&path);
        file.append(pending("a", CanonicalStatus::Expired)).await.unwrap();
        file.append(pending("b", CanonicalStatus::Closed)).await.unwrap();

        file.remove(&ApplicationId::new("a").unwrap()).await.unwrap();
        let writes = JsonFileJournal::new(&path).load().await.unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].application_id.as_str(), "b");

        file.remove(&ApplicationId::new("b").unwrap()).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_remove_from_missing_file_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending-writes.json");
        let journal = JsonFileJournal::new(&path);
        journal.remove(&ApplicationId::new("a").unwrap()).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_journal_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pending-writes.json");
        std::fs::write(&path, "not json").unwrap();

        let err = JsonFileJournal::new(&path).load().await.unwrap_err();
        assert!(matches!(err, ScanError::Serde(_)));
    }
}
