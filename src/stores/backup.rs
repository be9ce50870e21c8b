//! Flat filesystem snapshots, the tier of last resort.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::types::{Document, RagError};

/// One serialized JSON snapshot per document, named by document id.
///
/// Read only when the record store is unreachable; written best-effort at
/// ingestion. Snapshots that fail to parse are skipped with a warning rather
/// than failing a scan.
#[derive(Clone, Debug)]
pub struct FsBackupStore {
    root: PathBuf,
}

impl FsBackupStore {
    /// Opens the store, creating the snapshot directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, RagError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ids are engine-generated uuids; anything path-like is refused outright.
    fn snapshot_path(&self, id: &str) -> Option<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\', '.']) {
            return None;
        }
        Some(self.root.join(format!("{id}.json")))
    }

    pub async fn write(&self, document: &Document) -> Result<(), RagError> {
        let path = self
            .snapshot_path(&document.id)
            .ok_or_else(|| RagError::InvalidInput(format!("invalid snapshot id '{}'", document.id)))?;
        let serialized =
            serde_json::to_string(document).map_err(|err| RagError::Io(err.to_string()))?;
        fs::write(&path, serialized).await?;
        Ok(())
    }

    pub async fn read(&self, id: &str) -> Result<Option<Document>, RagError> {
        let Some(path) = self.snapshot_path(id) else {
            return Ok(None);
        };
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let document =
            serde_json::from_str(&raw).map_err(|err| RagError::Io(err.to_string()))?;
        Ok(Some(document))
    }

    /// Removes a snapshot. Returns `false` when none existed.
    pub async fn delete(&self, id: &str) -> Result<bool, RagError> {
        let Some(path) = self.snapshot_path(id) else {
            return Ok(false);
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Scans every snapshot, newest first.
    pub async fn list_all(&self) -> Result<Vec<Document>, RagError> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut documents = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let raw = match fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable snapshot");
                    continue;
                }
            };
            match serde_json::from_str::<Document>(&raw) {
                Ok(document) => documents.push(document),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unparseable snapshot");
                }
            }
        }

        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_document(id: &str, hour: u32) -> Document {
        Document {
            id: id.to_string(),
            title: format!("title {id}"),
            content: format!("content {id}"),
            metadata: serde_json::json!({}),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn write_read_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBackupStore::open(dir.path().join("backups")).await.unwrap();

        let doc = sample_document("abc123", 9);
        store.write(&doc).await.unwrap();

        let loaded = store.read("abc123").await.unwrap().unwrap();
        assert_eq!(loaded.content, doc.content);

        assert!(store.delete("abc123").await.unwrap());
        assert!(!store.delete("abc123").await.unwrap());
        assert!(store.read("abc123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_all_sorts_newest_first_and_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBackupStore::open(dir.path().join("backups")).await.unwrap();

        store.write(&sample_document("old", 8)).await.unwrap();
        store.write(&sample_document("new", 10)).await.unwrap();
        tokio::fs::write(store.root().join("junk.json"), "not json")
            .await
            .unwrap();

        let listed = store.list_all().await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(ids, ["new", "old"]);
    }

    #[tokio::test]
    async fn reading_a_missing_snapshot_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBackupStore::open(dir.path().join("backups")).await.unwrap();

        assert!(store.read("never-written").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn path_like_ids_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBackupStore::open(dir.path().join("backups")).await.unwrap();

        assert!(store.read("../etc/passwd").await.unwrap().is_none());
        assert!(!store.delete("..").await.unwrap());

        let mut doc = sample_document("x", 9);
        doc.id = "../escape".to_string();
        assert!(store.write(&doc).await.is_err());
    }
}
