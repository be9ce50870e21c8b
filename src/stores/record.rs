//! Authoritative document table backed by SQLite.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::{Connection, OptionalExtension};

use crate::types::{Document, RagError};

/// The single source of truth for document existence.
///
/// Rows are keyed by the generated document id; `created_at` is stored as a
/// fixed-width RFC 3339 string so lexicographic order matches chronological
/// order for the recency queries.
#[derive(Clone)]
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RagError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|err| RagError::RecordStore(err.to_string()))?;
            }
        }
        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::RecordStore(err.to_string()))?;
        conn.call(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS documents (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    metadata TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_documents_created_at
                    ON documents(created_at);",
            )
            .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await
        .map_err(|err| RagError::RecordStore(err.to_string()))?;
        Ok(Self { conn })
    }

    /// Inserts a new document. The unique constraint on `id` makes a reused
    /// id a hard error.
    pub async fn insert(&self, document: &Document) -> Result<(), RagError> {
        let id = document.id.clone();
        let title = document.title.clone();
        let content = document.content.clone();
        let metadata = document.metadata.to_string();
        let created_at = format_timestamp(&document.created_at);

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO documents (id, title, content, metadata, created_at)
                     VALUES (?, ?, ?, ?, ?)",
                    [&id, &title, &content, &metadata, &created_at],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(())
            })
            .await
            .map_err(|err| RagError::RecordStore(err.to_string()))
    }

    pub async fn get(&self, id: &str) -> Result<Option<Document>, RagError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, title, content, metadata, created_at
                         FROM documents WHERE id = ?",
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let result = stmt
                    .query_row([&id], |row| {
                        Ok(Document {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            content: row.get(2)?,
                            metadata: row
                                .get::<_, String>(3)
                                .map(|s| serde_json::from_str(&s).unwrap_or_default())
                                .unwrap_or_default(),
                            created_at: parse_timestamp(&row.get::<_, String>(4)?),
                        })
                    })
                    .optional()
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(result)
            })
            .await
            .map_err(|err| RagError::RecordStore(err.to_string()))
    }

    /// Lists documents in descending creation order.
    ///
    /// With `owner` set, only documents whose metadata `uploader_id` matches
    /// are returned; this is the record-store side of owner-scoped listings.
    pub async fn list_recent(
        &self,
        offset: usize,
        limit: usize,
        owner: Option<i64>,
    ) -> Result<Vec<Document>, RagError> {
        let sql = match owner {
            Some(owner_id) => format!(
                "SELECT id, title, content, metadata, created_at FROM documents
                 WHERE json_extract(metadata, '$.uploader_id') = {owner_id}
                 ORDER BY created_at DESC LIMIT {limit} OFFSET {offset}"
            ),
            None => format!(
                "SELECT id, title, content, metadata, created_at FROM documents
                 ORDER BY created_at DESC LIMIT {limit} OFFSET {offset}"
            ),
        };

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&sql)
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(Document {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            content: row.get(2)?,
                            metadata: row
                                .get::<_, String>(3)
                                .map(|s| serde_json::from_str(&s).unwrap_or_default())
                                .unwrap_or_default(),
                            created_at: parse_timestamp(&row.get::<_, String>(4)?),
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut documents = Vec::new();
                for row in rows {
                    documents.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(documents)
            })
            .await
            .map_err(|err| RagError::RecordStore(err.to_string()))
    }

    /// Removes a document. Returns `false` when no row had that id.
    pub async fn delete(&self, id: &str) -> Result<bool, RagError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let deleted = conn
                    .execute("DELETE FROM documents WHERE id = ?", [&id])
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(deleted > 0)
            })
            .await
            .map_err(|err| RagError::RecordStore(err.to_string()))
    }

    pub async fn count(&self) -> Result<usize, RagError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| RagError::RecordStore(err.to_string()))
    }
}

/// Fixed-width RFC 3339 so text comparison matches chronological order.
fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_document(id: &str, created_at: DateTime<Utc>) -> Document {
        Document {
            id: id.to_string(),
            title: format!("title {id}"),
            content: format!("content of {id}"),
            metadata: serde_json::json!({"uploader_id": 7}),
            created_at,
        }
    }

    #[tokio::test]
    async fn insert_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRecordStore::open(dir.path().join("records.sqlite"))
            .await
            .unwrap();

        let doc = sample_document("d1", Utc::now());
        store.insert(&doc).await.unwrap();

        let loaded = store.get("d1").await.unwrap().unwrap();
        assert_eq!(loaded.title, doc.title);
        assert_eq!(loaded.content, doc.content);
        assert_eq!(loaded.metadata, doc.metadata);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRecordStore::open(dir.path().join("records.sqlite"))
            .await
            .unwrap();

        let doc = sample_document("d1", Utc::now());
        store.insert(&doc).await.unwrap();
        assert!(store.insert(&doc).await.is_err());
    }

    #[tokio::test]
    async fn listing_orders_by_recency() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRecordStore::open(dir.path().join("records.sqlite"))
            .await
            .unwrap();

        for (id, hour) in [("old", 8), ("mid", 9), ("new", 10)] {
            let created = Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap();
            store.insert(&sample_document(id, created)).await.unwrap();
        }

        let listed = store.list_recent(0, 2, None).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(ids, ["new", "mid"]);

        let rest = store.list_recent(2, 2, None).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, "old");
    }

    #[tokio::test]
    async fn owner_filter_scopes_listing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRecordStore::open(dir.path().join("records.sqlite"))
            .await
            .unwrap();

        let mut mine = sample_document("mine", Utc::now());
        mine.metadata = serde_json::json!({"uploader_id": 1});
        let mut theirs = sample_document("theirs", Utc::now());
        theirs.metadata = serde_json::json!({"uploader_id": 2});
        store.insert(&mine).await.unwrap();
        store.insert(&theirs).await.unwrap();

        let listed = store.list_recent(0, 10, Some(1)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "mine");
    }

    #[tokio::test]
    async fn delete_reports_whether_row_existed() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRecordStore::open(dir.path().join("records.sqlite"))
            .await
            .unwrap();

        store
            .insert(&sample_document("d1", Utc::now()))
            .await
            .unwrap();
        assert!(store.delete("d1").await.unwrap());
        assert!(!store.delete("d1").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
