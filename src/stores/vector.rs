//! Chunk-vector index backed by SQLite with the sqlite-vec extension.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::OnceLock;

use tokio_rusqlite::{ffi, Connection};

use crate::types::{IndexedVector, RagError};

/// Similarity-search index over chunk vectors.
///
/// Every vector carries its `collection_id` (the owning document's id) as a
/// first-class column, so whole-document deletion is a plain predicate rather
/// than a naming convention. Mutations run inside a transaction on a durable
/// connection, so a successful call survives a crash immediately after it.
#[derive(Clone)]
pub struct SqliteVectorIndex {
    conn: Connection,
    dimensions: usize,
}

impl SqliteVectorIndex {
    /// Opens (or creates) the index with a fixed embedding dimensionality.
    pub async fn open(path: impl AsRef<Path>, dimensions: usize) -> Result<Self, RagError> {
        if dimensions == 0 {
            return Err(RagError::InvalidInput(
                "embedding dimensions must be positive".into(),
            ));
        }
        Self::register_sqlite_vec()?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|err| RagError::Storage(err.to_string()))?;
            }
        }

        let conn = Connection::open(path)
            .await
            .map_err(|err| RagError::Storage(err.to_string()))?;
        conn.call(|conn| {
            let result = conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0));
            match result {
                Ok(_) => Ok(()),
                Err(err) => Err(tokio_rusqlite::Error::Rusqlite(err)),
            }
        })
        .await
        .map_err(|err| RagError::Storage(err.to_string()))?;

        let schema = format!(
            "CREATE TABLE IF NOT EXISTS doc_vectors (
                collection_id TEXT NOT NULL,
                seq TEXT NOT NULL,
                content TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_doc_vectors_collection
                ON doc_vectors(collection_id);
            CREATE VIRTUAL TABLE IF NOT EXISTS doc_vectors_vec
                USING vec0(embedding float[{dimensions}]);"
        );
        conn.call(move |conn| {
            conn.execute_batch(&schema)
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
            Ok(())
        })
        .await
        .map_err(|err| RagError::Storage(err.to_string()))?;

        Ok(Self { conn, dimensions })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Adds vectors to the index, returning how many were stored.
    ///
    /// The whole batch is one transaction; a crash after return cannot lose
    /// the write. Vectors of the wrong dimensionality are rejected up front.
    pub async fn add(&self, vectors: Vec<IndexedVector>) -> Result<usize, RagError> {
        if vectors.is_empty() {
            return Ok(0);
        }
        for vector in &vectors {
            if vector.embedding.len() != self.dimensions {
                return Err(RagError::InvalidInput(format!(
                    "embedding has {} dimensions, index expects {}",
                    vector.embedding.len(),
                    self.dimensions
                )));
            }
        }

        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Rusqlite)?;
                let mut stored = 0usize;
                for (seq, vector) in vectors.iter().enumerate() {
                    let seq = seq.to_string();
                    tx.execute(
                        "INSERT INTO doc_vectors (collection_id, seq, content)
                         VALUES (?, ?, ?)",
                        [&vector.collection_id, &seq, &vector.chunk_text],
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    let rowid = tx.last_insert_rowid();

                    let embedding_json = serde_json::to_string(&vector.embedding)
                        .map_err(|err| {
                            tokio_rusqlite::Error::Other(Box::new(err))
                        })?;
                    tx.execute(
                        &format!(
                            "INSERT INTO doc_vectors_vec (rowid, embedding)
                             VALUES ({rowid}, vec_f32(?))"
                        ),
                        [&embedding_json],
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                    stored += 1;
                }
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(stored)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    /// Returns up to `top_k` vectors ranked by cosine similarity descending,
    /// ties broken by insertion order.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(IndexedVector, f32)>, RagError> {
        if query_embedding.len() != self.dimensions {
            return Err(RagError::InvalidInput(format!(
                "query embedding has {} dimensions, index expects {}",
                query_embedding.len(),
                self.dimensions
            )));
        }
        let embedding_json = serde_json::to_string(query_embedding)
            .map_err(|err| RagError::Storage(err.to_string()))?;

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT v.collection_id, v.content, vec_to_json(e.embedding),
                                vec_distance_cosine(e.embedding, vec_f32(?)) AS distance
                         FROM doc_vectors v
                         JOIN doc_vectors_vec e ON e.rowid = v.rowid
                         ORDER BY distance ASC, v.rowid ASC
                         LIMIT {top_k}"
                    ))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let rows = stmt
                    .query_map([&embedding_json], |row| {
                        let collection_id: String = row.get(0)?;
                        let chunk_text: String = row.get(1)?;
                        let embedding: Vec<f32> = row
                            .get::<_, String>(2)
                            .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
                            .unwrap_or_default();
                        let distance: f32 = row.get(3)?;
                        Ok((
                            IndexedVector {
                                embedding,
                                chunk_text,
                                collection_id,
                            },
                            1.0 - distance,
                        ))
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    /// Drops every vector belonging to one document.
    ///
    /// Idempotent: deleting a collection that does not exist returns
    /// `Ok(false)` rather than an error.
    pub async fn delete_collection(&self, collection_id: &str) -> Result<bool, RagError> {
        let collection_id = collection_id.to_string();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction().map_err(tokio_rusqlite::Error::Rusqlite)?;
                tx.execute(
                    "DELETE FROM doc_vectors_vec WHERE rowid IN
                     (SELECT rowid FROM doc_vectors WHERE collection_id = ?)",
                    [&collection_id],
                )
                .map_err(tokio_rusqlite::Error::Rusqlite)?;
                let deleted = tx
                    .execute(
                        "DELETE FROM doc_vectors WHERE collection_id = ?",
                        [&collection_id],
                    )
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                tx.commit().map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(deleted > 0)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    pub async fn count(&self) -> Result<usize, RagError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM doc_vectors", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| RagError::Storage(err.to_string()))
    }

    /// Registers sqlite-vec for every connection opened afterwards. Runs the
    /// FFI call once per process; later callers see the cached outcome.
    fn register_sqlite_vec() -> Result<(), RagError> {
        static REGISTRATION: OnceLock<Result<(), String>> = OnceLock::new();

        REGISTRATION
            .get_or_init(|| {
                type SqliteExtensionInit = unsafe extern "C" fn(
                    *mut ffi::sqlite3,
                    *mut *const c_char,
                    *const ffi::sqlite3_api_routines,
                ) -> i32;

                // sqlite-vec exports its entry point with an erased signature;
                // widen it to the shape sqlite3_auto_extension expects.
                let rc = unsafe {
                    let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
                    let init_fn: SqliteExtensionInit =
                        transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
                    ffi::sqlite3_auto_extension(Some(init_fn))
                };
                if rc == 0 {
                    Ok(())
                } else {
                    Err(format!("sqlite-vec auto extension registration returned {rc}"))
                }
            })
            .clone()
            .map_err(RagError::Storage)
    }
}
