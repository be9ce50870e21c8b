//! Core data model and error taxonomy shared across the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Errors produced by the engine and its stores.
///
/// Only [`RagError::RecordStore`] is fatal to ingestion; every other failure
/// is caught where it originates and converted into a degraded-but-successful
/// outcome. Retrieval surfaces [`RagError::InvalidInput`] for malformed
/// queries and nothing else.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// The authoritative record store rejected or failed an operation.
    #[error("record store failure: {0}")]
    RecordStore(String),

    /// A derived store (vector index or backup snapshots) failed internally.
    #[error("storage failure: {0}")]
    Storage(String),

    /// An external backend (embedding or generation) failed at the transport
    /// level. Converted to `GatewayCall::Unavailable` at the gateway boundary
    /// and never propagated to engine callers.
    #[error("backend failure: {0}")]
    Backend(String),

    /// The caller supplied input that is rejected before any I/O happens.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io failure: {0}")]
    Io(String),
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Io(err.to_string())
    }
}

/// A document as recorded in the authoritative record store.
///
/// The `id` is assigned once at ingestion and never reused; it doubles as the
/// vector collection id and the backup snapshot filename, making it the join
/// key across all three persistence tiers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// A bounded span of a document's text, the unit of embedding and retrieval.
///
/// Transient: produced by the chunker, consumed by the embedding gateway and
/// the vector index, never persisted on its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub source_document_id: String,
}

/// A chunk vector as stored in the vector index.
///
/// `collection_id` is carried explicitly on every vector rather than being
/// encoded in a table-name convention; it always equals the owning document's
/// id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexedVector {
    pub embedding: Vec<f32>,
    pub chunk_text: String,
    pub collection_id: String,
}

/// A free-text retrieval request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub top_k: usize,
}

impl Query {
    pub const DEFAULT_TOP_K: usize = 5;

    /// Creates a query with the default `top_k`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: Self::DEFAULT_TOP_K,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Rejects malformed queries before any store or backend is touched.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.text.trim().is_empty() {
            return Err(RagError::InvalidInput("query text is empty".into()));
        }
        if self.top_k == 0 {
            return Err(RagError::InvalidInput("top_k must be positive".into()));
        }
        Ok(())
    }
}

/// One retrieved fragment: a chunk (vector tier) or a whole document
/// (record/backup tiers), enriched with record-store metadata when available.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub content: String,
    pub document_id: String,
    pub title: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Cosine similarity for vector-tier hits; `None` for fallback tiers.
    pub score: Option<f32>,
}

/// A synthesized answer together with the fragments it was derived from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub derived_from: Vec<RetrievalResult>,
}

/// The full outcome of one retrieval call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Retrieval {
    pub query: String,
    pub answer: Answer,
    pub results: Vec<RetrievalResult>,
}

/// Role of the acting principal, as decided by the external policy layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Viewer,
}

/// A validated identity handed in by the caller.
///
/// The engine trusts this entirely: it stamps uploader metadata at ingestion
/// and scopes listings, but performs no authentication or policy checks of
/// its own.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}
