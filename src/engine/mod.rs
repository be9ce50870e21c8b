//! The engine facade: explicit dependencies, two public entry points.
//!
//! [`RagEngine`] owns one handle to each persistence tier plus the two
//! backend gateways. Everything is constructed once at process start and
//! injected here; there is no ambient global state. Callers share the engine
//! behind an `Arc`: each tier's handle is internally safe for concurrent
//! use, and no cross-document locking exists because every document owns a
//! distinct record row, vector collection, and snapshot file.

mod ingest;
mod retrieve;

use std::sync::Arc;

use crate::chunking::Chunker;
use crate::config::EngineConfig;
use crate::gateways::{
    EmbeddingGateway, EmbeddingProvider, GenerationGateway, GenerationProvider,
    HttpEmbeddingProvider, HttpGenerationProvider,
};
use crate::stores::{FsBackupStore, SqliteRecordStore, SqliteVectorIndex};
use crate::types::{Document, Principal, RagError, Role};

pub use ingest::IngestRequest;
pub use retrieve::NO_INFORMATION_ANSWER;

/// Multi-tier ingestion and retrieval engine.
pub struct RagEngine {
    pub(crate) config: EngineConfig,
    pub(crate) chunker: Chunker,
    pub(crate) records: SqliteRecordStore,
    pub(crate) backup: FsBackupStore,
    /// `None` when the index failed to open at startup; the pipeline and the
    /// cascade treat that as the vector tier being unavailable.
    pub(crate) vector: Option<SqliteVectorIndex>,
    pub(crate) embeddings: EmbeddingGateway,
    pub(crate) generation: GenerationGateway,
}

impl RagEngine {
    /// Opens the engine against the HTTP backends named in `config`.
    pub async fn open(config: EngineConfig) -> Result<Self, RagError> {
        let embedding_provider = Arc::new(HttpEmbeddingProvider::new(
            config.embedding_url.clone(),
            config.embedding_model.clone(),
        )?);
        let generation_provider = Arc::new(HttpGenerationProvider::new(
            config.generation_url.clone(),
            config.generation_model.clone(),
        )?);
        Self::with_providers(config, embedding_provider, generation_provider).await
    }

    /// Opens the engine with caller-supplied backend providers.
    ///
    /// The record and backup stores must come up: without the authoritative
    /// tier nothing can be ingested, and without a snapshot directory the
    /// last-resort tier cannot exist. A vector index failure is only logged:
    /// the engine runs without semantic search.
    pub async fn with_providers(
        config: EngineConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        generation_provider: Arc<dyn GenerationProvider>,
    ) -> Result<Self, RagError> {
        config.validate()?;
        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;

        let records = SqliteRecordStore::open(&config.record_db_path).await?;
        let backup = FsBackupStore::open(config.backup_dir.clone()).await?;
        let vector = match SqliteVectorIndex::open(&config.vector_db_path, config.dimensions).await
        {
            Ok(index) => Some(index),
            Err(err) => {
                tracing::warn!(error = %err, "vector index unavailable; semantic search disabled");
                None
            }
        };

        let embeddings = EmbeddingGateway::connect(embedding_provider, config.call_timeout).await;
        let generation = GenerationGateway::new(generation_provider, config.call_timeout);

        Ok(Self {
            config,
            chunker,
            records,
            backup,
            vector,
            embeddings,
            generation,
        })
    }

    /// Looks a document up by id, falling back to its backup snapshot when
    /// the record store is unreachable.
    pub async fn get_document(&self, id: &str) -> Option<Document> {
        match self.records.get(id).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(document_id = id, error = %err, "record lookup failed; trying backup snapshot");
                self.backup.read(id).await.ok().flatten()
            }
        }
    }

    /// Lists documents visible to `principal`, newest first.
    ///
    /// Admins see everything; other roles only see documents whose metadata
    /// names them as uploader. The principal arrives pre-validated from the
    /// policy layer and is trusted as-is.
    pub async fn list_documents(
        &self,
        principal: &Principal,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Document>, RagError> {
        let owner = match principal.role {
            Role::Admin => None,
            _ => Some(principal.user_id),
        };
        self.records.list_recent(offset, limit, owner).await
    }

    /// Whether the embedding backend was reachable at startup.
    pub fn semantic_search_available(&self) -> bool {
        self.vector.is_some() && !self.embeddings.is_degraded()
    }
}
