//! Ingestion pipeline: record write first, derived tiers best-effort.

use chrono::Utc;
use uuid::Uuid;

use super::RagEngine;
use crate::gateways::GatewayCall;
use crate::types::{Document, IndexedVector, Principal, RagError};

/// A document submitted for ingestion.
#[derive(Clone, Debug)]
pub struct IngestRequest {
    pub title: String,
    pub content: String,
    pub metadata: serde_json::Value,
    /// Validated identity from the policy layer; stamps uploader metadata.
    pub principal: Option<Principal>,
}

impl IngestRequest {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            metadata: serde_json::Value::Object(Default::default()),
            principal: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }
}

impl RagEngine {
    /// Ingests a document across the three tiers.
    ///
    /// Write order and failure policy:
    /// 1. A fresh id is generated; it is never reused.
    /// 2. The record store write is load-bearing: if it fails, ingestion
    ///    fails and no other tier is touched, so a document that does not
    ///    exist in the authoritative store exists nowhere.
    /// 3. The backup snapshot is best-effort; a failure is logged.
    /// 4. Chunk/embed/index is best-effort; any failure leaves the document
    ///    recorded but not semantically searchable, with no automatic retry.
    ///
    /// The returned [`Document`] is the record-store row regardless of
    /// whether steps 3 and 4 succeeded.
    pub async fn ingest(&self, request: IngestRequest) -> Result<Document, RagError> {
        let id = Uuid::new_v4().to_string();

        let title = if request.title.trim().is_empty() {
            "Untitled Document".to_string()
        } else {
            request.title
        };
        let mut metadata = match request.metadata {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => Default::default(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        if let Some(principal) = &request.principal {
            metadata.insert("uploader_id".to_string(), principal.user_id.into());
            metadata.insert(
                "uploader_username".to_string(),
                principal.username.clone().into(),
            );
        }

        let document = Document {
            id: id.clone(),
            title,
            content: request.content,
            metadata: serde_json::Value::Object(metadata),
            created_at: Utc::now(),
        };

        self.records.insert(&document).await?;
        tracing::info!(document_id = %id, title = %document.title, "document recorded");

        if let Err(err) = self.backup.write(&document).await {
            tracing::warn!(document_id = %id, error = %err, "backup snapshot failed");
        }

        self.index_document(&document).await;

        Ok(document)
    }

    /// Best-effort semantic indexing. Never returns an error: every failure
    /// path logs and leaves the document unindexed until a re-ingestion.
    async fn index_document(&self, document: &Document) {
        let Some(index) = &self.vector else {
            tracing::warn!(
                document_id = %document.id,
                "vector index unavailable; document not semantically searchable"
            );
            return;
        };
        if self.embeddings.is_degraded() {
            tracing::warn!(
                document_id = %document.id,
                "embedding backend degraded; document not semantically searchable"
            );
            return;
        }

        let chunks = self.chunker.split(&document.content, &document.id);
        if chunks.is_empty() {
            tracing::debug!(document_id = %document.id, "no content to index");
            return;
        }

        let mut vectors = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            match self.embeddings.embed(&chunk.text).await {
                GatewayCall::Ok(embedding) => vectors.push(IndexedVector {
                    embedding,
                    chunk_text: chunk.text,
                    collection_id: chunk.source_document_id,
                }),
                GatewayCall::Unavailable => {
                    tracing::warn!(
                        document_id = %document.id,
                        embedded = vectors.len(),
                        "embedding failed mid-ingestion; document not semantically searchable"
                    );
                    return;
                }
            }
        }

        match index.add(vectors).await {
            Ok(stored) => {
                tracing::info!(document_id = %document.id, chunks = stored, "document indexed");
            }
            Err(err) => {
                tracing::warn!(
                    document_id = %document.id,
                    error = %err,
                    "vector indexing failed; document not semantically searchable"
                );
            }
        }
    }
}
