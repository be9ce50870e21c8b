//! Retrieval cascade, answer synthesis, and deletion.

use super::RagEngine;
use crate::gateways::GatewayCall;
use crate::types::{Answer, Document, Query, RagError, Retrieval, RetrievalResult};

/// Fixed answer for queries that match nothing in any tier.
pub const NO_INFORMATION_ANSWER: &str =
    "No relevant information found to answer your question.";

/// Prefix of the deterministic excerpt used when generation is unavailable.
const EXCERPT_MARKER: &str = "Based on the retrieved information, here's what I found: ";

impl RagEngine {
    /// Answers a free-text query through the tier cascade.
    ///
    /// Tier order, where the first tier that yields at least one result wins;
    /// later tiers are pure fallback, never supplementation:
    /// 1. vector search, with every hit resolved against the record store
    ///    (stale hits are silently dropped);
    /// 2. most recent documents from the record store;
    /// 3. backup snapshots, only when the record store itself is down.
    ///
    /// No tier or backend failure is fatal: the worst case is the fixed
    /// no-information answer. The only error this returns is
    /// [`RagError::InvalidInput`] for a malformed query.
    pub async fn retrieve(&self, query: Query) -> Result<Retrieval, RagError> {
        query.validate()?;

        let results = self.gather_results(&query).await;
        if results.is_empty() {
            tracing::info!(query = %query.text, "no results in any tier");
            return Ok(Retrieval {
                query: query.text,
                answer: Answer {
                    text: NO_INFORMATION_ANSWER.to_string(),
                    derived_from: Vec::new(),
                },
                results: Vec::new(),
            });
        }

        let context = results
            .iter()
            .map(|result| result.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let answer_text = match self.generation.generate(&context, &query.text).await {
            GatewayCall::Ok(text) if !text.trim().is_empty() => text,
            _ => {
                tracing::warn!(query = %query.text, "generation unavailable; using excerpt fallback");
                excerpt_fallback(&context, self.config.excerpt_chars)
            }
        };

        Ok(Retrieval {
            query: query.text,
            answer: Answer {
                text: answer_text,
                derived_from: results.clone(),
            },
            results,
        })
    }

    async fn gather_results(&self, query: &Query) -> Vec<RetrievalResult> {
        let mut record_store_down = false;

        // Tier 1: vector search, validated against the record store.
        if let Some(index) = &self.vector {
            if let GatewayCall::Ok(embedding) = self.embeddings.embed(&query.text).await {
                match index.search(&embedding, query.top_k).await {
                    Ok(hits) => {
                        let mut survivors = Vec::new();
                        for (hit, score) in hits {
                            match self.records.get(&hit.collection_id).await {
                                Ok(Some(document)) => survivors.push(RetrievalResult {
                                    content: hit.chunk_text,
                                    document_id: document.id,
                                    title: document.title,
                                    metadata: document.metadata,
                                    score: Some(score),
                                }),
                                Ok(None) => {
                                    tracing::debug!(
                                        collection_id = %hit.collection_id,
                                        "dropping stale vector hit"
                                    );
                                }
                                Err(err) => {
                                    // Hits cannot be validated without the
                                    // record store, so none of them survive.
                                    tracing::warn!(error = %err, "record store down during hit resolution");
                                    record_store_down = true;
                                    break;
                                }
                            }
                        }
                        if !record_store_down && !survivors.is_empty() {
                            tracing::info!(
                                query = %query.text,
                                results = survivors.len(),
                                tier = "vector",
                                "retrieval served"
                            );
                            return survivors;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "vector search failed; falling back");
                    }
                }
            }
        }

        // Tier 2: most recent documents, whole-document results.
        if !record_store_down {
            match self.records.list_recent(0, query.top_k, None).await {
                Ok(documents) => {
                    if !documents.is_empty() {
                        tracing::info!(
                            query = %query.text,
                            results = documents.len(),
                            tier = "record",
                            "retrieval served"
                        );
                    }
                    return documents.into_iter().map(whole_document_result).collect();
                }
                Err(err) => {
                    tracing::warn!(error = %err, "record store down; scanning backup snapshots");
                    record_store_down = true;
                }
            }
        }
        debug_assert!(record_store_down);

        // Tier 3: backup snapshots, last resort.
        match self.backup.list_all().await {
            Ok(documents) => {
                let results: Vec<RetrievalResult> = documents
                    .into_iter()
                    .take(query.top_k)
                    .map(whole_document_result)
                    .collect();
                if !results.is_empty() {
                    tracing::info!(
                        query = %query.text,
                        results = results.len(),
                        tier = "backup",
                        "retrieval served"
                    );
                }
                results
            }
            Err(err) => {
                tracing::warn!(error = %err, "backup scan failed");
                Vec::new()
            }
        }
    }

    /// Removes a document from all three tiers.
    ///
    /// Each removal is independent and a failure is logged, not raised. The
    /// return value reflects only the record-store removal: once a document
    /// is gone from the authoritative store it is gone, even if a derived
    /// copy lingers until the next best-effort prune.
    pub async fn delete(&self, document_id: &str) -> bool {
        let removed = match self.records.delete(document_id).await {
            Ok(removed) => removed,
            Err(err) => {
                tracing::warn!(document_id, error = %err, "record delete failed");
                false
            }
        };

        if let Some(index) = &self.vector {
            match index.delete_collection(document_id).await {
                Ok(pruned) => {
                    if pruned {
                        tracing::debug!(document_id, "vector collection pruned");
                    }
                }
                Err(err) => {
                    tracing::warn!(document_id, error = %err, "vector prune failed; stale entries will be filtered at query time");
                }
            }
        }

        if let Err(err) = self.backup.delete(document_id).await {
            tracing::warn!(document_id, error = %err, "backup snapshot delete failed");
        }

        if removed {
            tracing::info!(document_id, "document deleted");
        }
        removed
    }
}

fn whole_document_result(document: Document) -> RetrievalResult {
    RetrievalResult {
        content: document.content,
        document_id: document.id,
        title: document.title,
        metadata: document.metadata,
        score: None,
    }
}

/// Deterministic non-generative answer: marker plus a bounded excerpt.
fn excerpt_fallback(context: &str, excerpt_chars: usize) -> String {
    let excerpt: String = context.chars().take(excerpt_chars).collect();
    if context.chars().count() > excerpt_chars {
        format!("{EXCERPT_MARKER}{excerpt}...")
    } else {
        format!("{EXCERPT_MARKER}{excerpt}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_truncates_and_marks() {
        let long_context = "x".repeat(600);
        let fallback = excerpt_fallback(&long_context, 500);
        assert!(fallback.starts_with(EXCERPT_MARKER));
        assert!(fallback.ends_with("..."));
        assert_eq!(
            fallback.len(),
            EXCERPT_MARKER.len() + 500 + 3
        );
    }

    #[test]
    fn short_context_is_kept_whole() {
        let fallback = excerpt_fallback("Refunds take 5 days.", 500);
        assert_eq!(
            fallback,
            format!("{EXCERPT_MARKER}Refunds take 5 days.")
        );
    }
}
