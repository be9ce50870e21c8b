//! Embedding backend wrapper with a process-lifetime degraded mode.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{bounded_call, GatewayCall};
use crate::types::RagError;

/// A backend that turns text into a vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError>;
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Embedding provider speaking the Ollama-style `/api/embeddings` protocol.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
}

impl HttpEmbeddingProvider {
    pub fn new(base_url: Url, model: impl Into<String>) -> Result<Self, RagError> {
        let endpoint = base_url
            .join("api/embeddings")
            .map_err(|err| RagError::InvalidInput(format!("embedding url: {err}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            model: model.into(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn name(&self) -> &str {
        "http-embedding"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|err| RagError::Backend(err.to_string()))?
            .error_for_status()
            .map_err(|err| RagError::Backend(err.to_string()))?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|err| RagError::Backend(err.to_string()))?;

        if body.embedding.is_empty() {
            return Err(RagError::Backend("backend returned an empty embedding".into()));
        }
        Ok(body.embedding)
    }
}

/// Deterministic embedding provider for tests and offline runs.
///
/// Derives each component from a seeded hash of the input, so identical text
/// always maps to the identical vector and distinct text to a distinct one.
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &str {
        "mock-embedding"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vector = Vec::with_capacity(self.dimensions);
        for seed in 0..self.dimensions {
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325 ^ (seed as u64).wrapping_mul(0x9e37_79b9);
            for byte in text.as_bytes() {
                hash ^= u64::from(*byte);
                hash = hash.wrapping_mul(0x100_0000_01b3);
            }
            // Offset keeps the vector away from the zero point, where cosine
            // distance is undefined.
            vector.push(0.05 + (hash % 1000) as f32 / 1000.0);
        }
        Ok(vector)
    }
}

/// Wraps an [`EmbeddingProvider`] behind a one-time health probe.
///
/// If the probe fails the gateway is degraded for the rest of the process:
/// every `embed` call returns [`GatewayCall::Unavailable`] immediately
/// without attempting network I/O. Embedding backend health is assumed
/// stable for the process lifetime, so there is no retry loop.
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
    degraded: bool,
}

impl EmbeddingGateway {
    /// Probes the provider once and fixes the gateway's availability.
    pub async fn connect(provider: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        let probe = bounded_call(
            provider.name(),
            timeout,
            provider.embed("ragforge startup probe"),
        )
        .await;
        let degraded = probe.is_unavailable();
        if degraded {
            tracing::warn!(
                provider = provider.name(),
                "embedding backend unreachable at startup; running degraded for the process lifetime"
            );
        } else {
            tracing::info!(provider = provider.name(), "embedding backend ready");
        }
        Self {
            provider,
            timeout,
            degraded,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Embeds `text`, or reports unavailability without touching the network
    /// when degraded.
    pub async fn embed(&self, text: &str) -> GatewayCall<Vec<f32>> {
        if self.degraded {
            return GatewayCall::Unavailable;
        }
        bounded_call(self.provider.name(), self.timeout, self.provider.embed(text)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let provider = MockEmbeddingProvider::new(8);
        let first = provider.embed("hello world").await.unwrap();
        let second = provider.embed("hello world").await.unwrap();
        let other = provider.embed("goodbye world").await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(first.len(), 8);
    }

    #[tokio::test]
    async fn gateway_stays_degraded_after_failed_probe() {
        struct AlwaysDown;

        #[async_trait]
        impl EmbeddingProvider for AlwaysDown {
            fn name(&self) -> &str {
                "always-down"
            }

            async fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
                Err(RagError::Backend("connection refused".into()))
            }
        }

        let gateway =
            EmbeddingGateway::connect(Arc::new(AlwaysDown), Duration::from_millis(100)).await;
        assert!(gateway.is_degraded());
        assert!(gateway.embed("anything").await.is_unavailable());
    }

    #[tokio::test]
    async fn gateway_passes_through_when_healthy() {
        let gateway = EmbeddingGateway::connect(
            Arc::new(MockEmbeddingProvider::new(4)),
            Duration::from_secs(1),
        )
        .await;
        assert!(!gateway.is_degraded());
        let vector = gateway.embed("hello").await.ok().unwrap();
        assert_eq!(vector.len(), 4);
    }
}
