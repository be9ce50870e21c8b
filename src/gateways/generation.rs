//! Generation backend wrapper with per-call failure isolation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{bounded_call, GatewayCall};
use crate::types::RagError;

/// Prompt template for grounded question answering.
const QA_PROMPT: &str = "\
You are a helpful assistant that answers questions based on the provided context.
If you don't know the answer based on the context, just say that you don't know.
Don't try to make up an answer.

Context:
{context}

Question: {question}

Answer:";

/// Fills the QA template with the retrieved context and the user question.
pub fn build_prompt(context: &str, question: &str) -> String {
    QA_PROMPT
        .replace("{context}", context)
        .replace("{question}", question)
}

/// A backend that turns a prompt into completion text.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, RagError>;
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerationResponse {
    response: String,
}

/// Generation provider speaking the Ollama-style `/api/generate` protocol.
pub struct HttpGenerationProvider {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
}

impl HttpGenerationProvider {
    pub fn new(base_url: Url, model: impl Into<String>) -> Result<Self, RagError> {
        let endpoint = base_url
            .join("api/generate")
            .map_err(|err| RagError::InvalidInput(format!("generation url: {err}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            model: model.into(),
        })
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationProvider {
    fn name(&self) -> &str {
        "http-generation"
    }

    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        let request = GenerationRequest {
            model: &self.model,
            prompt,
            stream: false,
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

        let body: GenerationResponse = response
            .json()
            .await
            .map_err(|err| RagError::Backend(err.to_string()))?;
        Ok(body.response)
    }
}

/// Deterministic generation provider for tests and offline runs.
pub struct MockGenerationProvider {
    echo_prompt: bool,
}

impl MockGenerationProvider {
    /// Always answers with a fixed acknowledgement.
    pub fn new() -> Self {
        Self { echo_prompt: false }
    }

    /// Echoes the full prompt back, letting tests assert on the context that
    /// reached the backend.
    pub fn echoing() -> Self {
        Self { echo_prompt: true }
    }
}

impl Default for MockGenerationProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationProvider for MockGenerationProvider {
    fn name(&self) -> &str {
        "mock-generation"
    }

    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        if self.echo_prompt {
            Ok(prompt.to_string())
        } else {
            Ok("mock answer".to_string())
        }
    }
}

/// Wraps a [`GenerationProvider`] with per-call timeouts.
///
/// Unlike the embedding gateway there is no persistent degraded flag:
/// generation failures are often transient, so every call is attempted and a
/// failure is reported as `Unavailable` for that call only.
pub struct GenerationGateway {
    provider: Arc<dyn GenerationProvider>,
    timeout: Duration,
}

impl GenerationGateway {
    pub fn new(provider: Arc<dyn GenerationProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Synthesizes an answer for `question` grounded in `context`.
    pub async fn generate(&self, context: &str, question: &str) -> GatewayCall<String> {
        let prompt = build_prompt(context, question);
        bounded_call(
            self.provider.name(),
            self.timeout,
            self.provider.complete(&prompt),
        )
        .await
    }
}
