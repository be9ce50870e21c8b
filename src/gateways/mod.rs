//! Gateways wrapping the external embedding and generation backends.
//!
//! Each gateway converts provider failures into the typed [`GatewayCall`]
//! outcome instead of propagating errors, so the engine's fallback logic is
//! driven by explicit pattern matching rather than catch-all handling. The
//! two gateways deliberately differ in failure memory:
//!
//! * [`embedding::EmbeddingGateway`] probes its backend once at construction
//!   and stays degraded for the process lifetime if the probe fails.
//! * [`generation::GenerationGateway`] treats every call independently, since
//!   generation failures (rate limits, timeouts) are often transient.

pub mod embedding;
pub mod generation;

use std::future::Future;
use std::time::Duration;

use crate::types::RagError;

pub use embedding::{EmbeddingGateway, EmbeddingProvider, HttpEmbeddingProvider};
pub use generation::{GenerationGateway, GenerationProvider, HttpGenerationProvider};

/// Outcome of a call through a gateway.
///
/// `Unavailable` is a normal, expected state, not an error: callers match on
/// it and fall back. The failure reason has already been logged at the point
/// of origin.
#[derive(Clone, Debug, PartialEq)]
pub enum GatewayCall<T> {
    Ok(T),
    Unavailable,
}

impl<T> GatewayCall<T> {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, GatewayCall::Unavailable)
    }

    pub fn ok(self) -> Option<T> {
        match self {
            GatewayCall::Ok(value) => Some(value),
            GatewayCall::Unavailable => None,
        }
    }
}

/// Runs a provider call under a deadline, collapsing errors and timeouts into
/// `Unavailable`. A timeout is indistinguishable from the backend being down.
pub(crate) async fn bounded_call<T, F>(
    what: &str,
    timeout: Duration,
    fut: F,
) -> GatewayCall<T>
where
    F: Future<Output = Result<T, RagError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => GatewayCall::Ok(value),
        Ok(Err(err)) => {
            tracing::warn!(backend = what, error = %err, "backend call failed");
            GatewayCall::Unavailable
        }
        Err(_) => {
            tracing::warn!(
                backend = what,
                timeout_ms = timeout.as_millis() as u64,
                "backend call timed out"
            );
            GatewayCall::Unavailable
        }
    }
}
