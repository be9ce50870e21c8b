//! ```text
//! IngestRequest ──► engine::ingest ──► stores::record   (authoritative, load-bearing)
//!                          │
//!                          ├─► stores::backup           (best-effort snapshot)
//!                          └─► chunking ──► gateways::embedding ──► stores::vector
//!                                                                   (best-effort index)
//!
//! Query ──► engine::retrieve ──► vector tier ──► record tier ──► backup tier
//!                          │        (first tier with results wins)
//!                          └─► gateways::generation ──► Answer
//!                                  (deterministic excerpt when unavailable)
//! ```
//!
//! The record store is the single source of truth; the vector index and the
//! backup snapshots are derived tiers whose absence degrades quality but
//! never availability. Both external backends (embedding, generation) are
//! pluggable providers behind gateways that report unavailability as a typed
//! outcome instead of an error.

pub mod chunking;
pub mod config;
pub mod engine;
pub mod gateways;
pub mod stores;
pub mod types;

pub use chunking::Chunker;
pub use config::EngineConfig;
pub use engine::{IngestRequest, RagEngine, NO_INFORMATION_ANSWER};
pub use gateways::{
    EmbeddingGateway, EmbeddingProvider, GatewayCall, GenerationGateway, GenerationProvider,
};
pub use types::{
    Answer, Chunk, Document, IndexedVector, Principal, Query, RagError, Retrieval,
    RetrievalResult, Role,
};
