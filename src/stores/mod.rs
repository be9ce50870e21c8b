//! Persistence tiers for documents and their derived representations.
//!
//! ```text
//!                      ┌────────────────────┐
//!                      │   RagEngine        │
//!                      └─────────┬──────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        ▼                       ▼                       ▼
//! ┌──────────────┐      ┌────────────────┐      ┌───────────────┐
//! │ RecordStore  │      │  VectorIndex   │      │  BackupStore  │
//! │ (sqlite,     │      │ (sqlite-vec,   │      │ (one JSON     │
//! │  source of   │      │  similarity    │      │  snapshot per │
//! │  truth)      │      │  search)       │      │  document)    │
//! └──────────────┘      └────────────────┘      └───────────────┘
//! ```
//!
//! The record store is authoritative: a document exists if and only if it has
//! a row there. The vector index and the backup snapshots are derived
//! representations; their absence never blocks ingestion, and stale entries
//! in them are pruned best-effort at delete time and filtered at query time.

pub mod backup;
pub mod record;
pub mod vector;

pub use backup::FsBackupStore;
pub use record::SqliteRecordStore;
pub use vector::SqliteVectorIndex;
