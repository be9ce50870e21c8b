//! Engine configuration with environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::types::RagError;

/// Tunables for the engine and its stores.
///
/// Defaults target a local Ollama instance and a `./storage` data directory;
/// every field can be overridden through `RAGFORGE_*` environment variables
/// via [`EngineConfig::from_env`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks.
    pub chunk_overlap: usize,
    /// Width of the deterministic excerpt used when generation is unavailable.
    pub excerpt_chars: usize,
    /// Embedding dimensionality; fixed at vector-index creation time.
    pub dimensions: usize,
    /// Upper bound on any single embedding or generation call. A timeout is
    /// treated identically to the backend being unavailable.
    pub call_timeout: Duration,
    pub record_db_path: PathBuf,
    pub vector_db_path: PathBuf,
    pub backup_dir: PathBuf,
    pub embedding_url: Url,
    pub embedding_model: String,
    pub generation_url: Url,
    pub generation_model: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            excerpt_chars: 500,
            dimensions: 384,
            call_timeout: Duration::from_secs(8),
            record_db_path: PathBuf::from("storage/records.sqlite"),
            vector_db_path: PathBuf::from("storage/vectors.sqlite"),
            backup_dir: PathBuf::from("storage/backups"),
            embedding_url: Url::parse("http://localhost:11434")
                .expect("default embedding url is valid"),
            embedding_model: "nomic-embed-text".to_string(),
            generation_url: Url::parse("http://localhost:11434")
                .expect("default generation url is valid"),
            generation_model: "llama3".to_string(),
        }
    }
}

impl EngineConfig {
    /// Builds a configuration from the environment, falling back to defaults
    /// for anything unset. Loads `.env` first if one is present.
    pub fn from_env() -> Result<Self, RagError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Some(value) = env_usize("RAGFORGE_CHUNK_SIZE")? {
            config.chunk_size = value;
        }
        if let Some(value) = env_usize("RAGFORGE_CHUNK_OVERLAP")? {
            config.chunk_overlap = value;
        }
        if let Some(value) = env_usize("RAGFORGE_EXCERPT_CHARS")? {
            config.excerpt_chars = value;
        }
        if let Some(value) = env_usize("RAGFORGE_EMBED_DIMENSIONS")? {
            config.dimensions = value;
        }
        if let Some(value) = env_usize("RAGFORGE_CALL_TIMEOUT_SECS")? {
            config.call_timeout = Duration::from_secs(value as u64);
        }
        if let Ok(value) = std::env::var("RAGFORGE_RECORD_DB") {
            config.record_db_path = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("RAGFORGE_VECTOR_DB") {
            config.vector_db_path = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("RAGFORGE_BACKUP_DIR") {
            config.backup_dir = PathBuf::from(value);
        }
        if let Some(value) = env_url("RAGFORGE_EMBEDDING_URL")? {
            config.embedding_url = value;
        }
        if let Ok(value) = std::env::var("RAGFORGE_EMBEDDING_MODEL") {
            config.embedding_model = value;
        }
        if let Some(value) = env_url("RAGFORGE_GENERATION_URL")? {
            config.generation_url = value;
        }
        if let Ok(value) = std::env::var("RAGFORGE_GENERATION_MODEL") {
            config.generation_model = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Sanity checks applied at engine construction.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidInput("chunk_size must be positive".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::InvalidInput(
                "chunk_overlap must be smaller than chunk_size".into(),
            ));
        }
        if self.dimensions == 0 {
            return Err(RagError::InvalidInput(
                "embedding dimensions must be positive".into(),
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(RagError::InvalidInput(
                "call_timeout must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn env_usize(key: &str) -> Result<Option<usize>, RagError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<usize>()
            .map(Some)
            .map_err(|err| RagError::InvalidInput(format!("{key}={raw}: {err}"))),
        Err(_) => Ok(None),
    }
}

fn env_url(key: &str) -> Result<Option<Url>, RagError> {
    match std::env::var(key) {
        Ok(raw) => Url::parse(&raw)
            .map(Some)
            .map_err(|err| RagError::InvalidInput(format!("{key}={raw}: {err}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn overlap_must_stay_below_chunk_size() {
        let config = EngineConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_dimensions_rejected() {
        let config = EngineConfig {
            dimensions: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
