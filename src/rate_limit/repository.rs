//! Settings repository: durable per-client rate limit overrides.
//!
//! The limiter only talks to the [`SettingsRepository`] trait. Values are
//! stored as JSON documents under `rate_limit:config:{key}`, so any string
//! key-value store can sit behind it. The bundled adapter keeps them in memory.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::rate_limit::LimitConfig;

const KEY_PREFIX: &str = "rate_limit:config:";

#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No usable override is stored. Malformed or non-positive documents count as missing.
    #[error("no rate limit config stored for {0}")]
    NotFound(String),
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Persistence contract for per-client limits. Each call is atomic on its own.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_config(&self, key: &str) -> Result<LimitConfig, RepositoryError>;

    /// Callers validate `config` first.
    async fn set_config(&self, key: &str, config: LimitConfig) -> Result<(), RepositoryError>;

    async fn delete_config(&self, key: &str) -> Result<(), RepositoryError>;
}

/// Store key for a client.
pub fn storage_key(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}

/// Decode a stored document, rejecting malformed or non-positive limits.
pub fn decode_config(key: &str, raw: &str) -> Result<LimitConfig, RepositoryError> {
    match serde_json::from_str::<LimitConfig>(raw) {
        Ok(config) if config.is_valid() => Ok(config),
        Ok(config) => {
            tracing::warn!(
                ip = %key,
                max_tokens = config.max_tokens,
                refill_rate = config.refill_rate,
                "Stored rate limit config is not positive, ignoring"
            );
            Err(RepositoryError::NotFound(key.to_string()))
        }
        Err(e) => {
            tracing::warn!(ip = %key, error = %e, "Stored rate limit config is malformed, ignoring");
            Err(RepositoryError::NotFound(key.to_string()))
        }
    }
}

/// In-process store backed by a concurrent map of JSON documents.
#[derive(Debug, Default)]
pub struct InMemorySettingsRepository {
    entries: DashMap<String, String>,
}

impl InMemorySettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn get_config(&self, key: &str) -> Result<LimitConfig, RepositoryError> {
        let raw = self
            .entries
            .get(&storage_key(key))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RepositoryError::NotFound(key.to_string()))?;
        decode_config(key, &raw)
    }

    async fn set_config(&self, key: &str, config: LimitConfig) -> Result<(), RepositoryError> {
        let raw = serde_json::to_string(&config)?;
        self.entries.insert(storage_key(key), raw);
        tracing::info!(
            ip = %key,
            max_tokens = config.max_tokens,
            refill_rate = config.refill_rate,
            "Rate limit config stored"
        );
        Ok(())
    }

    async fn delete_config(&self, key: &str) -> Result<(), RepositoryError> {
        self.entries.remove(&storage_key(key));
        tracing::info!(ip = %key, "Rate limit config deleted");
        Ok(())
    }
}
