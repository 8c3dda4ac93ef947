//! Per-client token bucket rate limiter.
//!
//! # Responsibilities
//! - Admit or reject requests per client key
//! - Lazily create buckets from stored overrides or the default limit
//! - Refill buckets and evict idle ones on a fixed tick
//!
//! Every bucket-map mutation happens under one async mutex, so the refill
//! loop and the request path never see a half-updated bucket.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, Mutex};
use tokio::time::{self, MissedTickBehavior};

use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::rate_limit::{LimitConfig, RepositoryError, SettingsRepository, TokenBucket};

/// Outcome of one refill/eviction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefillReport {
    pub refilled: usize,
    pub evicted: usize,
}

pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    settings: Arc<dyn SettingsRepository>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, settings: Arc<dyn SettingsRepository>) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            settings,
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn default_limit(&self) -> LimitConfig {
        self.config.default
    }

    pub fn settings(&self) -> &Arc<dyn SettingsRepository> {
        &self.settings
    }

    /// Decide whether `key` may send one more request.
    pub async fn allow(&self, key: &str) -> bool {
        if !self.config.enabled {
            tracing::trace!(ip = %key, "Rate limiter disabled, allowing request");
            return true;
        }

        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();

        if !buckets.contains_key(key) {
            let limit = self.resolve_limit(key).await;
            tracing::debug!(
                ip = %key,
                max_tokens = limit.max_tokens,
                refill_rate = limit.refill_rate,
                "Created new bucket"
            );
            buckets.insert(key.to_string(), TokenBucket::full(limit, now));
            metrics::record_bucket_count(buckets.len());
        }

        let Some(bucket) = buckets.get_mut(key) else {
            return true;
        };

        if bucket.try_take(now) {
            tracing::trace!(ip = %key, tokens_after = bucket.tokens(), "Request allowed");
            true
        } else {
            tracing::debug!(ip = %key, tokens = bucket.tokens(), "Request rate limited");
            false
        }
    }

    /// The stored override for `key`, or the default when none is stored.
    /// Store failures other than "not found" are returned.
    pub async fn configured_limit(&self, key: &str) -> Result<LimitConfig, RepositoryError> {
        match self.settings.get_config(key).await {
            Ok(limit) => Ok(limit),
            Err(RepositoryError::NotFound(_)) => Ok(self.config.default),
            Err(e) => Err(e),
        }
    }

    /// Like [`configured_limit`](Self::configured_limit), but any failure falls back to the default.
    async fn resolve_limit(&self, key: &str) -> LimitConfig {
        match self.configured_limit(key).await {
            Ok(limit) if limit.is_valid() => limit,
            Ok(_) => self.config.default,
            Err(e) => {
                tracing::warn!(ip = %key, error = %e, "Settings lookup failed, using default limit");
                self.config.default
            }
        }
    }

    /// Drop the bucket for `key` so the next request re-reads its config.
    pub async fn clear_bucket(&self, key: &str) {
        let mut buckets = self.buckets.lock().await;
        if buckets.remove(key).is_some() {
            tracing::info!(ip = %key, "Bucket cleared");
        }
        metrics::record_bucket_count(buckets.len());
    }

    /// Top up every bucket, then evict those idle past the expiration window.
    pub async fn refill_and_evict(&self, now: Instant) -> RefillReport {
        let expiration = self.config.bucket_expiration();
        let policy = self.config.eviction;
        let mut buckets = self.buckets.lock().await;

        let refilled = buckets.len();
        for bucket in buckets.values_mut() {
            bucket.refill(now);
        }

        buckets.retain(|key, bucket| {
            let keep = bucket.idle_for(policy, now) <= expiration;
            if !keep {
                tracing::debug!(ip = %key, "Removing expired bucket");
            }
            keep
        });

        let report = RefillReport {
            refilled,
            evicted: refilled - buckets.len(),
        };
        metrics::record_bucket_count(buckets.len());
        report
    }

    /// Run the refill loop until shutdown. Does nothing when disabled.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Rate limiter disabled");
            return;
        }

        tracing::info!(
            refill_interval = ?self.config.refill_interval(),
            bucket_expiration = ?self.config.bucket_expiration(),
            eviction = ?self.config.eviction,
            "Rate limiter refill loop starting"
        );

        let period = self.config.refill_interval();
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Rate limiter received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.refill_and_evict(Instant::now()).await;
                    tracing::trace!(refilled = report.refilled, evicted = report.evicted, "Refill cycle complete");
                }
            }
        }
    }

    /// Tokens currently held for `key`, if it has a bucket.
    pub async fn tokens(&self, key: &str) -> Option<f64> {
        self.buckets.lock().await.get(key).map(TokenBucket::tokens)
    }

    /// Limit in effect for the in-memory bucket of `key`.
    pub async fn bucket_limit(&self, key: &str) -> Option<LimitConfig> {
        self.buckets.lock().await.get(key).map(TokenBucket::config)
    }

    pub async fn bucket_count(&self) -> usize {
        self.buckets.lock().await.len()
    }
}
