//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and backend URLs.
//! Every problem is reported, not just the first one.

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("pool.backends must contain at least one backend")]
    NoBackends,
    #[error("backend `{url}` is not a valid URL: {reason}")]
    InvalidBackendUrl { url: String, reason: String },
    #[error("backend `{0}` must use the http scheme")]
    UnsupportedScheme(String),
    #[error("health_check.endpoint must start with '/'")]
    InvalidHealthEndpoint,
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("rate_limit.default must have positive max_tokens and refill_rate")]
    InvalidDefaultLimit,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.pool.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }
    for raw in &config.pool.backends {
        if let Err(e) = check_backend_url(raw) {
            errors.push(e);
        }
    }

    let health = &config.health_check;
    if !health.endpoint.starts_with('/') {
        errors.push(ValidationError::InvalidHealthEndpoint);
    }
    if health.interval_secs == 0 {
        errors.push(ValidationError::ZeroDuration("health_check.interval_secs"));
    }
    if health.timeout_secs == 0 {
        errors.push(ValidationError::ZeroDuration("health_check.timeout_secs"));
    }

    let limits = &config.rate_limit;
    if limits.refill_interval_ms == 0 {
        errors.push(ValidationError::ZeroDuration("rate_limit.refill_interval_ms"));
    }
    if limits.bucket_expiration_secs == 0 {
        errors.push(ValidationError::ZeroDuration("rate_limit.bucket_expiration_secs"));
    }
    if !limits.default.is_valid() {
        errors.push(ValidationError::InvalidDefaultLimit);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroDuration("timeouts.request_secs"));
    }
    if config.timeouts.shutdown_grace_secs == 0 {
        errors.push(ValidationError::ZeroDuration("timeouts.shutdown_grace_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_backend_url(raw: &str) -> Result<(), ValidationError> {
    let url = Url::parse(raw).map_err(|e| ValidationError::InvalidBackendUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" {
        return Err(ValidationError::UnsupportedScheme(raw.to_string()));
    }
    if url.host_str().is_none() {
        return Err(ValidationError::InvalidBackendUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(())
}
