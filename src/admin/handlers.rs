use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::rate_limit::LimitConfig;

/// Body of `POST /api/ratelimit/config`.
///
/// Missing fields default to empty/zero so they fail validation with a
/// descriptive message instead of a generic decode error.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SetConfigRequest {
    pub ip: String,
    pub max_tokens: i64,
    pub refill_rate: i64,
}

/// Client IP as used for rate limit keys, or `None` when blank.
fn normalize_ip(ip: &str) -> Option<&str> {
    Some(ip.trim()).filter(|ip| !ip.is_empty())
}

impl SetConfigRequest {
    /// Returns the normalized IP and the limit to store.
    pub fn validate(&self) -> Result<(String, LimitConfig), String> {
        let ip = normalize_ip(&self.ip).ok_or_else(|| "ip is required".to_string())?;
        if self.max_tokens <= 0 {
            return Err("max_tokens must be positive".into());
        }
        if self.refill_rate <= 0 {
            return Err("refill_rate must be positive".into());
        }
        let max_tokens =
            u32::try_from(self.max_tokens).map_err(|_| "max_tokens is too large".to_string())?;
        let refill_rate =
            u32::try_from(self.refill_rate).map_err(|_| "refill_rate is too large".to_string())?;
        Ok((ip.to_string(), LimitConfig::new(max_tokens, refill_rate)))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigResponse {
    pub ip: String,
    pub max_tokens: u32,
    pub refill_rate: u32,
}

impl ConfigResponse {
    fn new(ip: impl Into<String>, limit: LimitConfig) -> Self {
        Self {
            ip: ip.into(),
            max_tokens: limit.max_tokens,
            refill_rate: limit.refill_rate,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub address: String,
    pub alive: bool,
    pub active_connections: usize,
}

#[derive(Debug, Serialize)]
pub struct PoolStatus {
    pub method: &'static str,
    pub backends: Vec<BackendStatus>,
}

pub async fn set_config(
    State(state): State<AppState>,
    body: Result<Json<SetConfigRequest>, JsonRejection>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let Json(request) = body.map_err(|e| {
        tracing::warn!(error = %e, "Invalid request body");
        ApiError::bad_request("Invalid request body")
    })?;

    let (ip, limit) = request.validate().map_err(|message| {
        tracing::warn!(ip = %request.ip, error = %message, "Invalid config request");
        ApiError::bad_request(message)
    })?;

    state.settings.set_config(&ip, limit).await.map_err(|e| {
        tracing::error!(ip = %ip, error = %e, "Failed to set config");
        ApiError::internal("Failed to set config")
    })?;

    state.limiter.clear_bucket(&ip).await;
    tracing::info!(ip = %ip, "Bucket cleared after setting new config");

    Ok(Json(ConfigResponse::new(ip, limit)))
}

pub async fn get_config(
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let ip = require_ip(ip)?;
    let limit = state.limiter.configured_limit(&ip).await.map_err(|e| {
        tracing::error!(ip = %ip, error = %e, "Failed to get config");
        ApiError::internal("Failed to get config")
    })?;
    Ok(Json(ConfigResponse::new(ip, limit)))
}

pub async fn delete_config(
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> Result<StatusCode, ApiError> {
    let ip = require_ip(ip)?;
    state.settings.delete_config(&ip).await.map_err(|e| {
        tracing::error!(ip = %ip, error = %e, "Failed to delete config");
        ApiError::internal("Failed to delete config")
    })?;
    state.limiter.clear_bucket(&ip).await;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET`/`DELETE` on the collection path without an IP.
pub async fn missing_ip() -> Response {
    ApiError::bad_request("IP is required").into_response()
}

fn require_ip(ip: String) -> Result<String, ApiError> {
    normalize_ip(&ip)
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("IP is required"))
}

pub async fn get_backends(State(state): State<AppState>) -> Json<PoolStatus> {
    let backends = state
        .backends
        .pool()
        .backends()
        .iter()
        .map(|b| BackendStatus {
            address: b.address().to_string(),
            alive: b.is_alive(),
            active_connections: b.active_connections(),
        })
        .collect();

    Json(PoolStatus {
        method: state.backends.strategy_name(),
        backends,
    })
}
