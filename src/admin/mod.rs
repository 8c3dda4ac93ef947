//! Operator API.
//!
//! - `POST   /api/ratelimit/config`       store an override, clear the bucket
//! - `GET    /api/ratelimit/config/{ip}`  effective limit (stored or default)
//! - `DELETE /api/ratelimit/config/{ip}`  drop the override, clear the bucket
//! - `GET    /api/backends`               pool snapshot

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use self::handlers::*;
use crate::http::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/ratelimit/config", post(set_config))
        .route("/api/ratelimit/config/", get(missing_ip).delete(missing_ip))
        .route("/api/ratelimit/config/{ip}", get(get_config).delete(delete_config))
        .route("/api/backends", get(get_backends))
}
