//! HTTP load balancer library.
//!
//! A reverse proxy that spreads requests over a fixed pool of backends
//! (round-robin or least-connections), probes them periodically, and
//! rate limits clients with per-IP token buckets.

// Core subsystems
pub mod config;
pub mod http;

// Traffic management
pub mod health;
pub mod load_balancer;
pub mod rate_limit;

// Operator surface
pub mod admin;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
