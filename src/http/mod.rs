//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (X-Request-ID set/propagated)
//!     → rate limit middleware (proxied routes only)
//!     → proxy.rs (load balancer picks backend, request forwarded)
//!     → response.rs (our own errors as {code, message})
//!     → Send to client
//! ```

pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use proxy::{ProxyError, ReverseProxy};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{AppState, HttpServer, ServerError};
