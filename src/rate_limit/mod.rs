//! Rate limiting subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming proxied request:
//!     → middleware.rs (derive client key from X-Forwarded-For / peer IP)
//!     → limiter.rs (find or create bucket, take one token)
//!         → repository.rs on first sight of a key (stored override or default)
//!     → admitted: continue to load balancer
//!     → rejected: 429 {code, message}
//!
//! Background:
//!     refill loop tick → refill every bucket → evict idle ones
//! ```
//!
//! # Design Decisions
//! - Tokens are only added by the refill loop, never on the request path
//! - Store failures fall back to the default limit instead of failing requests
//! - Changing or deleting an override clears the in-memory bucket

pub mod bucket;
pub mod limiter;
pub mod middleware;
pub mod repository;

pub use bucket::{LimitConfig, TokenBucket};
pub use limiter::{RateLimiter, RefillReport};
pub use middleware::{client_key, rate_limit_middleware};
pub use repository::{InMemorySettingsRepository, RepositoryError, SettingsRepository};
