//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, apply PORT override)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → handed to the server at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the backend list never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{finalize, load_config, read_config, ConfigError};
pub use schema::{
    BalancingMethod, EvictionPolicy, HealthCheckConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, PoolConfig, ProxyConfig, RateLimitConfig, TimeoutConfig,
};
