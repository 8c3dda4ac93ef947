//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request admitted by the rate limiter
//!     → pool.rs (BackendManager asks its strategy)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through backends, skip dead ones)
//!         - least_conn.rs (pick live backend with fewest connections)
//!     → backend.rs (connection guard held while the request is forwarded)
//!     → Return guard or "unavailable"
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless; the pool owns the cursor and counters
//! - Strategy chosen once at startup from configuration
//! - Dead backends excluded from selection

use std::fmt::Debug;
use std::sync::Arc;

use crate::config::BalancingMethod;

pub mod backend;
pub mod least_conn;
pub mod pool;
pub mod round_robin;

pub use backend::{Backend, BackendConnectionGuard};
pub use least_conn::LeastConnections;
pub use pool::{BackendManager, BackendPool};
pub use round_robin::RoundRobin;

/// A backend selection policy.
pub trait LoadBalancer: Debug + Send + Sync {
    /// Pick a live backend, or `None` when the pool is exhausted.
    fn next_server(&self, pool: &BackendPool) -> Option<Arc<Backend>>;

    fn name(&self) -> &'static str;
}

/// Build the strategy for a configured balancing method.
pub fn strategy_for(method: BalancingMethod) -> Box<dyn LoadBalancer> {
    match method {
        BalancingMethod::RoundRobin => Box::new(RoundRobin::new()),
        BalancingMethod::LeastConnections => Box::new(LeastConnections::new()),
    }
}
