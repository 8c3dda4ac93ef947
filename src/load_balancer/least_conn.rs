//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{backend::Backend, pool::BackendPool, LoadBalancer};

/// Least connections selector.
/// Selects the live backend with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, pool: &BackendPool) -> Option<Arc<Backend>> {
        pool.least_loaded()
    }

    fn name(&self) -> &'static str {
        "least-connections"
    }
}
