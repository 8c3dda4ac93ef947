//! Backend pool management.
//!
//! # Responsibilities
//! - Own the fixed, ordered list of backends
//! - Provide the strategy-neutral primitives (`next`, `least_loaded`)
//! - Pair the pool with the configured strategy and hand out connection guards

use std::sync::{Arc, Mutex, PoisonError};

use crate::config::BalancingMethod;
use crate::load_balancer::{
    backend::{Backend, BackendConnectionGuard},
    strategy_for, LoadBalancer,
};

/// An ordered, fixed-size set of backends.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
    /// Index served by the last `next()` call.
    cursor: Mutex<Option<usize>>,
}

impl BackendPool {
    pub fn new(backends: Vec<Backend>) -> Self {
        Self {
            backends: backends.into_iter().map(Arc::new).collect(),
            cursor: Mutex::new(None),
        }
    }

    /// Build a pool from backend URLs, failing on the first unparsable one.
    pub fn from_urls<I, S>(urls: I) -> Result<Self, (String, url::ParseError)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let backends = urls
            .into_iter()
            .map(|raw| Backend::parse(raw.as_ref()).map_err(|e| (raw.as_ref().to_string(), e)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(backends))
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Advance the rotation by one slot and return that backend, alive or not.
    ///
    /// Cursor advancement is serialized, so concurrent callers see a
    /// non-repeating sequence until wraparound.
    pub fn next(&self) -> Option<Arc<Backend>> {
        let len = self.backends.len();
        if len == 0 {
            return None;
        }

        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let index = match *cursor {
            Some(last) => (last + 1) % len,
            None => 0,
        };
        *cursor = Some(index);
        Some(self.backends[index].clone())
    }

    /// The live backend with the fewest active connections.
    /// Ties go to the first one in pool order.
    pub fn least_loaded(&self) -> Option<Arc<Backend>> {
        self.backends
            .iter()
            .filter(|b| b.is_alive())
            .min_by_key(|b| b.active_connections())
            .cloned()
    }
}

/// Wires a pool to the balancing strategy chosen at startup.
#[derive(Debug)]
pub struct BackendManager {
    pool: Arc<BackendPool>,
    strategy: Box<dyn LoadBalancer>,
}

impl BackendManager {
    pub fn new(pool: Arc<BackendPool>, method: BalancingMethod) -> Self {
        Self {
            pool,
            strategy: strategy_for(method),
        }
    }

    /// Select a live backend and count the request against it.
    /// Returns a guard that decrements the connection count on drop.
    pub fn get(&self) -> Option<BackendConnectionGuard> {
        match self.strategy.next_server(&self.pool) {
            Some(backend) => Some(backend.acquire()),
            None => {
                tracing::debug!(
                    strategy = self.strategy.name(),
                    backend_count = self.pool.len(),
                    "No live backends found in pool"
                );
                None
            }
        }
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }
}
