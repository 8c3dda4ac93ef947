//! Round-robin load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{backend::Backend, pool::BackendPool, LoadBalancer};

/// Round-robin selector.
/// Walks the pool's rotation, skipping dead backends, for at most one full cycle.
#[derive(Debug, Default)]
pub struct RoundRobin;

impl RoundRobin {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, pool: &BackendPool) -> Option<Arc<Backend>> {
        for _ in 0..pool.len() {
            match pool.next() {
                Some(backend) if backend.is_alive() => return Some(backend),
                Some(backend) => {
                    tracing::trace!(backend = %backend.address(), "Skipping dead backend");
                }
                None => break,
            }
        }
        None
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> BackendPool {
        BackendPool::from_urls((0..n).map(|i| format!("http://127.0.0.1:{}", 8080 + i))).unwrap()
    }

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let pool = pool(2);

        let s1 = lb.next_server(&pool).unwrap();
        assert_eq!(s1.address(), "http://127.0.0.1:8080");

        let s2 = lb.next_server(&pool).unwrap();
        assert_eq!(s2.address(), "http://127.0.0.1:8081");

        let s3 = lb.next_server(&pool).unwrap();
        assert_eq!(s3.address(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_single_live_backend_always_chosen() {
        let lb = RoundRobin::new();
        let pool = pool(4);
        for b in pool.backends() {
            b.set_alive(false);
        }
        pool.backends()[2].set_alive(true);

        // Shift the cursor to every starting position.
        for offset in 0..4 {
            for _ in 0..offset {
                pool.next();
            }
            let chosen = lb.next_server(&pool).unwrap();
            assert_eq!(chosen.address(), "http://127.0.0.1:8082");
        }
    }

    #[test]
    fn test_all_dead_gives_up_after_one_cycle() {
        let lb = RoundRobin::new();
        let pool = pool(3);
        for b in pool.backends() {
            b.set_alive(false);
        }
        assert!(lb.next_server(&pool).is_none());

        // Exactly one cycle was consumed, so the rotation is back where it started.
        pool.backends()[0].set_alive(true);
        pool.backends()[1].set_alive(true);
        assert_eq!(lb.next_server(&pool).unwrap().address(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_empty_pool() {
        let lb = RoundRobin::new();
        assert!(lb.next_server(&BackendPool::new(Vec::new())).is_none());
    }
}
