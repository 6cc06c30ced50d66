//! A bounded, TTL-evicting cache with max-size eviction, used to front the
//! blacklist oracle's fetched entry list (§4.7).
//!
//! The oracle only ever caches a single key (the whole fetched list keyed
//! under a fixed slot), so capacity pressure isn't the concern here — the
//! TTL is what keeps the cached list from going stale between oracle polls.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Bounded cache mapping a 32-byte key to a value, with TTL and capacity limits.
pub struct BoundedPendingCache<T> {
    map: HashMap<[u8; 32], (T, Instant)>,
    max_size: usize,
    ttl: Duration,
}

impl<T> BoundedPendingCache<T> {
    pub fn new(max_size: usize, ttl_secs: u64) -> Self {
        Self {
            map: HashMap::new(),
            max_size,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    #[allow(dead_code)]
    pub fn get(&self, hash: &[u8; 32]) -> Option<&T> {
        self.map
            .get(hash)
            .filter(|(_, t)| t.elapsed() < self.ttl)
            .map(|(v, _)| v)
    }

    pub fn insert(&mut self, hash: [u8; 32], value: T) {
        let now = Instant::now();
        self.map
            .retain(|_, (_, t)| now.duration_since(*t) < self.ttl);
        while self.map.len() >= self.max_size && !self.map.is_empty() {
            let oldest = self
                .map
                .iter()
                .min_by_key(|(_, (_, t))| *t)
                .map(|(h, _)| *h);
            if let Some(h) = oldest {
                self.map.remove(&h);
            } else {
                break;
            }
        }
        self.map.insert(hash, (value, now));
    }

    pub fn remove(&mut self, hash: &[u8; 32]) -> Option<T> {
        self.map.remove(hash).map(|(v, _)| v)
    }

    /// Iterate over entries (hash, value) for processing.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8; 32], &T)> {
        self.map.iter().map(|(h, (v, _))| (h, v))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}
