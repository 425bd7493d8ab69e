use std::collections::HashMap;
use std::time::{Duration, Instant};

use contrapart_core::Transaction;

#[derive(Debug, Clone)]
struct CacheEntry {
    transactions: Vec<Transaction>,
    fetched_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.fetched_at.elapsed() > self.ttl
    }
}

/// Keyed TTL cache over fetched transaction sequences. An empty sequence is
/// never stored: a transient "no data" response must not mask later reads
/// for the rest of the TTL window.
#[derive(Debug, Default)]
pub struct TransactionCache {
    entries: HashMap<String, CacheEntry>,
}

impl TransactionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached sequence, dropping the entry when its TTL has
    /// elapsed.
    pub fn get(&mut self, key: &str) -> Option<Vec<Transaction>> {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(entry.transactions.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&mut self, key: &str, transactions: Vec<Transaction>, ttl: Duration) {
        if transactions.is_empty() {
            return;
        }
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                transactions,
                fetched_at: Instant::now(),
                ttl,
            },
        );
    }

    pub fn flush(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
