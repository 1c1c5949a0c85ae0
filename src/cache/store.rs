//! Bounded in-memory store with separate positive and negative TTLs.

use super::key::CacheKey;
use crate::config::TierConfig;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// A cached value: a real result, or the record of a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue<V> {
    Positive(V),
    Negative,
}

impl<V> CachedValue<V> {
    pub fn is_negative(&self) -> bool {
        matches!(self, CachedValue::Negative)
    }

    pub fn positive(self) -> Option<V> {
        match self {
            CachedValue::Positive(v) => Some(v),
            CachedValue::Negative => None,
        }
    }
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: CachedValue<V>,
    inserted_at: Instant,
    seq: u64,
}

#[derive(Debug)]
struct Entries<V> {
    map: HashMap<CacheKey, CacheEntry<V>>,
    /// Insertion sequence -> key; the first entry is the eviction candidate.
    order: BTreeMap<u64, CacheKey>,
    next_seq: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub hits: u64,
    pub negative_hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
}

impl StoreStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.negative_hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits + self.negative_hits) as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct AtomicStats {
    hits: AtomicU64,
    negative_hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
}

impl AtomicStats {
    fn to_stats(&self) -> StoreStats {
        StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            negative_hits: self.negative_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Key → value map with logical expiry and FIFO eviction.
///
/// - Lookups never extend an entry's lifetime and never remove anything.
/// - An entry is visible while its age is at most the TTL of its class.
/// - The store never holds more than `max_entries`; inserting a new key into a
///   full store evicts the entry inserted longest ago, expired or not.
pub struct TtlStore<V> {
    entries: RwLock<Entries<V>>,
    positive_ttl: Duration,
    negative_ttl: Duration,
    max_entries: usize,
    stats: AtomicStats,
}

impl<V: Clone> TtlStore<V> {
    pub fn new(config: &TierConfig) -> Self {
        Self {
            entries: RwLock::new(Entries {
                map: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
            }),
            positive_ttl: config.positive_ttl,
            negative_ttl: config.negative_ttl,
            max_entries: config.max_entries.max(1),
            stats: AtomicStats::default(),
        }
    }

    fn ttl_for(&self, value: &CachedValue<V>) -> Duration {
        match value {
            CachedValue::Positive(_) => self.positive_ttl,
            CachedValue::Negative => self.negative_ttl,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedValue<V>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let found = entries
            .map
            .get(key)
            .filter(|e| e.inserted_at.elapsed() <= self.ttl_for(&e.value))
            .map(|e| e.value.clone());
        match &found {
            Some(CachedValue::Positive(_)) => self.stats.hits.fetch_add(1, Ordering::Relaxed),
            Some(CachedValue::Negative) => self.stats.negative_hits.fetch_add(1, Ordering::Relaxed),
            None => self.stats.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    pub fn set(&self, key: CacheKey, value: CachedValue<V>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = entries.map.remove(&key) {
            entries.order.remove(&previous.seq);
        } else if entries.map.len() >= self.max_entries {
            if let Some((_, oldest)) = entries.order.pop_first() {
                entries.map.remove(&oldest);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        let seq = entries.next_seq;
        entries.next_seq += 1;
        entries.order.insert(seq, key.clone());
        entries.map.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                seq,
            },
        );
        self.stats.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_positive(&self, key: CacheKey, value: V) {
        self.set(key, CachedValue::Positive(value));
    }

    pub fn set_negative(&self, key: CacheKey) {
        self.set(key, CachedValue::Negative);
    }

    /// Physically drops logically expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let expired: Vec<(u64, CacheKey)> = entries
            .map
            .iter()
            .filter(|(_, e)| e.inserted_at.elapsed() > self.ttl_for(&e.value))
            .map(|(k, e)| (e.seq, k.clone()))
            .collect();
        for (seq, key) in &expired {
            entries.order.remove(seq);
            entries.map.remove(key);
        }
        expired.len()
    }

    /// Stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn stats(&self) -> StoreStats {
        self.stats.to_stats()
    }
}
