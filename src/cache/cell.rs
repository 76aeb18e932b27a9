//! Single-slot in-memory cache with a time-to-live
//!
//! Each logical resource owns exactly one `CacheCell`. Staleness is checked
//! lazily on read; nothing sweeps expired entries in the background.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

use super::clock::{Clock, SystemClock};

/// A cached value with the moment it was stored
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    /// The cached data
    pub value: T,
    /// When the data was cached
    pub fetched_at: DateTime<Utc>,
}

/// Result of peeking at a cell, including freshness metadata
#[derive(Debug, Clone, PartialEq)]
pub struct CachedData<T> {
    /// The cached data
    pub data: T,
    /// When the data was originally cached
    pub cached_at: DateTime<Utc>,
    /// Whether the entry has outlived its TTL
    pub is_expired: bool,
}

/// Returns true when `entry` exists and is younger than `ttl` at `now`
///
/// An entry stamped in the future (clock skew) counts as fresh.
pub fn is_fresh<T>(entry: Option<&CacheEntry<T>>, ttl: TimeDelta, now: DateTime<Utc>) -> bool {
    match entry {
        Some(entry) => now.signed_duration_since(entry.fetched_at) < ttl,
        None => false,
    }
}

/// Holds at most one value for one resource
#[derive(Debug)]
pub struct CacheCell<T> {
    slot: RwLock<Option<CacheEntry<T>>>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> CacheCell<T> {
    /// Creates an empty cell using the wall clock
    pub fn new(ttl: TimeDelta) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Creates an empty cell reading time from `clock`
    pub fn with_clock(ttl: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Returns the value if it is still fresh
    pub fn get(&self) -> Option<T> {
        let slot = self.slot.read();
        if is_fresh(slot.as_ref(), self.ttl, self.clock.now()) {
            slot.as_ref().map(|entry| entry.value.clone())
        } else {
            None
        }
    }

    /// Returns the stored value regardless of age, flagged with `is_expired`
    pub fn peek(&self) -> Option<CachedData<T>> {
        let slot = self.slot.read();
        let entry = slot.as_ref()?;
        Some(CachedData {
            data: entry.value.clone(),
            cached_at: entry.fetched_at,
            is_expired: !is_fresh(Some(entry), self.ttl, self.clock.now()),
        })
    }

    /// Stores `value`, stamped with the current time, replacing any previous entry
    pub fn set(&self, value: T) {
        let entry = CacheEntry {
            value,
            fetched_at: self.clock.now(),
        };
        *self.slot.write() = Some(entry);
    }

    /// Drops the stored entry so the next read misses
    pub fn clear(&self) {
        *self.slot.write() = None;
    }
}
