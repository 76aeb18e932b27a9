//! In-memory TTL caching for upstream responses
//!
//! Every resource owns a single `CacheCell` holding its last resolved value.
//! Freshness is decided by the pure `is_fresh` check against an injectable
//! `Clock`, so expiry can be exercised without sleeping.

mod cell;
mod clock;

pub use cell::{is_fresh, CacheCell, CacheEntry, CachedData};
pub use clock::{Clock, ManualClock, SystemClock};
