//! Resource descriptors and the cache-aware handler built on them

use chrono::TimeDelta;
use std::sync::Arc;
use tracing::{debug, info};

use super::chain::fetch_with_fallback;
use super::source::{Source, Sourced};
use crate::cache::{CacheCell, CachedData, Clock, SystemClock};

/// Extra acceptance check applied to every live value of a resource
pub type Validator<T> = fn(&T) -> Result<(), String>;

/// Validator that accepts everything
pub fn accept_any<T>(_: &T) -> Result<(), String> {
    Ok(())
}

/// Last-resort value for a resource
pub struct Fallback<T> {
    /// Attribution reported when the fallback is served
    pub label: &'static str,
    /// Builds the fallback value
    pub value: fn() -> T,
}

/// Static configuration for one resource
pub struct ResourceDescriptor<T> {
    pub name: &'static str,
    pub ttl: TimeDelta,
    /// Tried in order; first valid result wins
    pub sources: Vec<Box<dyn Source<T>>>,
    pub fallback: Fallback<T>,
    pub validator: Validator<T>,
}

impl<T> ResourceDescriptor<T> {
    pub fn new(name: &'static str, ttl: TimeDelta, fallback: Fallback<T>) -> Self {
        Self {
            name,
            ttl,
            sources: Vec::new(),
            fallback,
            validator: accept_any::<T>,
        }
    }

    /// Appends a source at the lowest priority so far
    pub fn source(mut self, source: impl Source<T> + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn validator(mut self, validator: Validator<T>) -> Self {
        self.validator = validator;
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }
}

/// A resource behind its own TTL cache cell
///
/// `get` answers from the cell while it is fresh; otherwise it runs the
/// fallback chain and stores whatever comes back, fallback values included,
/// so a failing upstream is not hit again until the TTL runs out.
pub struct CachedResource<T> {
    descriptor: ResourceDescriptor<T>,
    cell: CacheCell<Sourced<T>>,
    clock: Arc<dyn Clock>,
}

impl<T> CachedResource<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(descriptor: ResourceDescriptor<T>) -> Self {
        Self::with_clock(descriptor, Arc::new(SystemClock))
    }

    pub fn with_clock(descriptor: ResourceDescriptor<T>, clock: Arc<dyn Clock>) -> Self {
        let cell = CacheCell::with_clock(descriptor.ttl, clock.clone());
        Self {
            descriptor,
            cell,
            clock,
        }
    }

    pub fn descriptor(&self) -> &ResourceDescriptor<T> {
        &self.descriptor
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Returns the cached value, resolving it first on a miss
    pub async fn get(&self) -> Sourced<T> {
        if let Some(hit) = self.cell.get() {
            debug!(resource = self.descriptor.name, source = %hit.source, "cache hit");
            return hit;
        }

        debug!(resource = self.descriptor.name, "cache miss");
        let resolved = fetch_with_fallback(&self.descriptor, self.clock.as_ref()).await;
        self.cell.set(resolved.clone());
        resolved
    }

    /// Invalidates the cell; the next `get` goes upstream
    pub fn clear(&self) {
        self.cell.clear();
        info!(resource = self.descriptor.name, "cache cleared");
    }

    /// Clears the cell and resolves a new value
    pub async fn refresh(&self) -> Sourced<T> {
        self.clear();
        self.get().await
    }

    /// Current cell contents, expired or not
    pub fn cached(&self) -> Option<CachedData<Sourced<T>>> {
        self.cell.peek()
    }
}
