//! Fetch-with-fallback machinery shared by every resource
//!
//! A resource is described once by a `ResourceDescriptor` (TTL, ordered
//! sources, validator, fallback) and served through a `CachedResource`,
//! which checks its cache cell before running `fetch_with_fallback`.

mod chain;
mod resource;
mod source;

pub use chain::fetch_with_fallback;
pub use resource::{accept_any, CachedResource, Fallback, ResourceDescriptor, Validator};
pub use source::{FailureKind, Origin, Source, SourceError, Sourced, DEFAULT_SOURCE_TIMEOUT};
