//! BitcoinHub library
//!
//! Market and macro data resources, each served from a TTL cache and
//! resolved through an ordered chain of upstream sources with a static
//! fallback. The binary in `main.rs` is a thin shell over `Dashboard`.

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod fetch;
pub mod server;
pub mod service;
pub mod telemetry;

pub use error::AppError;
pub use service::{Dashboard, ResourceKind};
