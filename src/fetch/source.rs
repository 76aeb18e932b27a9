//! Upstream source adapters and their failure taxonomy

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Timeout applied when a source does not pick its own
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors a single source attempt can end with
///
/// None of these reach callers of a resource; the fallback chain logs them
/// and moves on to the next source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure (connect, TLS, reset)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The attempt exceeded the source's timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream answered with a non-2xx status
    #[error("Upstream returned status {0}")]
    Status(StatusCode),

    /// A required API key is not configured
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    /// Body was not the JSON we expected
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Body decoded but is missing fields or carries a sentinel value
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl SourceError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidPayload(reason.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Http(_) | Self::Timeout(_) | Self::Status(_) | Self::MissingCredential(_) => {
                FailureKind::Transient
            }
            Self::Decode(_) | Self::InvalidPayload(_) => FailureKind::InvalidPayload,
        }
    }
}

/// Coarse class of a source failure, used for log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network error, timeout, non-2xx or missing credential
    Transient,
    /// The call succeeded but the payload is unusable
    InvalidPayload,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => f.write_str("transient"),
            Self::InvalidPayload => f.write_str("invalid_payload"),
        }
    }
}

/// One upstream provider able to produce a `T`
///
/// Implementations issue their request(s) and map the provider's response
/// into `T`. Anything short of a complete, meaningful value is an error.
#[async_trait]
pub trait Source<T>: Send + Sync {
    /// Attribution attached to values this source produces
    fn name(&self) -> &str;

    fn timeout(&self) -> Duration {
        DEFAULT_SOURCE_TIMEOUT
    }

    async fn fetch(&self) -> Result<T, SourceError>;
}

/// Whether a value came from a live source or the static fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Live,
    Fallback,
}

/// A resolved value with its attribution
///
/// Callers get the same shape whether the value came from cache, a live
/// source or the fallback constant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sourced<T> {
    #[serde(flatten)]
    pub data: T,
    /// Name of the source (or fallback label) that produced `data`
    pub source: String,
    /// When `data` was resolved
    pub last_updated: DateTime<Utc>,
    pub origin: Origin,
}

impl<T> Sourced<T> {
    pub fn live(data: T, source: impl Into<String>, last_updated: DateTime<Utc>) -> Self {
        Self {
            data,
            source: source.into(),
            last_updated,
            origin: Origin::Live,
        }
    }

    pub fn fallback(data: T, label: impl Into<String>, last_updated: DateTime<Utc>) -> Self {
        Self {
            data,
            source: label.into(),
            last_updated,
            origin: Origin::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == Origin::Fallback
    }
}
