//! Errors surfaced at the process edges
//!
//! Resource handlers never fail (they fall back instead), so `AppError`
//! only covers startup and serving.

use thiserror::Error;

use crate::cli::CliError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Cli(#[from] CliError),

    #[error("failed to install tracing subscriber: {0}")]
    Telemetry(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}
