//! Domain error types for the dispatch layer.
//!
//! Every variant carries structured context fields so a failure can be
//! understood from the variant alone, without parsing message strings.
//!
//! main.rs is the ONLY module allowed to use anyhow::Result (process boundary).
//! All application code returns Result<T, DispatchError>.

use thiserror::Error;

/// Dispatch domain errors
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Configuration error (environment variable missing or invalid)
    #[error("configuration error: {0}")]
    Config(String),

    /// A shard-scoped parameter key does not have the `shard.<name>.<key>` shape
    #[error("malformed shard-scoped parameter '{key}' for shard {shard}")]
    MalformedScopedParam { shard: String, key: String },

    /// Building the pooled HTTP client for an endpoint failed
    #[error("failed to build HTTP client for endpoint '{endpoint}'")]
    ClientBuild {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The outbound shard request failed at the transport level
    #[error("shard request to {shard} failed")]
    Request {
        shard: String,
        #[source]
        source: reqwest::Error,
    },

    /// An idle-connection sweep failed
    #[error("idle-connection sweep failed: {detail}")]
    Sweep { detail: String },
}

impl DispatchError {
    /// Returns a static label string suitable for Prometheus metrics.
    ///
    /// Used as the `error_type` label on `transport_errors_total`,
    /// enabling per-error-type monitoring and alerting.
    pub fn error_type_label(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::MalformedScopedParam { .. } => "param_rewrite",
            Self::ClientBuild { .. } => "client_build",
            Self::Request { .. } => "request",
            Self::Sweep { .. } => "sweep",
        }
    }
}
