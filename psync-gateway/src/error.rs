//! Error types for psync-gateway.

use thiserror::Error;

/// All errors that can arise while talking to the directory or access system.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    /// Connection, TLS, DNS, or timeout failure.
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// Response body did not match the expected JSON shape.
    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// Still throttled after every allowed retry.
    #[error("rate limited by {url} after {attempts} attempts")]
    RateLimited { url: String, attempts: u32 },

    #[error("group '{0}' not found")]
    GroupNotFound(String),

    /// More than one group matched the name exactly.
    #[error("group name '{name}' is ambiguous: {}", candidates.join(", "))]
    AmbiguousGroup {
        name: String,
        candidates: Vec<String>,
    },
}
