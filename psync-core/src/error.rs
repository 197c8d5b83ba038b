//! Error types for psync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// Neither an inline token nor the named environment variable was set.
    #[error("no {service} token configured; set `{env}` or `{service}.token`")]
    MissingCredential { service: &'static str, env: String },

    /// The file parsed but describes an unusable setup.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.psync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}
