//! Error types for psync-sync.

use std::path::PathBuf;

use thiserror::Error;

use psync_gateway::GatewayError;

/// Errors that abort a whole pass.
///
/// Failures scoped to one group never surface here; they are recorded in that
/// group's report instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A fetch shared by every group of the pass failed.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// `--group` named a directory group the pass did not find.
    #[error("directory group '{0}' not found or not mapped")]
    UnknownGroup(String),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (report store).
    #[error("report store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
