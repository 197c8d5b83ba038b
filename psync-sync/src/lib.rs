//! # psync-sync
//!
//! Pass orchestration: fetch, correlate, reconcile, apply, record.
//!
//! Call [`pipeline::run`] with a [`SyncContext`] to reconcile every mapped
//! group (or a single one). Each group is isolated: a failure while fetching
//! or mutating one group is recorded in its [`GroupReport`] and the pass moves
//! on to the next group.

pub mod apply;
pub mod error;
pub mod pipeline;
pub mod report_store;

pub use apply::MutationResult;
pub use error::SyncError;
pub use pipeline::{PassReport, SyncContext, SyncScope};
pub use report_store::GroupReport;
