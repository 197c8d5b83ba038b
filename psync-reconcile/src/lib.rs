//! # psync-reconcile
//!
//! Pure membership reconciliation. No I/O, no configuration, no shared state.
//!
//! [`correlate`] joins accounts across systems by federated identity;
//! [`engine`] turns one membership snapshot into add and remove plans.

pub mod correlate;
pub mod engine;

pub use engine::{AddPlan, MembershipSnapshot, ReconciliationEngine, ReconciliationPlan, RemovePlan};
