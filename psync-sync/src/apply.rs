//! Plan application.
//!
//! Removals run before additions. The first failing mutation stops the
//! group: nothing after it is attempted, and everything before it is kept in
//! the outcome so the report shows exactly what changed.

use serde::{Deserialize, Serialize};

use psync_core::DownstreamAccount;
use psync_gateway::{AccessGateway, GatewayError};
use psync_reconcile::ReconciliationPlan;

// ---------------------------------------------------------------------------
// Mutation result
// ---------------------------------------------------------------------------

/// Outcome of an individual membership mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MutationResult {
    /// Account was granted the plan's level.
    Added { account: DownstreamAccount },
    /// Account was removed from the access group.
    Removed { account: DownstreamAccount },
    /// `--dry-run` mode: the account *would* have been granted.
    WouldAdd { account: DownstreamAccount },
    /// `--dry-run` mode: the account *would* have been removed.
    WouldRemove { account: DownstreamAccount },
}

impl MutationResult {
    pub fn account(&self) -> &DownstreamAccount {
        match self {
            MutationResult::Added { account }
            | MutationResult::Removed { account }
            | MutationResult::WouldAdd { account }
            | MutationResult::WouldRemove { account } => account,
        }
    }

    pub fn is_addition(&self) -> bool {
        matches!(
            self,
            MutationResult::Added { .. } | MutationResult::WouldAdd { .. }
        )
    }
}

/// Mutations performed for one group, and the failure that stopped it, if any.
#[derive(Debug)]
pub struct ApplyOutcome {
    pub mutations: Vec<MutationResult>,
    pub failure: Option<GatewayError>,
}

// ---------------------------------------------------------------------------
// apply_plan
// ---------------------------------------------------------------------------

/// Apply `plan` to access group `group_id`.
///
/// In dry-run mode no gateway mutation is called.
pub fn apply_plan(
    access: &dyn AccessGateway,
    group_id: u64,
    plan: &ReconciliationPlan,
    dry_run: bool,
) -> ApplyOutcome {
    let mut mutations = Vec::new();

    for account in &plan.remove.accounts {
        if dry_run {
            tracing::info!(account = %account.username, "[dry-run] would remove");
            mutations.push(MutationResult::WouldRemove {
                account: account.clone(),
            });
            continue;
        }
        if let Err(err) = access.remove_member(group_id, account.id) {
            tracing::error!(account = %account.username, error = %err, "remove failed");
            return ApplyOutcome {
                mutations,
                failure: Some(err),
            };
        }
        mutations.push(MutationResult::Removed {
            account: account.clone(),
        });
    }

    for account in &plan.add.accounts {
        if dry_run {
            tracing::info!(
                account = %account.username,
                level = %plan.add.level,
                "[dry-run] would add"
            );
            mutations.push(MutationResult::WouldAdd {
                account: account.clone(),
            });
            continue;
        }
        if let Err(err) = access.add_member(group_id, account.id, plan.add.level) {
            tracing::error!(account = %account.username, error = %err, "add failed");
            return ApplyOutcome {
                mutations,
                failure: Some(err),
            };
        }
        mutations.push(MutationResult::Added {
            account: account.clone(),
        });
    }

    ApplyOutcome {
        mutations,
        failure: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
