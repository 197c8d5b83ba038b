//! Reconciliation engine — one membership snapshot in, one plan out.
//!
//! ## Policy
//!
//! 1. Add = (directory-active ∩ entitlement population) ∖ current access.
//!    Directory membership alone never grants access.
//! 2. Remove = directory-deprovisioned ∩ current access, whether or not the
//!    entitlement population still lists the identity.
//! 3. An identity both active and deprovisioned upstream is treated as
//!    deprovisioned: never added, removed if present.
//! 4. Protected members (high privilege or inherited) count as present for
//!    step 1 and are never part of step 2.
//! 5. Everything else is left alone, so an applied plan reconciles to empty.
//!
//! Existing grants are never re-levelled.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use psync_core::{AccessLevel, AccountId, DownstreamAccount, FederatedId};

use crate::correlate;

/// The four membership views of one directory-group/access-group pair, taken
/// from a single fetch so adds and removes see the same state.
#[derive(Debug, Clone, Copy)]
pub struct MembershipSnapshot<'a> {
    pub upstream_eligible: &'a BTreeSet<FederatedId>,
    pub upstream_deprovisioned: &'a BTreeSet<FederatedId>,
    pub entitlement_set: &'a [DownstreamAccount],
    /// Direct members below the privilege ceiling, already correlated with
    /// [`correlate::attach_identities`]. The only accounts a plan may remove.
    pub access_group_members: &'a [DownstreamAccount],
    /// Members outside reconciliation: at or above the ceiling, or inherited
    /// from a parent group. They count as present and are never removed.
    pub protected_members: &'a [DownstreamAccount],
}

/// Accounts to insert into the access group at `level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPlan {
    pub level: AccessLevel,
    pub accounts: Vec<DownstreamAccount>,
}

/// Accounts to remove from the access group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovePlan {
    pub accounts: Vec<DownstreamAccount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    pub add: AddPlan,
    pub remove: RemovePlan,
}

impl ReconciliationPlan {
    pub fn is_empty(&self) -> bool {
        self.add.accounts.is_empty() && self.remove.accounts.is_empty()
    }
}

/// Stateless engine bound to the single grant level it hands out.
#[derive(Debug, Clone, Copy)]
pub struct ReconciliationEngine {
    grant_level: AccessLevel,
}

impl ReconciliationEngine {
    pub fn new(grant_level: AccessLevel) -> Self {
        Self { grant_level }
    }

    /// Compute the add and remove plans for one snapshot.
    ///
    /// Total over its input: unmatchable accounts are skipped, never reported.
    pub fn reconcile(&self, snapshot: &MembershipSnapshot<'_>) -> ReconciliationPlan {
        let entitlement_ids = correlate::federated_ids(snapshot.entitlement_set);
        let eligible: Vec<FederatedId> =
            correlate::intersect(snapshot.upstream_eligible, &entitlement_ids)
                .into_iter()
                .filter(|id| !snapshot.upstream_deprovisioned.contains(id))
                .collect();

        let current = correlate::federated_ids(snapshot.access_group_members);
        let mut held = current.clone();
        held.extend(correlate::federated_ids(snapshot.protected_members));

        let to_add = correlate::difference(&eligible, &held);
        // An access-group member whose identity could not be resolved is still
        // a member; adding it again would be rejected by the access system.
        let present: HashSet<AccountId> = snapshot
            .access_group_members
            .iter()
            .chain(snapshot.protected_members)
            .map(|m| m.id)
            .collect();
        let mut seen = HashSet::new();
        let add_accounts = correlate::matching_accounts(&to_add, snapshot.entitlement_set)
            .into_iter()
            .filter(|a| !present.contains(&a.id) && seen.insert(a.id))
            .cloned()
            .collect();

        let to_remove = correlate::intersect(snapshot.upstream_deprovisioned, &current);
        let remove_accounts =
            correlate::matching_accounts(&to_remove, snapshot.access_group_members)
                .into_iter()
                .cloned()
                .collect();

        ReconciliationPlan {
            add: AddPlan {
                level: self.grant_level,
                accounts: add_accounts,
            },
            remove: RemovePlan {
                accounts: remove_accounts,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(raw: &[&str]) -> BTreeSet<FederatedId> {
        raw.iter().map(|s| FederatedId::from(*s)).collect()
    }

    fn account(id: u64, fed: &str) -> DownstreamAccount {
        DownstreamAccount::new(id, format!("acct{id}"), Some(fed), AccessLevel::Guest)
    }

    fn ids(accounts: &[DownstreamAccount]) -> Vec<u64> {
        accounts.iter().map(|a| a.id.0).collect()
    }

    #[test]
    fn grants_every_entitled_directory_member() {
        let eligible = set(&["u1", "u2"]);
        let deprovisioned = set(&[]);
        let entitlement = vec![account(1, "u1"), account(2, "u2"), account(3, "u3")];
        let plan = ReconciliationEngine::new(AccessLevel::Developer).reconcile(
            &MembershipSnapshot {
                upstream_eligible: &eligible,
                upstream_deprovisioned: &deprovisioned,
                entitlement_set: &entitlement,
                access_group_members: &[],
                protected_members: &[],
            },
        );
        assert_eq!(ids(&plan.add.accounts), vec![1, 2]);
        assert_eq!(plan.add.level, AccessLevel::Developer);
        assert!(plan.remove.accounts.is_empty());
    }

    #[test]
    fn adds_eligible_and_removes_deprovisioned() {
        let eligible = set(&["u1"]);
        let deprovisioned = set(&["u2"]);
        let entitlement = vec![account(1, "u1"), account(2, "u2")];
        let access = vec![account(102, "u2")];
        let plan = ReconciliationEngine::new(AccessLevel::Developer).reconcile(
            &MembershipSnapshot {
                upstream_eligible: &eligible,
                upstream_deprovisioned: &deprovisioned,
                entitlement_set: &entitlement,
                access_group_members: &access,
                protected_members: &[],
            },
        );
        assert_eq!(ids(&plan.add.accounts), vec![1]);
        assert_eq!(ids(&plan.remove.accounts), vec![102]);
    }

    #[test]
    fn converged_group_yields_empty_plan() {
        let eligible = set(&["u1", "u2"]);
        let deprovisioned = set(&["u9"]);
        let entitlement = vec![account(1, "u1"), account(2, "u2")];
        let access = entitlement.clone();
        let plan = ReconciliationEngine::new(AccessLevel::Developer).reconcile(
            &MembershipSnapshot {
                upstream_eligible: &eligible,
                upstream_deprovisioned: &deprovisioned,
                entitlement_set: &entitlement,
                access_group_members: &access,
                protected_members: &[],
            },
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn member_without_resolved_identity_is_not_re_added() {
        let eligible = set(&["u1"]);
        let deprovisioned = set(&[]);
        let entitlement = vec![account(1, "u1")];
        let access = vec![DownstreamAccount::new(1u64, "acct1", None, AccessLevel::Guest)];
        let plan = ReconciliationEngine::new(AccessLevel::Developer).reconcile(
            &MembershipSnapshot {
                upstream_eligible: &eligible,
                upstream_deprovisioned: &deprovisioned,
                entitlement_set: &entitlement,
                access_group_members: &access,
                protected_members: &[],
            },
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn protected_members_are_present_but_never_removed() {
        let eligible = set(&["u1"]);
        let deprovisioned = set(&["u2"]);
        let entitlement = vec![account(1, "u1"), account(2, "u2")];
        let protected = vec![
            DownstreamAccount::new(1u64, "owner", Some("u1"), AccessLevel::Owner),
            DownstreamAccount::new(2u64, "parent-dev", Some("u2"), AccessLevel::Developer),
        ];
        let plan = ReconciliationEngine::new(AccessLevel::Developer).reconcile(
            &MembershipSnapshot {
                upstream_eligible: &eligible,
                upstream_deprovisioned: &deprovisioned,
                entitlement_set: &entitlement,
                access_group_members: &[],
                protected_members: &protected,
            },
        );
        assert!(plan.is_empty(), "got: {plan:?}");
    }

    #[test]
    fn plan_serializes_for_reports() {
        let plan = ReconciliationPlan {
            add: AddPlan {
                level: AccessLevel::Developer,
                accounts: vec![account(1, "u1")],
            },
            remove: RemovePlan::default(),
        };
        let json = serde_json::to_value(&plan).expect("serialize");
        assert_eq!(json["add"]["level"], "developer");
        assert_eq!(json["add"]["accounts"][0]["federated_id"], "u1");
    }
}
