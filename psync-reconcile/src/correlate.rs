//! Identity correlation over federated identifiers.
//!
//! Account ids from the directory and the access system are never compared
//! with each other; every join goes through [`FederatedId`]. Accounts without
//! one are unmatchable and drop out of every result.
//!
//! All functions build a presence index from the reference side and walk the
//! probed side once, so output order follows the probed input.

use std::collections::{HashMap, HashSet};

use psync_core::{AccountId, DownstreamAccount, FederatedId};

/// Federated ids of `accounts`, in input order, without duplicates.
pub fn federated_ids(accounts: &[DownstreamAccount]) -> Vec<FederatedId> {
    let mut seen = HashSet::new();
    accounts
        .iter()
        .filter_map(|a| a.federated_id.as_ref())
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect()
}

/// Elements of `probe` that are also in `reference`, in `probe` order.
pub fn intersect<'a, R>(reference: R, probe: &[FederatedId]) -> Vec<FederatedId>
where
    R: IntoIterator<Item = &'a FederatedId>,
{
    let index: HashSet<&FederatedId> = reference.into_iter().collect();
    probe
        .iter()
        .filter(|id| index.contains(id))
        .cloned()
        .collect()
}

/// `a ∖ b`, in `a` order.
pub fn difference(a: &[FederatedId], b: &[FederatedId]) -> Vec<FederatedId> {
    let index: HashSet<&FederatedId> = b.iter().collect();
    a.iter().filter(|id| !index.contains(id)).cloned().collect()
}

/// Accounts whose federated id is in `ids`, in `accounts` order.
pub fn matching_accounts<'a>(
    ids: &[FederatedId],
    accounts: &'a [DownstreamAccount],
) -> Vec<&'a DownstreamAccount> {
    let index: HashSet<&FederatedId> = ids.iter().collect();
    accounts
        .iter()
        .filter(|a| a.federated_id.as_ref().is_some_and(|id| index.contains(id)))
        .collect()
}

/// Fill in missing federated ids from `reference`, joined on account id.
///
/// Group member listings only expose the SAML identity on the group that owns
/// the SAML link, so members of other groups are correlated through the
/// entitlement population. Members that already carry an identity keep it.
pub fn attach_identities(
    members: &[DownstreamAccount],
    reference: &[DownstreamAccount],
) -> Vec<DownstreamAccount> {
    let index: HashMap<AccountId, &FederatedId> = reference
        .iter()
        .filter_map(|a| a.federated_id.as_ref().map(|id| (a.id, id)))
        .collect();
    members
        .iter()
        .map(|m| {
            let mut m = m.clone();
            if m.federated_id.is_none() {
                m.federated_id = index.get(&m.id).map(|id| (*id).clone());
            }
            m
        })
        .collect()
}
