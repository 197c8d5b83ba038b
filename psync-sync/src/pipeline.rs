//! Pass driver used by `psync sync`.
//!
//! One pass:
//!
//! 1. List directory groups by prefix and resolve their access groups.
//! 2. Fetch the entitlement group once; every group shares this snapshot. Its
//!    members below the grant level are the entitlement population, and all of
//!    its members serve as the identity reference.
//! 3. Per group, sequentially: fetch the access group, split off protected
//!    members, correlate identities, reconcile, apply, record.
//!
//! Steps 1–2 failing abort the pass. A failure in step 3 stops that group only.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use psync_core::{config::SyncSettings, DownstreamAccount, UpstreamGroup};
use psync_gateway::{AccessGateway, DirectoryGateway};
use psync_reconcile::{correlate, MembershipSnapshot, ReconciliationEngine};

use crate::apply::apply_plan;
use crate::report_store::{self, GroupReport};
use crate::SyncError;

/// Scope for a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// Every mapped directory group.
    All,
    /// A single directory group, by its prefix-stripped name.
    Group(String),
}

/// Everything a pass needs, passed in explicitly.
#[derive(Clone, Copy)]
pub struct SyncContext<'a> {
    pub directory: &'a dyn DirectoryGateway,
    pub access: &'a dyn AccessGateway,
    pub settings: &'a SyncSettings,
    /// Root of the report store; `None` disables recording.
    pub home: Option<&'a Path>,
}

/// Result of one pass across its groups.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub groups: Vec<GroupReport>,
}

impl PassReport {
    pub fn failed_groups(&self) -> usize {
        self.groups.iter().filter(|g| g.failed()).count()
    }
}

/// Run one pass over `scope`.
pub fn run(
    ctx: &SyncContext<'_>,
    scope: SyncScope,
    dry_run: bool,
) -> Result<PassReport, SyncError> {
    let started_at = Utc::now();
    let settings = ctx.settings;

    let groups = ctx.directory.fetch_groups_by_prefix(&settings.group_prefix)?;
    let targets = select_targets(settings, groups, &scope)?;
    if targets.is_empty() {
        info!(prefix = %settings.group_prefix, "no mapped directory groups; nothing to do");
        return Ok(PassReport {
            started_at,
            dry_run,
            groups: vec![],
        });
    }

    let entitlement_group = ctx.access.fetch_group_members(&settings.entitlement_group)?;
    let population = Population {
        entitled: entitlement_group.below(settings.grant_level),
        identities: entitlement_group.members,
    };
    info!(
        group = %settings.entitlement_group,
        entitled = population.entitled.len(),
        members = population.identities.len(),
        "loaded entitlement population"
    );

    let engine = ReconciliationEngine::new(settings.grant_level);
    let mut reports = Vec::with_capacity(targets.len());
    for (group, access_group) in targets {
        let report = sync_group(ctx, &engine, &group, &access_group, &population, dry_run);
        if !dry_run {
            if let Some(home) = ctx.home {
                if let Err(err) = report_store::save_at(home, &report) {
                    warn!(group = %group.name, error = %err, "could not record report");
                }
            }
        }
        reports.push(report);
    }

    Ok(PassReport {
        started_at,
        dry_run,
        groups: reports,
    })
}

/// The entitlement group as seen by every group of one pass.
struct Population {
    /// Members strictly below the grant level.
    entitled: Vec<DownstreamAccount>,
    /// Every member, used to resolve identities by account id.
    identities: Vec<DownstreamAccount>,
}

/// Pair each directory group in scope with its access group name.
fn select_targets(
    settings: &SyncSettings,
    groups: Vec<UpstreamGroup>,
    scope: &SyncScope,
) -> Result<Vec<(UpstreamGroup, String)>, SyncError> {
    let found: HashSet<String> = groups.iter().map(|g| g.name.clone()).collect();
    for mapping in &settings.mappings {
        if !found.contains(&mapping.directory_group) {
            warn!(group = %mapping.directory_group, "mapped directory group not found");
        }
    }

    let mut targets = Vec::new();
    for group in groups {
        if let SyncScope::Group(wanted) = scope {
            if &group.name != wanted {
                continue;
            }
        }
        match settings.access_group_for(&group.name) {
            Some(access) => targets.push((group, access)),
            None => debug!(group = %group.name, "directory group not mapped; skipping"),
        }
    }

    if let SyncScope::Group(wanted) = scope {
        if targets.is_empty() {
            return Err(SyncError::UnknownGroup(wanted.clone()));
        }
    }
    Ok(targets)
}

fn sync_group(
    ctx: &SyncContext<'_>,
    engine: &ReconciliationEngine,
    group: &UpstreamGroup,
    access_name: &str,
    population: &Population,
    dry_run: bool,
) -> GroupReport {
    let span = tracing::info_span!("group", group = %group.name, access_group = %access_name);
    let _enter = span.enter();
    let mut report = GroupReport::new(&group.name, access_name, dry_run);

    let access_group = match ctx.access.fetch_group_members(access_name) {
        Ok(access_group) => access_group,
        Err(err) => {
            error!(error = %err, "fetching access group failed; skipping group");
            report.error = Some(err.to_string());
            return report;
        }
    };

    let (managed, protected) = access_group.split(ctx.settings.privilege_ceiling);
    let members = correlate::attach_identities(&managed, &population.identities);
    let protected = correlate::attach_identities(&protected, &population.identities);
    let unmatched = members.iter().filter(|m| m.federated_id.is_none()).count();
    if unmatched > 0 {
        debug!(unmatched, "members without federated identity are left untouched");
    }
    if !protected.is_empty() {
        debug!(
            protected = protected.len(),
            "inherited or high-privilege members are never removed"
        );
    }

    let entitlement = population.entitled.as_slice();
    let entitled: HashSet<_> = correlate::federated_ids(entitlement).into_iter().collect();
    report.unentitled = group.active.iter().filter(|id| !entitled.contains(*id)).count();

    let plan = engine.reconcile(&MembershipSnapshot {
        upstream_eligible: &group.active,
        upstream_deprovisioned: &group.deprovisioned,
        entitlement_set: entitlement,
        access_group_members: &members,
        protected_members: &protected,
    });
    report.planned_adds = plan.add.accounts.len();
    report.planned_removes = plan.remove.accounts.len();
    info!(
        adds = report.planned_adds,
        removes = report.planned_removes,
        unentitled = report.unentitled,
        "planned"
    );

    let outcome = apply_plan(ctx.access, access_group.id, &plan, dry_run);
    report.mutations = outcome.mutations;
    report.error = outcome.failure.map(|err| err.to_string());
    report
}
