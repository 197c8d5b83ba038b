//! # psync-gateway
//!
//! The two external systems a pass talks to, behind traits so the
//! orchestrator can be driven by in-memory fakes.
//!
//! - [`DirectoryGateway`] — upstream groups and member status ([`OktaDirectory`])
//! - [`AccessGateway`] — downstream group members and mutations ([`GitLabAccess`])
//!
//! Both clients are blocking and return [`GatewayError`] instead of aborting.

pub mod error;
pub mod gitlab;
mod http;
pub mod okta;

use std::collections::BTreeSet;

use psync_core::{AccessLevel, AccountId, DownstreamAccount, UpstreamGroup};

pub use error::GatewayError;
pub use gitlab::GitLabAccess;
pub use okta::OktaDirectory;

/// A resolved access group with its full membership at every level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessGroup {
    pub id: u64,
    pub name: String,
    /// Direct and inherited members.
    pub members: Vec<DownstreamAccount>,
    /// Members granted through a parent group; they cannot be removed here.
    pub inherited: BTreeSet<AccountId>,
}

impl AccessGroup {
    /// Members strictly below `level`, inherited or not.
    pub fn below(&self, level: AccessLevel) -> Vec<DownstreamAccount> {
        self.members
            .iter()
            .filter(|m| m.access_level < level)
            .cloned()
            .collect()
    }

    /// Split into `(managed, protected)`.
    ///
    /// Managed members are direct and strictly below `ceiling`. Everything
    /// else is protected: still a member, but out of reach of a removal.
    pub fn split(
        &self,
        ceiling: AccessLevel,
    ) -> (Vec<DownstreamAccount>, Vec<DownstreamAccount>) {
        self.members
            .iter()
            .cloned()
            .partition(|m| m.access_level < ceiling && !self.inherited.contains(&m.id))
    }
}

/// Source of upstream groups.
pub trait DirectoryGateway {
    /// Groups whose name starts with `prefix`, names stripped of it, members
    /// already partitioned into active and deprovisioned.
    fn fetch_groups_by_prefix(&self, prefix: &str) -> Result<Vec<UpstreamGroup>, GatewayError>;
}

/// Downstream membership reads and writes.
pub trait AccessGateway {
    /// Every member of the group called `name`, with inherited ones marked.
    fn fetch_group_members(&self, name: &str) -> Result<AccessGroup, GatewayError>;

    fn add_member(
        &self,
        group_id: u64,
        account: AccountId,
        level: AccessLevel,
    ) -> Result<(), GatewayError>;

    fn remove_member(&self, group_id: u64, account: AccountId) -> Result<(), GatewayError>;
}
