//! Domain types for directory and access-group membership.
//!
//! Every value here is pass-scoped: built fresh from a gateway query, read by
//! the reconciliation engine, and dropped when the pass ends.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Identity assertion shared by the directory and the access system.
///
/// The directory user id is what the access system records as the SAML
/// `extern_uid`, so it is the only value comparable across both systems.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FederatedId(pub String);

impl FederatedId {
    /// Returns `None` for empty or whitespace-only input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }
}

impl fmt::Display for FederatedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for FederatedId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FederatedId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Numeric account id in the access system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for AccountId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Access tiers of the downstream system, lowest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    NoAccess,
    Minimal,
    Guest,
    Reporter,
    #[default]
    Developer,
    Maintainer,
    Owner,
}

impl AccessLevel {
    /// Wire value used by the access system's API.
    pub fn value(self) -> u32 {
        match self {
            AccessLevel::NoAccess => 0,
            AccessLevel::Minimal => 5,
            AccessLevel::Guest => 10,
            AccessLevel::Reporter => 20,
            AccessLevel::Developer => 30,
            AccessLevel::Maintainer => 40,
            AccessLevel::Owner => 50,
        }
    }

    /// Inverse of [`AccessLevel::value`]; unknown tiers yield `None`.
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0 => Some(AccessLevel::NoAccess),
            5 => Some(AccessLevel::Minimal),
            10 => Some(AccessLevel::Guest),
            20 => Some(AccessLevel::Reporter),
            30 => Some(AccessLevel::Developer),
            40 => Some(AccessLevel::Maintainer),
            50 => Some(AccessLevel::Owner),
            _ => None,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessLevel::NoAccess => write!(f, "no_access"),
            AccessLevel::Minimal => write!(f, "minimal"),
            AccessLevel::Guest => write!(f, "guest"),
            AccessLevel::Reporter => write!(f, "reporter"),
            AccessLevel::Developer => write!(f, "developer"),
            AccessLevel::Maintainer => write!(f, "maintainer"),
            AccessLevel::Owner => write!(f, "owner"),
        }
    }
}

/// Lifecycle status of a directory user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    Active,
    Provisioned,
    Staged,
    Recovery,
    PasswordExpired,
    LockedOut,
    Suspended,
    Deprovisioned,
}

/// Which membership set a directory user lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStanding {
    Active,
    Deprovisioned,
    /// Never activated; neither eligible nor revocable.
    Ignored,
}

impl UserStatus {
    pub fn standing(self) -> MemberStanding {
        match self {
            UserStatus::Suspended | UserStatus::Deprovisioned => MemberStanding::Deprovisioned,
            UserStatus::Staged => MemberStanding::Ignored,
            UserStatus::Active
            | UserStatus::Provisioned
            | UserStatus::Recovery
            | UserStatus::PasswordExpired
            | UserStatus::LockedOut => MemberStanding::Active,
        }
    }
}

// ---------------------------------------------------------------------------
// Membership views
// ---------------------------------------------------------------------------

/// A directory group with its members split by status.
///
/// `active` and `deprovisioned` are always disjoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamGroup {
    pub id: String,
    /// Group name with the naming-convention prefix stripped.
    pub name: String,
    pub active: BTreeSet<FederatedId>,
    pub deprovisioned: BTreeSet<FederatedId>,
}

impl UpstreamGroup {
    /// Build a group from `(member, status)` pairs.
    ///
    /// A member listed with both an active and a deprovisioned status ends up
    /// in `deprovisioned` only.
    pub fn partition(
        id: impl Into<String>,
        name: impl Into<String>,
        members: impl IntoIterator<Item = (FederatedId, UserStatus)>,
    ) -> Self {
        let mut active = BTreeSet::new();
        let mut deprovisioned = BTreeSet::new();
        for (member, status) in members {
            match status.standing() {
                MemberStanding::Active => {
                    active.insert(member);
                }
                MemberStanding::Deprovisioned => {
                    deprovisioned.insert(member);
                }
                MemberStanding::Ignored => {}
            }
        }
        active.retain(|m| !deprovisioned.contains(m));
        Self {
            id: id.into(),
            name: name.into(),
            active,
            deprovisioned,
        }
    }
}

/// An account in the access system, as seen through one group's member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamAccount {
    pub id: AccountId,
    pub username: String,
    /// Present only for accounts provisioned through the identity federation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub federated_id: Option<FederatedId>,
    pub access_level: AccessLevel,
}

impl DownstreamAccount {
    /// Normalizes an empty federated id to `None`.
    pub fn new(
        id: impl Into<AccountId>,
        username: impl Into<String>,
        federated_id: Option<&str>,
        access_level: AccessLevel,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            federated_id: federated_id.and_then(FederatedId::parse),
            access_level,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(FederatedId::from("00u1").to_string(), "00u1");
        assert_eq!(AccountId(42).to_string(), "42");
    }

    #[test]
    fn federated_id_parse_rejects_blank() {
        assert_eq!(FederatedId::parse(""), None);
        assert_eq!(FederatedId::parse("   "), None);
        assert_eq!(FederatedId::parse(" u1 "), Some(FederatedId::from("u1")));
    }

    #[test]
    fn access_level_ordering_follows_value() {
        assert!(AccessLevel::Developer < AccessLevel::Maintainer);
        assert!(AccessLevel::Maintainer < AccessLevel::Owner);
        for level in [
            AccessLevel::NoAccess,
            AccessLevel::Minimal,
            AccessLevel::Guest,
            AccessLevel::Reporter,
            AccessLevel::Developer,
            AccessLevel::Maintainer,
            AccessLevel::Owner,
        ] {
            assert_eq!(AccessLevel::from_value(level.value()), Some(level));
        }
        assert_eq!(AccessLevel::from_value(60), None);
    }

    #[test]
    fn partition_keeps_sets_disjoint() {
        let group = UpstreamGroup::partition(
            "00g1",
            "payments",
            vec![
                (FederatedId::from("u1"), UserStatus::Active),
                (FederatedId::from("u2"), UserStatus::Suspended),
                (FederatedId::from("u3"), UserStatus::Deprovisioned),
                (FederatedId::from("u4"), UserStatus::Staged),
                (FederatedId::from("u5"), UserStatus::LockedOut),
                (FederatedId::from("u1"), UserStatus::Deprovisioned),
            ],
        );
        let active: Vec<_> = group.active.iter().map(|f| f.0.as_str()).collect();
        let gone: Vec<_> = group.deprovisioned.iter().map(|f| f.0.as_str()).collect();
        assert_eq!(active, vec!["u5"]);
        assert_eq!(gone, vec!["u1", "u2", "u3"]);
    }

    #[test]
    fn account_with_empty_identity_is_unmatchable() {
        let account = DownstreamAccount::new(7u64, "bob", Some(""), AccessLevel::Guest);
        assert!(account.federated_id.is_none());
    }

    #[test]
    fn user_status_deserializes_from_directory_casing() {
        let status: UserStatus = serde_yaml::from_str("PASSWORD_EXPIRED").expect("parse");
        assert_eq!(status, UserStatus::PasswordExpired);
    }
}
