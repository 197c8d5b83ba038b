//! YAML configuration for a sync pass.
//!
//! # Storage layout
//!
//! ```text
//! ~/.psync/
//!   config.yaml           (default location, overridable with --config)
//!   reports/<group>.json  (written by psync-sync)
//! ```
//!
//! # API pattern
//!
//! Path-taking functions have two forms, like the rest of the workspace:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! The loaded [`Config`] is handed to the orchestrator as a value. Nothing in
//! the reconciliation core reads configuration or the environment.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::AccessLevel;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub okta: OktaConfig,
    pub gitlab: GitLabConfig,
    #[serde(default)]
    pub sync: SyncSettings,
}

/// Directory connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OktaConfig {
    pub org_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_okta_token_env")]
    pub token_env: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retries after an HTTP 429 before the request fails.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Access-system connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabConfig {
    #[serde(default = "default_gitlab_url")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_gitlab_token_env")]
    pub token_env: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Which groups are reconciled and at which level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Naming convention selecting directory groups, e.g. `dev_`.
    #[serde(default = "default_group_prefix")]
    pub group_prefix: String,
    /// Access-system group holding the eligible population.
    #[serde(default = "default_entitlement_group")]
    pub entitlement_group: String,
    #[serde(default)]
    pub grant_level: AccessLevel,
    /// Members at or above this level are invisible to reconciliation.
    #[serde(default = "default_privilege_ceiling")]
    pub privilege_ceiling: AccessLevel,
    /// Explicit pairs; when empty every prefixed directory group maps to the
    /// access group named by its stripped name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mappings: Vec<GroupMapping>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            group_prefix: default_group_prefix(),
            entitlement_group: default_entitlement_group(),
            grant_level: AccessLevel::default(),
            privilege_ceiling: default_privilege_ceiling(),
            mappings: Vec::new(),
        }
    }
}

/// A directory group (prefix stripped) and the access group it feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMapping {
    pub directory_group: String,
    pub access_group: String,
}

fn default_okta_token_env() -> String {
    "OKTA_API_TOKEN".to_owned()
}

fn default_gitlab_token_env() -> String {
    "GITLAB_TOKEN".to_owned()
}

fn default_gitlab_url() -> String {
    "https://gitlab.com".to_owned()
}

fn default_request_timeout_secs() -> u64 {
    45
}

fn default_max_retries() -> u32 {
    3
}

fn default_group_prefix() -> String {
    "dev_".to_owned()
}

fn default_entitlement_group() -> String {
    "AFKL-MCP".to_owned()
}

fn default_privilege_ceiling() -> AccessLevel {
    AccessLevel::Owner
}

// ---------------------------------------------------------------------------
// Behaviour
// ---------------------------------------------------------------------------

impl SyncSettings {
    /// Resolve the access group for a directory group, or `None` when
    /// explicit mappings exist and none names it.
    pub fn access_group_for(&self, directory_group: &str) -> Option<String> {
        if self.mappings.is_empty() {
            return Some(directory_group.to_owned());
        }
        self.mappings
            .iter()
            .find(|m| m.directory_group == directory_group)
            .map(|m| m.access_group.clone())
    }
}

impl Config {
    /// Reject configurations that would make a pass meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.okta.org_url.trim().is_empty() {
            return Err(ConfigError::Invalid("okta.org_url is empty".into()));
        }
        if self.gitlab.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("gitlab.base_url is empty".into()));
        }
        if self.sync.group_prefix.is_empty() {
            return Err(ConfigError::Invalid("sync.group_prefix is empty".into()));
        }
        if self.sync.entitlement_group.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "sync.entitlement_group is empty".into(),
            ));
        }
        if self.sync.grant_level >= self.sync.privilege_ceiling {
            return Err(ConfigError::Invalid(format!(
                "sync.grant_level ({}) must be below sync.privilege_ceiling ({})",
                self.sync.grant_level, self.sync.privilege_ceiling
            )));
        }
        let mut seen = BTreeSet::new();
        for mapping in &self.sync.mappings {
            if !seen.insert(mapping.directory_group.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "directory group '{}' is mapped more than once",
                    mapping.directory_group
                )));
            }
        }
        Ok(())
    }

    /// Resolve tokens, preferring inline values over environment variables.
    ///
    /// `lookup` is the environment accessor; the CLI passes `std::env::var`.
    pub fn credentials<F>(&self, lookup: F) -> Result<Credentials, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let okta_token = resolve_token(
            "okta",
            self.okta.token.as_deref(),
            &self.okta.token_env,
            &lookup,
        )?;
        let gitlab_token = resolve_token(
            "gitlab",
            self.gitlab.token.as_deref(),
            &self.gitlab.token_env,
            &lookup,
        )?;
        Ok(Credentials {
            okta_token,
            gitlab_token,
        })
    }

    /// Copy suitable for display: inline tokens replaced.
    pub fn redacted(&self) -> Config {
        let mut copy = self.clone();
        if copy.okta.token.is_some() {
            copy.okta.token = Some("<redacted>".into());
        }
        if copy.gitlab.token.is_some() {
            copy.gitlab.token = Some("<redacted>".into());
        }
        copy
    }
}

fn resolve_token<F>(
    service: &'static str,
    inline: Option<&str>,
    env: &str,
    lookup: &F,
) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    inline
        .map(str::to_owned)
        .or_else(|| lookup(env))
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingCredential {
            service,
            env: env.to_owned(),
        })
}

/// API tokens for both systems, resolved once before a pass.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub okta_token: String,
    pub gitlab_token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("okta_token", &"<redacted>")
            .field("gitlab_token", &"<redacted>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// `<home>/.psync/config.yaml` — pure, no I/O.
pub fn default_path_at(home: &Path) -> PathBuf {
    home.join(".psync").join("config.yaml")
}

/// `default_path_at` convenience wrapper.
pub fn default_path() -> Result<PathBuf, ConfigError> {
    Ok(default_path_at(&home()?))
}

/// Load and validate a config file.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    config.validate()?;
    Ok(config)
}

/// Home directory used for the default config and report locations.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
