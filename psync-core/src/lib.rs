//! psync core library — domain types, configuration, errors.
//!
//! - [`types`] — newtypes and membership views shared by every crate
//! - [`config`] — YAML configuration model, loader, credential resolution
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, Credentials, GroupMapping};
pub use error::ConfigError;
pub use types::{
    AccessLevel, AccountId, DownstreamAccount, FederatedId, UpstreamGroup, UserStatus,
};
