//! `psync check` — validate configuration without touching the network.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use psync_core::{config, ConfigError};

use crate::GlobalOpts;

/// Arguments for `psync check`.
#[derive(Args, Debug)]
pub struct CheckArgs {}

impl CheckArgs {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let path = global.config_path()?;
        let cfg = config::load_at(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        println!("{} config valid: {}", "✓".green().bold(), path.display());
        println!();

        let yaml = serde_yaml::to_string(&cfg.redacted()).context("failed to render config")?;
        print!("{yaml}");
        println!();

        let sync = &cfg.sync;
        println!(
            "Directory groups matching '{}*' reconcile against entitlement group '{}'",
            sync.group_prefix, sync.entitlement_group
        );
        println!(
            "Grant level: {}; members at {} or above are never touched",
            sync.grant_level, sync.privilege_ceiling
        );
        if sync.mappings.is_empty() {
            println!("Mappings: each directory group maps to the access group of the same name");
        } else {
            println!("Mappings:");
            for mapping in &sync.mappings {
                println!("  {} → {}", mapping.directory_group, mapping.access_group);
            }
        }
        println!();

        match cfg.credentials(|key| std::env::var(key).ok()) {
            Ok(_) => {
                println!("{} credentials resolved", "✓".green().bold());
                Ok(())
            }
            Err(ConfigError::MissingCredential { service, env }) => {
                println!(
                    "{} no {service} token: set `{env}` or the inline token",
                    "✗".red().bold()
                );
                bail!("missing {service} credential ({env})")
            }
            Err(err) => Err(err.into()),
        }
    }
}
