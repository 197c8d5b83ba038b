//! `psync sync` — one reconciliation pass.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use psync_core::config;
use psync_gateway::{GitLabAccess, OktaDirectory};
use psync_sync::{
    pipeline::{self, PassReport, SyncContext, SyncScope},
    GroupReport, MutationResult,
};

use crate::GlobalOpts;

/// Arguments for `psync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Only reconcile this directory group (prefix stripped, e.g. `search`).
    #[arg(long)]
    pub group: Option<String>,

    /// Plan and print mutations without calling the access system.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the pass report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self, global: &GlobalOpts) -> Result<()> {
        let path = global.config_path()?;
        let cfg = config::load_at(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?;
        let credentials = cfg.credentials(|key| std::env::var(key).ok())?;
        let home = config::home()?;

        let directory = OktaDirectory::new(
            &cfg.okta.org_url,
            &credentials.okta_token,
            Duration::from_secs(cfg.okta.request_timeout_secs),
            cfg.okta.max_retries,
        );
        let access = GitLabAccess::new(
            &cfg.gitlab.base_url,
            &credentials.gitlab_token,
            Duration::from_secs(cfg.gitlab.request_timeout_secs),
            cfg.gitlab.max_retries,
        );
        let ctx = SyncContext {
            directory: &directory,
            access: &access,
            settings: &cfg.sync,
            home: Some(home.as_path()),
        };

        let scope = match self.group.clone() {
            Some(name) => SyncScope::Group(name),
            None => SyncScope::All,
        };
        let pass = pipeline::run(&ctx, scope, self.dry_run).context("sync pass aborted")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&pass).context("failed to serialize pass report")?
            );
        } else {
            print_pass(&pass);
        }

        let failed = pass.failed_groups();
        tracing::info!(
            groups = pass.groups.len(),
            failed,
            dry_run = pass.dry_run,
            "pass finished"
        );
        if failed > 0 {
            bail!("{failed} of {} group(s) failed", pass.groups.len());
        }
        Ok(())
    }
}

fn print_pass(pass: &PassReport) {
    if pass.groups.is_empty() {
        println!("No mapped directory groups found. Run `psync check` to review the config.");
        return;
    }
    for group in &pass.groups {
        print_group(group, pass.dry_run);
    }
}

fn print_group(report: &GroupReport, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let target = format!("'{}' → '{}'", report.directory_group, report.access_group);

    if let Some(error) = &report.error {
        println!("{prefix}{} {target} failed: {error}", "✗".red().bold());
    } else if report.mutations.is_empty() {
        println!("{prefix}✓ {target} — nothing to do");
    } else {
        println!(
            "{prefix}✓ {target} ({} added, {} removed)",
            report.added(),
            report.removed()
        );
    }

    for mutation in &report.mutations {
        let account = mutation.account();
        let marker = match mutation {
            MutationResult::Added { .. } => "+".green().to_string(),
            MutationResult::Removed { .. } => "-".red().to_string(),
            MutationResult::WouldAdd { .. } => "~+".to_string(),
            MutationResult::WouldRemove { .. } => "~-".to_string(),
        };
        println!("  {marker}  {} ({})", account.username, account.id);
    }
    if report.unentitled > 0 {
        let note = format!(
            "{} directory member(s) without an entitlement account",
            report.unentitled
        );
        println!("  {}", note.dimmed());
    }
}
