//! `psync status` — last recorded pass per directory group.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use psync_core::config;
use psync_sync::{report_store, GroupReport};

/// Arguments for `psync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Filter to a single directory group.
    #[arg(long)]
    pub group: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = config::home()?;

        let mut reports =
            report_store::list_at(&home).context("failed to read recorded reports")?;
        if let Some(group) = self.group.as_ref() {
            reports.retain(|r| r.directory_group == *group);
        }

        if self.json {
            print_json(&reports)?;
            return Ok(());
        }
        if reports.is_empty() {
            println!("No passes recorded yet. Run `psync sync` first.");
            return Ok(());
        }
        print_table(&reports, Utc::now());
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusJson<'a> {
    groups: usize,
    failed: usize,
    reports: &'a [GroupReport],
}

fn print_json(reports: &[GroupReport]) -> Result<()> {
    let payload = StatusJson {
        groups: reports.len(),
        failed: reports.iter().filter(|r| r.failed()).count(),
        reports,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Access group")]
    access_group: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Added")]
    added: usize,
    #[tabled(rename = "Removed")]
    removed: usize,
    #[tabled(rename = "Unentitled")]
    unentitled: usize,
    #[tabled(rename = "Last run")]
    last_run: String,
}

fn print_table(reports: &[GroupReport], now: DateTime<Utc>) {
    let rows: Vec<StatusRow> = reports
        .iter()
        .map(|r| StatusRow {
            group: r.directory_group.clone(),
            access_group: r.access_group.clone(),
            result: result_indicator(r),
            added: r.added(),
            removed: r.removed(),
            unentitled: r.unentitled,
            last_run: format_age(r.ran_at, now),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let failed = reports.iter().filter(|r| r.failed()).count();
    println!(
        "{} group(s), {} failed",
        reports.len(),
        if failed > 0 {
            failed.to_string().red().bold().to_string()
        } else {
            failed.to_string()
        }
    );
}

fn result_indicator(report: &GroupReport) -> String {
    match &report.error {
        Some(error) => format!("{} {}", "■".red().bold(), truncate(error, 48)),
        None if report.mutations.is_empty() => format!("{} in sync", "■".green().bold()),
        None => format!("{} updated", "■".yellow().bold()),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_owned();
    }
    let head: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{head}…")
}

/// Coarse age like `42s ago`, `5m ago`, `3h ago`, `2d ago`.
fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - at).num_seconds().max(0) as u64;
    let age = if seconds < 60 {
        format!("{seconds}s")
    } else if seconds < 60 * 60 {
        format!("{}m", seconds / 60)
    } else if seconds < 60 * 60 * 24 {
        format!("{}h", seconds / (60 * 60))
    } else {
        format!("{}d", seconds / (60 * 60 * 24))
    };
    format!("{age} ago")
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn age_uses_the_largest_whole_unit() {
        let now = Utc::now();
        assert_eq!(format_age(now - Duration::seconds(42), now), "42s ago");
        assert_eq!(format_age(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_age(now - Duration::hours(3), now), "3h ago");
        assert_eq!(format_age(now - Duration::days(2), now), "2d ago");
    }

    #[test]
    fn future_timestamps_clamp_to_zero() {
        let now = Utc::now();
        assert_eq!(format_age(now + Duration::minutes(1), now), "0s ago");
    }

    #[test]
    fn long_errors_are_truncated() {
        let text = "x".repeat(100);
        let short = truncate(&text, 10);
        assert_eq!(short.chars().count(), 10);
        assert!(short.ends_with('…'));
        assert_eq!(truncate("short", 10), "short");
    }
}
