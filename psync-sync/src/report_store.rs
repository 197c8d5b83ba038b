//! Report store — the last pass recorded per directory group.
//!
//! Persists a [`GroupReport`] JSON document at
//! `<home>/.psync/reports/<group>.json`.
//! Writes use an atomic `.tmp` + rename. Reports are an audit trail only;
//! reconciliation never reads them back.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::apply::MutationResult;
use crate::error::{io_err, SyncError};

/// What one pass planned and did for one group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupReport {
    pub directory_group: String,
    pub access_group: String,
    pub ran_at: DateTime<Utc>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub planned_adds: usize,
    #[serde(default)]
    pub planned_removes: usize,
    /// Directory identities with no account in the entitlement population.
    #[serde(default)]
    pub unentitled: usize,
    #[serde(default)]
    pub mutations: Vec<MutationResult>,
    /// Set when the group stopped early; `mutations` holds what ran before.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GroupReport {
    pub fn new(directory_group: &str, access_group: &str, dry_run: bool) -> Self {
        Self {
            directory_group: directory_group.to_owned(),
            access_group: access_group.to_owned(),
            ran_at: Utc::now(),
            dry_run,
            planned_adds: 0,
            planned_removes: 0,
            unentitled: 0,
            mutations: Vec::new(),
            error: None,
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn added(&self) -> usize {
        self.mutations.iter().filter(|m| m.is_addition()).count()
    }

    pub fn removed(&self) -> usize {
        self.mutations.len() - self.added()
    }
}

/// Directory holding one JSON file per group.
///
/// `~/.psync/reports/`
pub fn reports_dir_at(home: &Path) -> PathBuf {
    home.join(".psync").join("reports")
}

/// Path to the report JSON for a given directory group, rooted at `home`.
pub fn store_path_at(home: &Path, group: &str) -> PathBuf {
    reports_dir_at(home).join(format!("{}.json", file_stem(group)))
}

/// Percent-encode separators (and `%` itself) so the file stays inside the
/// store and distinct group names never share a file.
fn file_stem(group: &str) -> String {
    let mut stem = String::with_capacity(group.len());
    for c in group.chars() {
        match c {
            '%' => stem.push_str("%25"),
            '/' => stem.push_str("%2F"),
            '\\' => stem.push_str("%5C"),
            ':' => stem.push_str("%3A"),
            c => stem.push(c),
        }
    }
    stem
}

/// Load the last report for `group`, `None` if never recorded.
pub fn load_at(home: &Path, group: &str) -> Result<Option<GroupReport>, SyncError> {
    let path = store_path_at(home, group);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Every recorded report, sorted by directory group.
pub fn list_at(home: &Path) -> Result<Vec<GroupReport>, SyncError> {
    let dir = reports_dir_at(home);
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut reports = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(|e| io_err(&dir, e))? {
        let entry = entry.map_err(|e| io_err(&dir, e))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        reports.push(serde_json::from_str::<GroupReport>(&contents)?);
    }
    reports.sort_by(|a, b| a.directory_group.cmp(&b.directory_group));
    Ok(reports)
}

/// Save the report for its directory group atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_at(home: &Path, report: &GroupReport) -> Result<(), SyncError> {
    let path = store_path_at(home, &report.directory_group);
    let dir = reports_dir_at(home);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let json = serde_json::to_string_pretty(report)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use psync_core::{AccessLevel, DownstreamAccount};
    use tempfile::TempDir;

    use super::*;

    fn sample(group: &str) -> GroupReport {
        let mut report = GroupReport::new(group, "team-payments", false);
        report.planned_adds = 1;
        report.planned_removes = 1;
        report.mutations = vec![
            MutationResult::Removed {
                account: DownstreamAccount::new(2u64, "gone", Some("u2"), AccessLevel::Developer),
            },
            MutationResult::Added {
                account: DownstreamAccount::new(1u64, "new", Some("u1"), AccessLevel::Guest),
            },
        ];
        report
    }

    #[test]
    fn missing_report_loads_as_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load_at(tmp.path(), "nonexistent").unwrap().is_none());
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let report = sample("payments");
        save_at(tmp.path(), &report).unwrap();
        let loaded = load_at(tmp.path(), "payments").unwrap().expect("report");
        assert_eq!(loaded, report);
        assert_eq!(loaded.added(), 1);
        assert_eq!(loaded.removed(), 1);
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        save_at(tmp.path(), &sample("clean")).unwrap();
        let tmp_path = store_path_at(tmp.path(), "clean").with_extension("json.tmp");
        assert!(!tmp_path.exists(), "tmp file should be removed after atomic rename");
    }

    #[test]
    fn list_is_sorted_and_skips_foreign_files() {
        let tmp = TempDir::new().unwrap();
        save_at(tmp.path(), &sample("search")).unwrap();
        save_at(tmp.path(), &sample("billing")).unwrap();
        std::fs::write(reports_dir_at(tmp.path()).join("notes.txt"), "x").unwrap();

        let names: Vec<_> = list_at(tmp.path())
            .unwrap()
            .into_iter()
            .map(|r| r.directory_group)
            .collect();
        assert_eq!(names, vec!["billing", "search"]);
    }

    #[test]
    fn group_names_with_separators_stay_inside_the_store() {
        let tmp = TempDir::new().unwrap();
        let path = store_path_at(tmp.path(), "acme/payments");
        assert_eq!(path.parent(), Some(reports_dir_at(tmp.path()).as_path()));
    }

    #[test]
    fn escaped_names_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let names = ["a/b", "a_b", "a%2Fb", "a:b"];
        let paths: std::collections::HashSet<_> =
            names.iter().map(|n| store_path_at(tmp.path(), n)).collect();
        assert_eq!(paths.len(), names.len());

        save_at(tmp.path(), &sample("a/b")).unwrap();
        save_at(tmp.path(), &sample("a_b")).unwrap();
        let groups: Vec<_> = list_at(tmp.path())
            .unwrap()
            .into_iter()
            .map(|r| r.directory_group)
            .collect();
        assert_eq!(groups, vec!["a/b", "a_b"]);
    }

    #[test]
    fn older_reports_without_counters_still_load() {
        let tmp = TempDir::new().unwrap();
        let dir = reports_dir_at(tmp.path());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("legacy.json"),
            r#"{"directory_group":"legacy","access_group":"legacy","ran_at":"2026-01-02T03:04:05Z"}"#,
        )
        .unwrap();
        let loaded = load_at(tmp.path(), "legacy").unwrap().expect("report");
        assert!(loaded.mutations.is_empty());
        assert!(!loaded.failed());
    }
}
