// src/health.rs
//! Per-source health records and the Healthy → Degraded → Evicted state machine.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::store::atomic_write;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    #[serde(default)]
    pub fail_count: u32,
    #[serde(default)]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_failure: Option<DateTime<Utc>>,
    #[serde(default)]
    pub name: String,
}

impl HealthRecord {
    /// Record for a url that just proved alive (repair, discovery).
    pub fn fresh(name: &str, now: DateTime<Utc>) -> Self {
        Self {
            fail_count: 0,
            last_success: Some(now),
            last_failure: None,
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Evicted,
}

impl HealthState {
    pub fn from_fail_count(fail_count: u32, max_fail_count: u32) -> Self {
        if fail_count == 0 {
            HealthState::Healthy
        } else if fail_count < max_fail_count {
            HealthState::Degraded
        } else {
            HealthState::Evicted
        }
    }
}

/// url → record, persisted as pretty JSON. Keys are kept sorted.
#[derive(Debug, Default)]
pub struct HealthStore {
    path: Option<PathBuf>,
    records: BTreeMap<String, HealthRecord>,
}

impl HealthStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Absent file means an empty map; a present but unreadable one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let records = match fs::read_to_string(path) {
            Ok(s) if s.trim().is_empty() => BTreeMap::new(),
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("parsing health store {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading health store {}", path.display()))
            }
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            records,
        })
    }

    pub fn get(&self, url: &str) -> Option<&HealthRecord> {
        self.records.get(url)
    }

    pub fn put(&mut self, url: &str, record: HealthRecord) {
        self.records.insert(url.to_string(), record);
    }

    pub fn remove(&mut self, url: &str) -> Option<HealthRecord> {
        self.records.remove(url)
    }

    pub fn fail_count(&self, url: &str) -> u32 {
        self.records.get(url).map(|r| r.fail_count).unwrap_or(0)
    }

    pub fn state(&self, url: &str, max_fail_count: u32) -> HealthState {
        HealthState::from_fail_count(self.fail_count(url), max_fail_count)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &HealthRecord)> {
        self.records.iter()
    }

    /// Successful check: back to Healthy from any state.
    pub fn record_success(&mut self, url: &str, name: &str, now: DateTime<Utc>) {
        let rec = self.entry(url, name);
        rec.fail_count = 0;
        rec.last_success = Some(now);
    }

    /// Failed check: one increment per call. Returns the new fail count.
    pub fn record_failure(&mut self, url: &str, name: &str, now: DateTime<Utc>) -> u32 {
        let rec = self.entry(url, name);
        rec.fail_count = rec.fail_count.saturating_add(1);
        rec.last_failure = Some(now);
        rec.fail_count
    }

    pub fn commit(&self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let json =
            serde_json::to_string_pretty(&self.records).context("serializing health store")?;
        atomic_write(path, json.as_bytes())
            .with_context(|| format!("committing health store {}", path.display()))
    }

    fn entry(&mut self, url: &str, name: &str) -> &mut HealthRecord {
        self.records
            .entry(url.to_string())
            .or_insert_with(|| HealthRecord {
                name: name.to_string(),
                ..HealthRecord::default()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn states_follow_fail_count() {
        assert_eq!(HealthState::from_fail_count(0, 3), HealthState::Healthy);
        assert_eq!(HealthState::from_fail_count(2, 3), HealthState::Degraded);
        assert_eq!(HealthState::from_fail_count(3, 3), HealthState::Evicted);
        assert_eq!(HealthState::from_fail_count(7, 3), HealthState::Evicted);
    }

    #[test]
    fn failure_then_success_resets() {
        let mut h = HealthStore::in_memory();
        assert_eq!(h.record_failure("u", "Feed", t(1)), 1);
        assert_eq!(h.record_failure("u", "Feed", t(2)), 2);
        h.record_success("u", "Feed", t(3));

        let rec = h.get("u").unwrap();
        assert_eq!(rec.fail_count, 0);
        assert_eq!(rec.last_success, Some(t(3)));
        assert_eq!(rec.last_failure, Some(t(2)));
        assert_eq!(rec.name, "Feed");
    }

    #[test]
    fn reads_legacy_offset_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("health.json");
        fs::write(
            &p,
            r#"{"https://a/feed": {"fail_count": 2, "last_success": null,
                "last_failure": "2025-02-01T10:00:00.123456+00:00", "name": "A"}}"#,
        )
        .unwrap();
        let h = HealthStore::load(&p).unwrap();
        assert_eq!(h.fail_count("https://a/feed"), 2);
        assert!(h.get("https://a/feed").unwrap().last_failure.is_some());
    }

    #[test]
    fn commit_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("cfg").join("health.json");
        let mut h = HealthStore::load(&p).unwrap();
        assert!(h.is_empty());
        h.record_failure("https://b/rss", "B", t(4));
        h.commit().unwrap();

        let again = HealthStore::load(&p).unwrap();
        assert_eq!(again.get("https://b/rss"), h.get("https://b/rss"));
    }
}
