//! URLs already surfaced in earlier runs.
//!
//! Append-only: `record` only queues URLs that are not yet known, and `commit`
//! writes the file back byte for byte as loaded, followed by the new lines.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::store::atomic_write;

#[derive(Debug, Default)]
pub struct HistoryStore {
    path: Option<PathBuf>,
    seen: HashSet<String>,
    // file order, committed lines first
    ordered: Vec<String>,
    committed: usize,
    // file content as last read or written
    on_disk: String,
}

impl HistoryStore {
    /// In-memory store with no backing file (tests, previews).
    pub fn in_memory<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = Self::default();
        for u in urls {
            store.insert(u.into());
        }
        store.committed = store.ordered.len();
        store
    }

    /// Absent file means empty history.
    pub fn load(path: &Path) -> Result<Self> {
        let mut store = Self {
            path: Some(path.to_path_buf()),
            ..Self::default()
        };
        match fs::read_to_string(path) {
            Ok(s) => {
                for line in s.lines() {
                    store.insert(line.trim().to_string());
                }
                store.on_disk = s;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("reading history {}", path.display()))
            }
        }
        store.committed = store.ordered.len();
        Ok(store)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Queue urls as seen. Returns how many were new.
    pub fn record<I, S>(&mut self, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for u in urls {
            if self.insert(u.into()) {
                added += 1;
            }
        }
        added
    }

    /// Lines recorded since load / last commit.
    pub fn pending(&self) -> &[String] {
        &self.ordered[self.committed..]
    }

    /// Persist pending lines. No-op when nothing is pending or there is no file.
    pub fn commit(&mut self) -> Result<()> {
        if self.pending().is_empty() {
            return Ok(());
        }
        let Some(path) = self.path.as_ref() else {
            self.committed = self.ordered.len();
            return Ok(());
        };

        let pending = &self.ordered[self.committed..];
        let mut body = String::with_capacity(
            self.on_disk.len() + 1 + pending.iter().map(|u| u.len() + 1).sum::<usize>(),
        );
        body.push_str(&self.on_disk);
        if !body.is_empty() && !body.ends_with('\n') {
            body.push('\n');
        }
        for url in pending {
            body.push_str(url);
            body.push('\n');
        }
        atomic_write(path, body.as_bytes())
            .with_context(|| format!("committing history {}", path.display()))?;

        tracing::info!(
            target: "history",
            added = self.ordered.len() - self.committed,
            total = self.ordered.len(),
            "history committed"
        );
        self.committed = self.ordered.len();
        self.on_disk = body;
        Ok(())
    }

    fn insert(&mut self, url: String) -> bool {
        if url.is_empty() || self.seen.contains(&url) {
            return false;
        }
        self.seen.insert(url.clone());
        self.ordered.push(url);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let h = HistoryStore::load(&dir.path().join("nope.txt")).unwrap();
        assert!(h.is_empty());
    }

    #[test]
    fn record_skips_known_and_duplicates() {
        let mut h = HistoryStore::in_memory(["https://a"]);
        let added = h.record(["https://a", "https://b", "https://b", ""]);
        assert_eq!(added, 1);
        assert_eq!(h.pending(), &["https://b".to_string()]);
        assert!(h.contains("https://a") && h.contains("https://b"));
    }

    #[test]
    fn commit_only_appends_new_lines() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("seen.txt");
        fs::write(&p, "https://old/1\nhttps://old/2\n").unwrap();

        let mut h = HistoryStore::load(&p).unwrap();
        h.record(["https://old/2", "https://new/1"]);
        h.commit().unwrap();

        let body = fs::read_to_string(&p).unwrap();
        assert_eq!(body, "https://old/1\nhttps://old/2\nhttps://new/1\n");
        assert!(h.pending().is_empty());

        let again = HistoryStore::load(&p).unwrap();
        assert_eq!(again.len(), 3);
    }

    #[test]
    fn commit_leaves_existing_bytes_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("seen.txt");
        let original = "https://a\n\nhttps://a\n  https://b  ";
        fs::write(&p, original).unwrap();

        let mut h = HistoryStore::load(&p).unwrap();
        assert_eq!(h.len(), 2);
        h.record(["https://b", "https://c"]);
        h.commit().unwrap();
        h.record(["https://d"]);
        h.commit().unwrap();

        let body = fs::read_to_string(&p).unwrap();
        assert_eq!(body, format!("{original}\nhttps://c\nhttps://d\n"));
    }

    #[test]
    fn write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        // target path is a directory, so the final rename cannot succeed
        let p = dir.path().join("seen.txt");
        fs::create_dir(&p).unwrap();

        let mut h = HistoryStore {
            path: Some(p.clone()),
            ..HistoryStore::default()
        };
        h.record(["https://a"]);
        let err = h.commit().unwrap_err();
        assert!(format!("{err:#}").contains("committing history"));
        assert_eq!(h.pending().len(), 1);
    }
}
