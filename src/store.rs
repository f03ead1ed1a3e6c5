// src/store.rs
//! File locations for the three persisted documents, plus the atomic
//! replace-on-write every store commits through.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";
pub const DEFAULT_HEALTH_PATH: &str = "config/feed_health.json";
pub const DEFAULT_HISTORY_PATH: &str = "state/seen_urls.txt";

pub const ENV_SOURCES_PATH: &str = "CURATOR_SOURCES_PATH";
pub const ENV_HEALTH_PATH: &str = "CURATOR_HEALTH_PATH";
pub const ENV_HISTORY_PATH: &str = "CURATOR_HISTORY_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub sources: PathBuf,
    pub health: PathBuf,
    pub history: PathBuf,
}

impl Paths {
    /// Env var per document, falling back to the repo-relative default.
    pub fn from_env() -> Self {
        fn pick(env: &str, default: &str) -> PathBuf {
            std::env::var(env)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(default))
        }
        Self {
            sources: pick(ENV_SOURCES_PATH, DEFAULT_SOURCES_PATH),
            health: pick(ENV_HEALTH_PATH, DEFAULT_HEALTH_PATH),
            history: pick(ENV_HISTORY_PATH, DEFAULT_HISTORY_PATH),
        }
    }

    /// All three documents under one directory (tests, ad-hoc runs).
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            sources: dir.join("sources.toml"),
            health: dir.join("feed_health.json"),
            history: dir.join("seen_urls.txt"),
        }
    }
}

/// Write `bytes` to a sibling temp file, flush it, then rename over `path`.
/// Readers see either the old document or the new one, never a torn write.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    {
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("creating temp file {}", tmp.display()))?;
        f.write_all(bytes)
            .with_context(|| format!("writing temp file {}", tmp.display()))?;
        f.sync_all()
            .with_context(|| format!("syncing temp file {}", tmp.display()))?;
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e)
            .with_context(|| format!("replacing {} with {}", path.display(), tmp.display()));
    }
    Ok(())
}
