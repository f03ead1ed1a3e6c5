// src/registry.rs
//! Source registry: the feed roster, keyword list and selection/maintenance
//! limits, kept in one TOML document.
//!
//! The document is loaded once, validated, and handed around by reference.
//! Maintenance mutates the roster in memory and commits it back atomically.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::store::atomic_write;

/// Upper bound applied to any configured or discovered source weight.
pub const MAX_SOURCE_WEIGHT: f64 = 2.0;

/// One year. Longer windows are rejected at load time.
pub const MAX_LOOKBACK_HOURS: u32 = 8_760;

fn default_language() -> String {
    "en".to_string()
}
fn default_weight() -> f64 {
    1.0
}
fn default_category() -> String {
    "general".to_string()
}
fn default_keyword_score_cap() -> usize {
    5
}
fn default_max_fail_count() -> u32 {
    3
}
fn default_discover_languages() -> Vec<String> {
    vec!["en".into(), "ja".into(), "zh".into()]
}
fn default_max_feeds_per_language() -> usize {
    8
}
fn default_probe_delay_ms() -> u64 {
    500
}
fn default_oracle_delay_ms() -> u64 {
    1_000
}
fn default_probe_attempts() -> u32 {
    1
}
fn default_max_oracle_calls() -> u32 {
    20
}
fn default_true() -> bool {
    true
}
fn default_page_size() -> u32 {
    50
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub url: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_category")]
    pub category: String,
}

impl SourceDescriptor {
    pub fn new(name: &str, url: &str, language: &str, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            language: language.to_string(),
            weight,
            category: default_category(),
        }
    }

    /// Weight as used for scoring: finite and within `[0, MAX_SOURCE_WEIGHT]`.
    pub fn effective_weight(&self) -> f64 {
        clamp_weight(self.weight)
    }
}

pub fn clamp_weight(w: f64) -> f64 {
    if w.is_finite() {
        w.clamp(0.0, MAX_SOURCE_WEIGHT)
    } else {
        default_weight()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionLimits {
    pub lookback_hours: u32,
    pub max_articles: usize,
    pub max_per_source: usize,
    /// Keyword hits beyond this count add nothing.
    #[serde(default = "default_keyword_score_cap")]
    pub keyword_score_cap: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceLimits {
    #[serde(default = "default_max_fail_count")]
    pub max_fail_count: u32,
    #[serde(default = "default_discover_languages")]
    pub auto_discover_languages: Vec<String>,
    #[serde(default = "default_max_feeds_per_language")]
    pub max_feeds_per_language: usize,
    #[serde(default = "default_probe_delay_ms")]
    pub probe_delay_ms: u64,
    #[serde(default = "default_oracle_delay_ms")]
    pub oracle_delay_ms: u64,
    /// Transport attempts per probe; 1 means no retry.
    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,
    #[serde(default = "default_max_oracle_calls")]
    pub max_oracle_calls: u32,
}

impl Default for MaintenanceLimits {
    fn default() -> Self {
        Self {
            max_fail_count: default_max_fail_count(),
            auto_discover_languages: default_discover_languages(),
            max_feeds_per_language: default_max_feeds_per_language(),
            probe_delay_ms: default_probe_delay_ms(),
            oracle_delay_ms: default_oracle_delay_ms(),
            probe_attempts: default_probe_attempts(),
            max_oracle_calls: default_max_oracle_calls(),
        }
    }
}

/// Keyword-search API settings. The API key itself comes from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            language: default_language(),
            page_size: default_page_size(),
        }
    }
}

/// On-disk shape. Field order here is the key order of the written document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub keywords: Vec<String>,
    pub selection: SelectionLimits,
    #[serde(default)]
    pub maintenance: MaintenanceLimits,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub feeds: Vec<SourceDescriptor>,
}

/// Flattened, immutable limits for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    pub lookback_hours: u32,
    pub max_articles: usize,
    pub max_per_source: usize,
    pub keyword_score_cap: usize,
    pub max_fail_count: u32,
    pub per_language_cap: usize,
}

#[derive(Debug, Clone)]
pub struct SourceRegistry {
    path: Option<PathBuf>,
    doc: RegistryDocument,
}

impl SourceRegistry {
    /// Missing or invalid documents are fatal: there is no safe default policy.
    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading source registry {}", path.display()))?;
        let mut reg = Self::from_toml_str(&s)
            .with_context(|| format!("loading source registry {}", path.display()))?;
        reg.path = Some(path.to_path_buf());
        Ok(reg)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let doc: RegistryDocument = toml::from_str(s).context("parsing registry TOML")?;
        Self::from_document(doc)
    }

    pub fn from_document(doc: RegistryDocument) -> Result<Self> {
        validate(&doc)?;
        Ok(Self { path: None, doc })
    }

    pub fn document(&self) -> &RegistryDocument {
        &self.doc
    }

    pub fn feeds(&self) -> &[SourceDescriptor] {
        &self.doc.feeds
    }

    pub fn keywords(&self) -> &[String] {
        &self.doc.keywords
    }

    pub fn maintenance(&self) -> &MaintenanceLimits {
        &self.doc.maintenance
    }

    pub fn search(&self) -> &SearchSettings {
        &self.doc.search
    }

    pub fn config(&self) -> SelectionConfig {
        let s = &self.doc.selection;
        let m = &self.doc.maintenance;
        SelectionConfig {
            lookback_hours: s.lookback_hours,
            max_articles: s.max_articles,
            max_per_source: s.max_per_source,
            keyword_score_cap: s.keyword_score_cap,
            max_fail_count: m.max_fail_count,
            per_language_cap: m.max_feeds_per_language,
        }
    }

    pub fn find_by_url(&self, url: &str) -> Option<&SourceDescriptor> {
        self.doc.feeds.iter().find(|f| f.url == url)
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.find_by_url(url).is_some()
    }

    pub fn count_language(&self, language: &str) -> usize {
        self.doc
            .feeds
            .iter()
            .filter(|f| f.language == language)
            .count()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.doc.feeds.iter().map(|f| f.name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    /// Remove and return the descriptor with this url.
    pub fn remove_by_url(&mut self, url: &str) -> Option<SourceDescriptor> {
        let idx = self.doc.feeds.iter().position(|f| f.url == url)?;
        Some(self.doc.feeds.remove(idx))
    }

    /// Point an existing descriptor at a new url. Returns false if absent.
    pub fn replace_url(&mut self, old_url: &str, new_url: &str) -> bool {
        match self.doc.feeds.iter_mut().find(|f| f.url == old_url) {
            Some(f) => {
                f.url = new_url.to_string();
                true
            }
            None => false,
        }
    }

    /// Append a descriptor unless its url is already present.
    pub fn push(&mut self, feed: SourceDescriptor) -> bool {
        if self.contains_url(&feed.url) {
            return false;
        }
        self.doc.feeds.push(feed);
        true
    }

    /// Rewrite the document in place (atomic replace).
    pub fn commit(&self) -> Result<()> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| anyhow!("source registry has no backing file"))?;
        self.write_to(path)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let body = toml::to_string_pretty(&self.doc).context("serializing source registry")?;
        atomic_write(path, body.as_bytes())
            .with_context(|| format!("committing source registry {}", path.display()))
    }
}

fn validate(doc: &RegistryDocument) -> Result<()> {
    let s = &doc.selection;
    if s.lookback_hours == 0 {
        bail!("selection.lookback_hours must be > 0");
    }
    if s.lookback_hours > MAX_LOOKBACK_HOURS {
        bail!(
            "selection.lookback_hours must be <= {MAX_LOOKBACK_HOURS}, got {}",
            s.lookback_hours
        );
    }
    if s.max_articles == 0 {
        bail!("selection.max_articles must be > 0");
    }
    if s.max_per_source == 0 {
        bail!("selection.max_per_source must be > 0");
    }
    if doc.maintenance.max_fail_count == 0 {
        bail!("maintenance.max_fail_count must be > 0");
    }
    if doc.maintenance.probe_attempts == 0 {
        bail!("maintenance.probe_attempts must be > 0");
    }

    let mut urls = HashSet::new();
    for f in &doc.feeds {
        if f.name.trim().is_empty() {
            bail!("feed with url {} has an empty name", f.url);
        }
        if !(f.url.starts_with("http://") || f.url.starts_with("https://")) {
            bail!("feed {} has a non-http url: {}", f.name, f.url);
        }
        if !f.weight.is_finite() || f.weight < 0.0 {
            bail!("feed {} has an invalid weight {}", f.name, f.weight);
        }
        if !urls.insert(f.url.as_str()) {
            bail!("feed url listed twice: {}", f.url);
        }
    }
    Ok(())
}
