// src/article.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an article came from. Search-API hits carry no source weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    SearchApi,
    Feed,
}

/// One news item for the current run. Identity is the `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
    pub origin: Origin,
    /// Base score on creation (source weight); final score after selection.
    pub score: f64,
}

impl Article {
    /// Text the scorer looks at.
    pub fn scoring_text(&self) -> String {
        format!("{} {}", self.title, self.summary)
    }
}
