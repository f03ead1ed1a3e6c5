// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::article::Article;

/// One place articles come from: a feed, or the keyword-search API.
#[async_trait::async_trait]
pub trait ArticleSource: Send + Sync {
    /// Articles published within the lookback window ending at `now`.
    async fn fetch(&self, now: DateTime<Utc>) -> Result<Vec<Article>>;
    fn name(&self) -> &str;
}
