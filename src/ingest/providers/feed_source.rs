// src/ingest/providers/feed_source.rs
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::article::{Article, Origin};
use crate::ingest::feed::{parse_feed, ParsedFeed};
use crate::ingest::normalize_text;
use crate::ingest::transport::Transport;
use crate::ingest::types::ArticleSource;
use crate::registry::SourceDescriptor;

/// One registry feed, fetched over the shared transport.
pub struct FeedSource {
    descriptor: SourceDescriptor,
    lookback: Duration,
    transport: Arc<dyn Transport>,
}

impl FeedSource {
    pub fn new(descriptor: SourceDescriptor, lookback_hours: u32, transport: Arc<dyn Transport>) -> Self {
        Self {
            descriptor,
            lookback: Duration::try_hours(i64::from(lookback_hours)).unwrap_or(Duration::MAX),
            transport,
        }
    }

    /// Turn parsed entries into articles: link and date required, inside the window.
    pub fn articles_from(&self, feed: ParsedFeed, now: DateTime<Utc>) -> Vec<Article> {
        let cutoff = now.checked_sub_signed(self.lookback).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let base = self.descriptor.effective_weight();
        let mut out = Vec::with_capacity(feed.entries.len());

        for entry in feed.entries {
            let Some(url) = entry.link else { continue };
            let Some(published_at) = entry.published else { continue };
            if published_at < cutoff {
                continue;
            }
            out.push(Article {
                title: normalize_text(&entry.title),
                url,
                summary: normalize_text(&entry.summary),
                published_at,
                source_name: self.descriptor.name.clone(),
                origin: Origin::Feed,
                score: base,
            });
        }
        out
    }
}

#[async_trait]
impl ArticleSource for FeedSource {
    async fn fetch(&self, now: DateTime<Utc>) -> Result<Vec<Article>> {
        let body = self.transport.get(&self.descriptor.url).await?;
        if !body.is_success() {
            bail!("HTTP {} from {}", body.status, self.descriptor.url);
        }
        let feed = parse_feed(&body.text);
        if !feed.is_valid_feed() {
            bail!("not a parseable feed: {}", self.descriptor.url);
        }
        Ok(self.articles_from(feed, now))
    }

    fn name(&self) -> &str {
        &self.descriptor.name
    }
}
