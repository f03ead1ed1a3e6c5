// src/pipeline.rs
//! Selection run: build sources from the registry, fetch, select.
//!
//! Selecting never touches the history file. The caller records the urls it
//! actually used with [`commit_seen`] once downstream processing succeeded.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::gauge;
use std::sync::Arc;

use crate::article::Article;
use crate::backoff::Pacer;
use crate::history::HistoryStore;
use crate::ingest::fetch_all;
use crate::ingest::providers::feed_source::FeedSource;
use crate::ingest::providers::newsapi::NewsApiSource;
use crate::ingest::transport::Transport;
use crate::ingest::types::ArticleSource;
use crate::registry::SourceRegistry;
use crate::selector::select_with_stats;

/// Search source first (when configured), then every roster feed in order.
pub fn build_sources(
    registry: &SourceRegistry,
    transport: Arc<dyn Transport>,
) -> Vec<Box<dyn ArticleSource>> {
    let lookback = registry.config().lookback_hours;
    let mut sources: Vec<Box<dyn ArticleSource>> = Vec::with_capacity(registry.feeds().len() + 1);

    match NewsApiSource::from_env(registry.keywords(), registry.search(), lookback, transport.clone()) {
        Some(s) => sources.push(Box::new(s)),
        None => tracing::info!(target: "pipeline", "keyword search disabled (no key, no keywords or turned off)"),
    }
    for feed in registry.feeds() {
        sources.push(Box::new(FeedSource::new(feed.clone(), lookback, transport.clone())));
    }
    sources
}

/// Fetch from `sources` and select against `history`.
pub async fn select_from(
    sources: &[Box<dyn ArticleSource>],
    registry: &SourceRegistry,
    history: &HistoryStore,
    pacer: &mut Pacer,
    now: DateTime<Utc>,
) -> Vec<Article> {
    let fetched = fetch_all(sources, now, pacer).await;
    select_fetched(fetched, registry, history)
}

/// Fetch every source the registry describes. No history involved.
pub async fn fetch_candidates(
    registry: &SourceRegistry,
    transport: Arc<dyn Transport>,
    pacer: &mut Pacer,
    now: DateTime<Utc>,
) -> Vec<Article> {
    let sources = build_sources(registry, transport);
    fetch_all(&sources, now, pacer).await
}

/// Dedup, drop seen urls, rank and cap already-fetched articles.
pub fn select_fetched(
    fetched: Vec<Article>,
    registry: &SourceRegistry,
    history: &HistoryStore,
) -> Vec<Article> {
    let config = registry.config();
    let (picked, stats) = select_with_stats(fetched, history, registry.keywords(), &config);

    gauge!("curator_selected_articles").set(stats.selected as f64);
    tracing::info!(
        target: "pipeline",
        input = stats.input,
        duplicates = stats.duplicates,
        already_seen = stats.already_seen,
        capped_out = stats.capped_out,
        selected = stats.selected,
        "selection done"
    );
    picked
}

pub async fn select_articles(
    registry: &SourceRegistry,
    history: &HistoryStore,
    transport: Arc<dyn Transport>,
    pacer: &mut Pacer,
    now: DateTime<Utc>,
) -> Vec<Article> {
    let sources = build_sources(registry, transport);
    select_from(&sources, registry, history, pacer, now).await
}

/// Record `urls` as used and persist. Returns how many were new.
pub fn commit_seen<I, S>(history: &mut HistoryStore, urls: I) -> Result<usize>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let added = history.record(urls);
    history.commit().context("saving url history")?;
    Ok(added)
}
