// src/ingest/providers/newsapi.rs
//! Keyword-search source backed by the NewsAPI `everything` endpoint.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::article::{Article, Origin};
use crate::ingest::feed::parse_timestamp;
use crate::ingest::normalize_text;
use crate::ingest::transport::Transport;
use crate::ingest::types::ArticleSource;
use crate::registry::SearchSettings;

pub const NEWSAPI_ENDPOINT: &str = "https://newsapi.org/v2/everything";
pub const ENV_NEWS_API_KEY: &str = "NEWS_API_KEY";

#[derive(Debug, Deserialize)]
struct Resp {
    #[serde(default)]
    articles: Vec<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    #[serde(default)]
    source: Option<ItemSource>,
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    name: Option<String>,
}

pub struct NewsApiSource {
    api_key: String,
    keywords: Vec<String>,
    settings: SearchSettings,
    lookback: Duration,
    endpoint: String,
    transport: Arc<dyn Transport>,
}

impl NewsApiSource {
    pub fn new(
        api_key: &str,
        keywords: &[String],
        settings: &SearchSettings,
        lookback_hours: u32,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            api_key: api_key.to_string(),
            keywords: keywords.to_vec(),
            settings: settings.clone(),
            lookback: Duration::try_hours(i64::from(lookback_hours)).unwrap_or(Duration::MAX),
            endpoint: NEWSAPI_ENDPOINT.to_string(),
            transport,
        }
    }

    /// `None` unless the search is enabled, there are keywords and a key is set.
    pub fn from_env(
        keywords: &[String],
        settings: &SearchSettings,
        lookback_hours: u32,
        transport: Arc<dyn Transport>,
    ) -> Option<Self> {
        let key = std::env::var(ENV_NEWS_API_KEY).ok().filter(|k| !k.trim().is_empty())?;
        if !settings.enabled || keywords.is_empty() {
            return None;
        }
        Some(Self::new(&key, keywords, settings, lookback_hours, transport))
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.lookback).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn request_url(&self, now: DateTime<Utc>) -> Result<String> {
        let since = self.cutoff(now).to_rfc3339_opts(SecondsFormat::Secs, true);
        let query = self.keywords.join(" OR ");
        let page_size = self.settings.page_size.to_string();
        let url = reqwest::Url::parse_with_params(
            &self.endpoint,
            &[
                ("q", query.as_str()),
                ("language", self.settings.language.as_str()),
                ("from", since.as_str()),
                ("pageSize", page_size.as_str()),
                ("sortBy", "publishedAt"),
                ("apiKey", self.api_key.as_str()),
            ],
        )
        .context("building search url")?;
        Ok(url.to_string())
    }

    fn articles_from(&self, body: &str, now: DateTime<Utc>) -> Result<Vec<Article>> {
        let resp: Resp = serde_json::from_str(body).context("parsing search response")?;
        let cutoff = self.cutoff(now);
        let mut out = Vec::with_capacity(resp.articles.len());

        for it in resp.articles {
            let Some(url) = it.url.filter(|u| !u.trim().is_empty()) else {
                continue;
            };
            let title = it.title.unwrap_or_default();
            if title.contains("[Removed]") {
                continue;
            }
            let Some(published_at) = it.published_at.as_deref().and_then(parse_timestamp) else {
                continue;
            };
            if published_at < cutoff {
                continue;
            }
            let summary = it
                .description
                .filter(|d| !d.trim().is_empty())
                .or(it.content)
                .unwrap_or_default();
            let source_name = it
                .source
                .and_then(|s| s.name)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "NewsAPI".to_string());

            out.push(Article {
                title: normalize_text(&title),
                url,
                summary: normalize_text(&summary),
                published_at,
                source_name,
                origin: Origin::SearchApi,
                score: 0.0,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl ArticleSource for NewsApiSource {
    async fn fetch(&self, now: DateTime<Utc>) -> Result<Vec<Article>> {
        let url = self.request_url(now)?;
        let body = self.transport.get(&url).await.context("search request")?;
        if !body.is_success() {
            // body may echo the key back; log the status only
            bail!("search API returned HTTP {}", body.status);
        }
        self.articles_from(&body.text, now)
    }

    fn name(&self) -> &str {
        "NewsAPI"
    }
}
