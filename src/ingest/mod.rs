// src/ingest/mod.rs
pub mod feed;
pub mod providers;
pub mod transport;
pub mod types;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;

use crate::article::Article;
use crate::backoff::Pacer;
use crate::ingest::types::ArticleSource;

/// Longest title/summary kept after normalization.
pub const MAX_TEXT_CHARS: usize = 1500;

/// Normalize feed text: decode entities, strip tags, ASCII quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }

    out
}

/// Fetch every source in order. A failing source contributes nothing and is
/// logged; it never stops the others. Order of the output follows `sources`.
pub async fn fetch_all(
    sources: &[Box<dyn ArticleSource>],
    now: DateTime<Utc>,
    pacer: &mut Pacer,
) -> Vec<Article> {
    crate::metrics::ensure_described();

    let mut all = Vec::new();
    for src in sources {
        pacer.wait().await;
        let t0 = std::time::Instant::now();
        match src.fetch(now).await {
            Ok(mut v) => {
                tracing::debug!(target: "ingest", source = src.name(), count = v.len(), "fetched");
                counter!("curator_articles_fetched_total").increment(v.len() as u64);
                all.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = %format!("{e:#}"), source = src.name(), "source fetch failed");
                counter!("curator_fetch_errors_total").increment(1);
            }
        }
        histogram!("curator_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    }
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::Origin;
    use anyhow::anyhow;
    use chrono::TimeZone;

    #[test]
    fn normalize_text_strips_markup_and_whitespace() {
        let s = "  <p>Hello,&nbsp;&nbsp; <b>world</b>!</p>\n\n “quoted” ";
        assert_eq!(normalize_text(s), "Hello, world ! \"quoted\"");
    }

    #[test]
    fn normalize_text_caps_length() {
        let long = "a".repeat(MAX_TEXT_CHARS + 10);
        assert_eq!(normalize_text(&long).chars().count(), MAX_TEXT_CHARS);
    }

    struct Fixed(&'static str, bool);

    #[async_trait::async_trait]
    impl ArticleSource for Fixed {
        async fn fetch(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Article>> {
            if !self.1 {
                return Err(anyhow!("boom"));
            }
            Ok(vec![Article {
                title: self.0.into(),
                url: format!("https://{}.test/a", self.0),
                summary: String::new(),
                published_at: now,
                source_name: self.0.into(),
                origin: Origin::Feed,
                score: 1.0,
            }])
        }
        fn name(&self) -> &str {
            self.0
        }
    }

    #[tokio::test]
    async fn failing_source_is_isolated() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap();
        let sources: Vec<Box<dyn ArticleSource>> = vec![
            Box::new(Fixed("one", true)),
            Box::new(Fixed("bad", false)),
            Box::new(Fixed("two", true)),
        ];
        let got = fetch_all(&sources, now, &mut Pacer::none()).await;
        let names: Vec<_> = got.iter().map(|a| a.source_name.as_str()).collect();
        assert_eq!(names, vec!["one", "two"]);
    }
}
