// tests/selection.rs
//
// Selection behaviour end to end: feeds served from fixtures, scoring,
// dedup, history exclusion and the per-source cap.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use news_curator::article::{Article, Origin};
use news_curator::backoff::Pacer;
use news_curator::history::HistoryStore;
use news_curator::ingest::transport::FixtureTransport;
use news_curator::pipeline;
use news_curator::registry::SourceRegistry;
use news_curator::selector;

const TECH_XML: &str = include_str!("fixtures/rss2_tech.xml");

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap()
}

fn registry(max_articles: usize, max_per_source: usize, feeds: &[(&str, &str, f64)]) -> SourceRegistry {
    let mut doc = format!(
        r#"keywords = ["AI", "LLM", "GPU"]

[selection]
lookback_hours = 24
max_articles = {max_articles}
max_per_source = {max_per_source}

[search]
enabled = false
"#
    );
    for (name, url, weight) in feeds {
        doc.push_str(&format!(
            "\n[[feeds]]\nname = \"{name}\"\nurl = \"{url}\"\nweight = {weight:?}\n"
        ));
    }
    SourceRegistry::from_toml_str(&doc).expect("valid registry")
}

fn art(source: &str, url: &str, title: &str, base: f64, hours_ago: i64) -> Article {
    Article {
        title: title.to_string(),
        url: url.to_string(),
        summary: String::new(),
        published_at: now() - Duration::hours(hours_ago),
        source_name: source.to_string(),
        origin: Origin::Feed,
        score: base,
    }
}

fn rss(items: &[(&str, &str, &str)]) -> String {
    let mut s = String::from("<rss version=\"2.0\"><channel><title>t</title>");
    for (title, link, date) in items {
        s.push_str(&format!(
            "<item><title>{title}</title><link>{link}</link><pubDate>{date}</pubDate></item>"
        ));
    }
    s.push_str("</channel></rss>");
    s
}

#[tokio::test]
async fn fixture_feed_yields_only_linked_articles_inside_the_window() {
    let reg = registry(10, 10, &[("Tech Wire", "https://techwire.test/rss", 1.0)]);
    let t = Arc::new(FixtureTransport::new().with_body("https://techwire.test/rss", 200, TECH_XML));

    let picked = pipeline::select_articles(&reg, &HistoryStore::default(), t, &mut Pacer::none(), now()).await;

    let urls: Vec<&str> = picked.iter().map(|a| a.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://techwire.test/2025/03/llm-benchmark",
            "https://techwire.test/2025/03/gpu-capacity",
        ]
    );
    // weight 1.0 + "LLM" + "AI"
    assert_eq!(picked[0].score, 3.0);
    assert_eq!(picked[0].summary, "The open LLM beats rivals on AI reasoning tests.");
    assert_eq!(picked[1].title, "Chip makers expand GPU capacity");
}

#[tokio::test]
async fn first_declared_source_wins_a_shared_url() {
    // Scenario A: same url from two feeds with different weights.
    let reg = registry(
        10,
        10,
        &[
            ("Alpha", "https://alpha.test/rss", 0.5),
            ("Beta", "https://beta.test/rss", 2.0),
        ],
    );
    let shared = ("AI story", "https://shared.test/story", "Tue, 04 Mar 2025 10:00:00 GMT");
    let t = Arc::new(
        FixtureTransport::new()
            .with_body("https://alpha.test/rss", 200, &rss(&[shared]))
            .with_body("https://beta.test/rss", 200, &rss(&[shared])),
    );

    let picked = pipeline::select_articles(&reg, &HistoryStore::default(), t, &mut Pacer::none(), now()).await;

    assert_eq!(picked.len(), 1);
    assert_eq!(picked[0].source_name, "Alpha");
    assert_eq!(picked[0].score, 1.5);
}

#[test]
fn per_source_cap_backfills_from_other_sources() {
    // Scenario B: X holds four of the top five.
    let reg = registry(5, 2, &[]);
    let articles = vec![
        art("X", "https://x.test/1", "AI one", 1.5, 1),
        art("X", "https://x.test/2", "AI two", 1.5, 2),
        art("X", "https://x.test/3", "AI three", 1.5, 3),
        art("X", "https://x.test/4", "AI four", 1.5, 4),
        art("Y", "https://y.test/1", "AI y1", 1.0, 1),
        art("Y", "https://y.test/2", "AI y2", 1.0, 2),
        art("Z", "https://z.test/1", "AI z1", 1.0, 3),
        art("W", "https://w.test/1", "nothing relevant", 1.0, 0),
    ];

    let picked = selector::select(articles, &HistoryStore::default(), reg.keywords(), &reg.config());

    let urls: Vec<&str> = picked.iter().map(|a| a.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://x.test/1",
            "https://x.test/2",
            "https://y.test/1",
            "https://y.test/2",
            "https://z.test/1",
        ]
    );
}

#[test]
fn selection_respects_caps_history_and_uniqueness() {
    let reg = registry(7, 3, &[]);
    let history = HistoryStore::in_memory(["https://s0.test/0", "https://s2.test/4"]);

    let mut articles = Vec::new();
    for s in 0..4 {
        for i in 0..6 {
            let title = if i % 2 == 0 { "AI and GPU" } else { "markets" };
            articles.push(art(
                &format!("S{s}"),
                &format!("https://s{s}.test/{i}"),
                title,
                0.25 * s as f64,
                i,
            ));
        }
    }
    // duplicate url from another source
    articles.push(art("S3", "https://s1.test/0", "AI LLM GPU", 2.0, 0));

    let picked = selector::select(articles.clone(), &history, reg.keywords(), &reg.config());

    assert!(picked.len() <= 7);
    let mut per_source: HashMap<&str, usize> = HashMap::new();
    for a in &picked {
        *per_source.entry(a.source_name.as_str()).or_default() += 1;
        assert!(!history.contains(&a.url), "{} is in history", a.url);
    }
    assert!(per_source.values().all(|&n| n <= 3));

    let mut urls: Vec<&str> = picked.iter().map(|a| a.url.as_str()).collect();
    let total = urls.len();
    urls.sort();
    urls.dedup();
    assert_eq!(urls.len(), total);

    // the later duplicate of s1/0 never replaces the first copy
    if let Some(a) = picked.iter().find(|a| a.url == "https://s1.test/0") {
        assert_eq!(a.source_name, "S1");
    }

    // ranked by (score desc, published desc)
    for w in picked.windows(2) {
        assert!(
            w[0].score > w[1].score
                || (w[0].score == w[1].score && w[0].published_at >= w[1].published_at)
        );
    }

    // deterministic
    let again = selector::select(articles, &history, reg.keywords(), &reg.config());
    assert_eq!(picked, again);
}

#[tokio::test]
async fn failing_feed_does_not_block_the_others() {
    let reg = registry(
        10,
        10,
        &[
            ("Down", "https://down.test/rss", 1.0),
            ("Broken", "https://broken.test/rss", 1.0),
            ("Up", "https://up.test/rss", 1.0),
        ],
    );
    let t = Arc::new(
        FixtureTransport::new()
            .with_error("https://down.test/rss", "connection reset")
            .with_body("https://broken.test/rss", 500, "oops")
            .with_body(
                "https://up.test/rss",
                200,
                &rss(&[("AI news", "https://up.test/a", "Tue, 04 Mar 2025 11:00:00 GMT")]),
            ),
    );

    let picked = pipeline::select_articles(&reg, &HistoryStore::default(), t, &mut Pacer::none(), now()).await;
    assert_eq!(picked.len(), 1);
    assert_eq!(picked[0].source_name, "Up");
}

#[tokio::test]
async fn committed_urls_are_excluded_from_the_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let history_path = dir.path().join("state").join("seen_urls.txt");

    let reg = registry(10, 10, &[("Tech Wire", "https://techwire.test/rss", 1.0)]);
    let t = Arc::new(FixtureTransport::new().with_body("https://techwire.test/rss", 200, TECH_XML));

    let mut history = HistoryStore::load(&history_path).unwrap();
    let first = pipeline::select_articles(&reg, &history, t.clone(), &mut Pacer::none(), now()).await;
    assert_eq!(first.len(), 2);

    // selecting alone never writes history
    assert!(!history_path.exists());

    let added = pipeline::commit_seen(&mut history, [first[0].url.clone()]).unwrap();
    assert_eq!(added, 1);

    let reloaded = HistoryStore::load(&history_path).unwrap();
    let second = pipeline::select_articles(&reg, &reloaded, t, &mut Pacer::none(), now()).await;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].url, first[1].url);
}

#[test]
fn history_write_failure_reaches_the_caller() {
    let dir = tempfile::tempdir().unwrap();
    let history_path = dir.path().join("seen_urls.txt");
    let mut history = HistoryStore::load(&history_path).unwrap();
    std::fs::create_dir(&history_path).unwrap();

    let err = pipeline::commit_seen(&mut history, ["https://a.test/1"]).unwrap_err();
    assert!(format!("{err:#}").contains("saving url history"));
}
