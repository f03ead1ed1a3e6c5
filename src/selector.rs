// src/selector.rs
//! Deduplicate, drop already-seen urls, rank, and take a per-source capped slice.
//!
//! Pure: given the same inputs the output is identical. History is only read;
//! recording what was used is the caller's job (see `pipeline::commit_seen`).

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::article::Article;
use crate::history::HistoryStore;
use crate::registry::SelectionConfig;
use crate::scoring;

/// Counts from one selection pass, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionStats {
    pub input: usize,
    pub duplicates: usize,
    pub already_seen: usize,
    pub capped_out: usize,
    pub selected: usize,
}

/// (score desc, published_at desc).
pub fn rank_order(a: &Article, b: &Article) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.published_at.cmp(&a.published_at))
}

pub fn select(
    articles: Vec<Article>,
    history: &HistoryStore,
    keywords: &[String],
    config: &SelectionConfig,
) -> Vec<Article> {
    select_with_stats(articles, history, keywords, config).0
}

pub fn select_with_stats(
    articles: Vec<Article>,
    history: &HistoryStore,
    keywords: &[String],
    config: &SelectionConfig,
) -> (Vec<Article>, SelectionStats) {
    let mut stats = SelectionStats {
        input: articles.len(),
        ..SelectionStats::default()
    };

    // 1) first occurrence of each url wins
    let mut seen_urls: HashSet<String> = HashSet::with_capacity(articles.len());
    let mut unique = Vec::with_capacity(articles.len());
    for a in articles {
        if a.url.is_empty() || !seen_urls.insert(a.url.clone()) {
            stats.duplicates += 1;
            continue;
        }
        unique.push(a);
    }

    // 2) drop repeats from earlier runs, 3) score
    let mut eligible: Vec<Article> = Vec::with_capacity(unique.len());
    for mut a in unique {
        if history.contains(&a.url) {
            stats.already_seen += 1;
            continue;
        }
        a.score = scoring::score(&a, keywords, config.keyword_score_cap);
        eligible.push(a);
    }

    // 4) rank; stable sort keeps input order for full ties
    eligible.sort_by(rank_order);

    // 5) greedy walk under the per-source cap
    let mut per_source: HashMap<String, usize> = HashMap::new();
    let mut picked = Vec::with_capacity(config.max_articles.min(eligible.len()));
    for a in eligible {
        if picked.len() >= config.max_articles {
            break;
        }
        let n = per_source.entry(a.source_name.clone()).or_insert(0);
        if *n >= config.max_per_source {
            stats.capped_out += 1;
            continue;
        }
        *n += 1;
        picked.push(a);
    }

    stats.selected = picked.len();
    (picked, stats)
}
