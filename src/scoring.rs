// src/scoring.rs
//! Keyword relevance. One point per distinct keyword found (case-insensitive)
//! in title + summary, capped, plus the article's base score.

use crate::article::Article;

/// Keyword hits for `text`, counting each keyword at most once.
pub fn keyword_hits(text: &str, keywords: &[String]) -> usize {
    let hay = text.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty() && hay.contains(k.as_str()))
        .count()
}

/// Final score: base (source weight, already bounded at creation) plus the
/// keyword hits, the latter capped at `cap`.
pub fn score(article: &Article, keywords: &[String], cap: usize) -> f64 {
    let hits = keyword_hits(&article.scoring_text(), keywords).min(cap);
    article.score + hits as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::Origin;
    use chrono::Utc;

    fn art(title: &str, summary: &str, base: f64) -> Article {
        Article {
            title: title.into(),
            url: "https://x.test".into(),
            summary: summary.into(),
            published_at: Utc::now(),
            source_name: "X".into(),
            origin: Origin::Feed,
            score: base,
        }
    }

    fn kws(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn one_point_per_keyword_not_per_occurrence() {
        let a = art("AI AI AI", "more ai", 0.0);
        assert_eq!(score(&a, &kws(&["ai"]), 10), 1.0);
    }

    #[test]
    fn case_insensitive_and_base_added() {
        let a = art("OpenAI ships new LLM", "", 1.2);
        let s = score(&a, &kws(&["openai", "llm", "robotics"]), 10);
        assert!((s - 3.2).abs() < 1e-9);
    }

    #[test]
    fn keyword_contribution_is_capped() {
        let a = art("a b c d e f", "", 0.0);
        assert_eq!(score(&a, &kws(&["a", "b", "c", "d", "e", "f"]), 3), 3.0);
    }

    #[test]
    fn blank_keywords_are_ignored() {
        let a = art("anything", "", 0.0);
        assert_eq!(keyword_hits(&a.title, &kws(&["", "  "])), 0);
    }
}
