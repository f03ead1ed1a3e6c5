// src/oracle/prompts.rs
use crate::registry::SourceDescriptor;

/// Human label for a language code as used in prompts.
pub fn language_label(code: &str) -> &str {
    match code {
        "en" => "English",
        "ja" => "Japanese (日本語)",
        "zh" => "Chinese (中文)",
        "ko" => "Korean (한국어)",
        "de" => "German (Deutsch)",
        "fr" => "French (Français)",
        "es" => "Spanish (Español)",
        other => other,
    }
}

pub fn repair_prompt(feed: &SourceDescriptor, keywords: &[String]) -> String {
    let topics = keywords
        .iter()
        .take(3)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "The RSS feed for '{name}' at URL '{url}' is no longer responding. \
         This is a {lang} news source about {topics}. \
         Please find the current, working RSS feed URL for this site. \
         Return ONLY the URL, nothing else. If you cannot find it, return 'NOT_FOUND'.",
        name = feed.name,
        url = feed.url,
        lang = language_label(&feed.language),
    )
}

pub fn discovery_prompt(language: &str, keywords: &[String], known_names: &[String]) -> String {
    let topics = keywords
        .iter()
        .take(5)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let known = if known_names.is_empty() {
        "(none)".to_string()
    } else {
        known_names.join(", ")
    };
    format!(
        "Find popular and reliable RSS feed URLs for {lang} news sites covering topics: {topics}. \
         Exclude these already-known sources: {known}. \
         Return a JSON array of objects with 'name', 'url', and 'weight' (1.0-1.3) fields. \
         Only include feeds that are currently active and frequently updated. \
         Return at most 3 new feeds. Return ONLY valid JSON, no markdown formatting.",
        lang = language_label(language),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_prompt_names_the_feed_and_sentinel() {
        let f = SourceDescriptor::new("Alpha", "https://alpha.test/rss", "ja", 1.0);
        let kws = vec!["AI".to_string(), "LLM".into(), "GPU".into(), "robots".into()];
        let p = repair_prompt(&f, &kws);
        assert!(p.contains("'Alpha'"));
        assert!(p.contains("https://alpha.test/rss"));
        assert!(p.contains("Japanese"));
        assert!(p.contains("AI, LLM, GPU"));
        assert!(!p.contains("robots"));
        assert!(p.contains("NOT_FOUND"));
    }

    #[test]
    fn discovery_prompt_lists_known_names() {
        let p = discovery_prompt("xx", &[], &["A".into(), "B".into()]);
        assert!(p.contains("xx news sites"));
        assert!(p.contains("A, B"));
    }
}
