// src/oracle/decode.rs
//! Lenient decoders for oracle free text.
//!
//! Oracle output is untrusted. Every decoder here has a defined "nothing"
//! value (`None` / empty `Vec`) and never returns an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

/// Sentinel the repair prompt asks for when no feed can be found.
pub const NOT_FOUND: &str = "NOT_FOUND";

static RE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"'`)\]]+"#).expect("url regex"));
static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[A-Za-z0-9_-]*").expect("fence regex"));

/// A feed proposed by the oracle, before any liveness check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub name: String,
    pub url: String,
    pub weight: f64,
}

/// First http(s) URL literal in `text`, minus trailing sentence punctuation.
pub fn extract_first_url(text: &str) -> Option<String> {
    RE_URL.find_iter(text).find_map(|m| {
        let url = m
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', '*', '}']);
        let host = url.split("://").nth(1).unwrap_or_default();
        if host.is_empty() {
            None
        } else {
            Some(url.to_string())
        }
    })
}

/// Repair answer: exactly one URL, or nothing.
pub fn decode_repair(reply: Option<&str>) -> Option<String> {
    let text = reply?.trim();
    if text.is_empty() || text.contains(NOT_FOUND) {
        return None;
    }
    extract_first_url(text)
}

/// Remove markdown code fences (```json … ```), keep what is inside.
pub fn strip_fences(text: &str) -> String {
    RE_FENCE.replace_all(text, "").trim().to_string()
}

/// Discovery answer: a JSON list of `{name, url, weight}`. Items missing a
/// name or an http url are dropped; anything unparseable yields no candidates.
pub fn decode_candidates(reply: Option<&str>) -> Vec<Candidate> {
    let Some(text) = reply else {
        return Vec::new();
    };
    let body = strip_fences(text);
    let Some(value) = parse_lenient(&body) else {
        tracing::debug!(target: "oracle", "discovery reply is not JSON");
        return Vec::new();
    };

    let items = match value {
        Value::Array(items) => items,
        // {"feeds": [...]} and similar single-wrapper shapes
        Value::Object(map) => match map.into_iter().find_map(|(_, v)| match v {
            Value::Array(items) => Some(items),
            _ => None,
        }) {
            Some(items) => items,
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items.iter().filter_map(candidate_from).collect()
}

fn parse_lenient(body: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        return Some(v);
    }
    // prose around the list: take the outermost [...]
    let start = body.find('[')?;
    let end = body.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&body[start..=end]).ok()
}

fn candidate_from(item: &Value) -> Option<Candidate> {
    let obj = item.as_object()?;
    let name = obj.get("name")?.as_str()?.trim();
    let url = obj.get("url")?.as_str()?.trim();
    if name.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
        return None;
    }
    let weight = match obj.get("weight") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|w| w.is_finite())
    .unwrap_or(1.0);

    Some(Candidate {
        name: name.to_string(),
        url: url.to_string(),
        weight,
    })
}
