// src/maintain/discovery.rs
//! Per-language discovery of new feeds through the oracle.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::collections::HashSet;

use super::checker::probe;
use super::Pacing;
use crate::health::{HealthRecord, HealthStore};
use crate::ingest::transport::Transport;
use crate::oracle::decode::{decode_candidates, Candidate};
use crate::oracle::prompts::discovery_prompt;
use crate::oracle::Oracle;
use crate::registry::{clamp_weight, SourceDescriptor, SourceRegistry};

/// Candidates considered per language per run.
pub const MAX_CANDIDATES_PER_LANGUAGE: usize = 3;
/// Known names sent to the oracle in the exclusion list.
const MAX_KNOWN_NAMES_IN_PROMPT: usize = 10;
/// Names at or above this similarity count as the same source.
const NAME_SIMILARITY: f64 = 0.9;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CandidateOutcome {
    /// Live and appended to the roster.
    Added { candidate: Candidate },
    /// Live, reported for review only.
    Proposed { candidate: Candidate },
    Skipped {
        candidate: Candidate,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct LanguageRound {
    pub language: String,
    /// Roster entries in this language before the round.
    pub active: usize,
    pub cap: usize,
    /// No query was made because the language was at its cap.
    pub at_capacity: bool,
    pub outcomes: Vec<CandidateOutcome>,
}

impl LanguageRound {
    pub fn added(&self) -> impl Iterator<Item = &Candidate> {
        self.outcomes.iter().filter_map(|o| match o {
            CandidateOutcome::Added { candidate } => Some(candidate),
            _ => None,
        })
    }
}

pub fn is_known_name(name: &str, known: &[String]) -> bool {
    let name = name.trim().to_lowercase();
    known.iter().any(|k| {
        let k = k.trim().to_lowercase();
        k == name || strsim::normalized_levenshtein(&k, &name) >= NAME_SIMILARITY
    })
}

/// Run one discovery round per configured language. An unreachable oracle
/// ends the pass; rounds already finished are returned.
///
/// With `commit` set, live candidates are appended to the roster with a fresh
/// health record; otherwise they are only reported.
pub async fn discover_feeds(
    registry: &mut SourceRegistry,
    health: &mut HealthStore,
    transport: &dyn Transport,
    oracle: &dyn Oracle,
    pacing: &mut Pacing,
    commit: bool,
    now: DateTime<Utc>,
) -> Vec<LanguageRound> {
    let keywords = registry.keywords().to_vec();
    let languages = registry.maintenance().auto_discover_languages.clone();
    let cap = registry.maintenance().max_feeds_per_language;
    let mut rounds = Vec::with_capacity(languages.len());

    for language in languages {
        let active = registry.count_language(&language);
        let mut round = LanguageRound {
            language: language.clone(),
            active,
            cap,
            at_capacity: active >= cap,
            outcomes: Vec::new(),
        };
        if round.at_capacity {
            tracing::info!(target: "discovery", %language, active, cap, "language at capacity; skipping");
            rounds.push(round);
            continue;
        }

        let known = registry.names();
        let prompt_names: Vec<String> = known.iter().take(MAX_KNOWN_NAMES_IN_PROMPT).cloned().collect();
        pacing.oracle.wait().await;
        let reply = match oracle
            .ask(&discovery_prompt(&language, &keywords, &prompt_names))
            .await
        {
            Ok(reply) => reply,
            Err(_) => {
                tracing::warn!(target: "discovery", %language, "oracle unreachable; stopping discovery");
                break;
            }
        };
        let candidates = decode_candidates(reply.as_deref());
        let slots = cap - active;
        tracing::info!(target: "discovery", %language, slots, found = candidates.len(), "oracle candidates");

        let mut seen_urls = HashSet::new();
        for c in candidates.into_iter().take(MAX_CANDIDATES_PER_LANGUAGE.min(slots)) {
            let skip = |reason| CandidateOutcome::Skipped {
                candidate: c.clone(),
                reason,
            };
            let outcome = if registry.contains_url(&c.url) || !seen_urls.insert(c.url.clone()) {
                skip("url already known")
            } else if is_known_name(&c.name, &registry.names()) {
                skip("name already known")
            } else {
                pacing.probes.wait().await;
                if !probe(transport, &c.url, &pacing.retry).await.is_alive() {
                    skip("unhealthy")
                } else if commit {
                    let d = SourceDescriptor::new(&c.name, &c.url, &language, clamp_weight(c.weight));
                    if registry.push(d) {
                        health.put(&c.url, HealthRecord::fresh(&c.name, now));
                        counter!("curator_discovered_total", "language" => language.clone()).increment(1);
                        CandidateOutcome::Added { candidate: c.clone() }
                    } else {
                        skip("url already known")
                    }
                } else {
                    CandidateOutcome::Proposed { candidate: c.clone() }
                }
            };

            match &outcome {
                CandidateOutcome::Added { candidate } => {
                    tracing::info!(target: "discovery", %language, name = %candidate.name, url = %candidate.url, "added feed");
                }
                CandidateOutcome::Proposed { candidate } => {
                    tracing::info!(target: "discovery", %language, name = %candidate.name, url = %candidate.url, "candidate feed");
                }
                CandidateOutcome::Skipped { candidate, reason } => {
                    tracing::info!(target: "discovery", %language, name = %candidate.name, reason, "skipped candidate");
                }
            }
            round.outcomes.push(outcome);
        }
        rounds.push(round);
    }
    rounds
}
