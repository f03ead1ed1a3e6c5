// src/maintain/checker.rs
//! Liveness probes and the per-run health pass over the roster.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;

use super::Pacing;
use crate::backoff::Backoff;
use crate::health::HealthStore;
use crate::ingest::feed::parse_feed;
use crate::ingest::transport::{HttpBody, Transport};
use crate::registry::{SourceDescriptor, SourceRegistry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Alive { entries: usize },
    HttpStatus { status: u16 },
    NotAFeed,
    Transport { error: String },
}

impl ProbeOutcome {
    pub fn is_alive(&self) -> bool {
        matches!(self, ProbeOutcome::Alive { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            ProbeOutcome::Alive { .. } => "alive",
            ProbeOutcome::HttpStatus { .. } => "http_status",
            ProbeOutcome::NotAFeed => "not_a_feed",
            ProbeOutcome::Transport { .. } => "transport",
        }
    }
}

/// Success status and a body that parses as a feed (well-formed, or with entries).
pub fn classify(body: &HttpBody) -> ProbeOutcome {
    if !body.is_success() {
        return ProbeOutcome::HttpStatus {
            status: body.status,
        };
    }
    let feed = parse_feed(&body.text);
    if feed.is_valid_feed() {
        ProbeOutcome::Alive {
            entries: feed.entries.len(),
        }
    } else {
        ProbeOutcome::NotAFeed
    }
}

/// One check of `url`. Transport errors are retried per `retry`; all attempts
/// together are still a single check.
pub async fn probe(transport: &dyn Transport, url: &str, retry: &Backoff) -> ProbeOutcome {
    let mut attempts = 0u32;
    let outcome = loop {
        attempts += 1;
        match transport.get(url).await {
            Ok(body) => break classify(&body),
            Err(e) if retry.should_retry(attempts) => {
                let wait = retry.delay_for(attempts);
                tracing::debug!(target: "health", url, attempts, ?wait, error = %e, "probe retry");
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
            }
            Err(e) => {
                break ProbeOutcome::Transport {
                    error: format!("{e:#}"),
                }
            }
        }
    };
    counter!("curator_probes_total", "outcome" => outcome.label()).increment(1);
    outcome
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub name: String,
    pub url: String,
    pub outcome: ProbeOutcome,
    pub fail_count: u32,
}

/// A source that failed this run's check (Degraded or Evicted-this-run).
#[derive(Debug, Clone, Serialize)]
pub struct FailedSource {
    pub descriptor: SourceDescriptor,
    pub fail_count: u32,
    pub evicted: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub results: Vec<ProbeResult>,
    pub failed: Vec<FailedSource>,
    pub evicted: Vec<SourceDescriptor>,
}

/// Remove every roster entry whose fail count reached `max_fail_count`.
/// Health records stay in place.
pub fn evaluate_eviction(
    registry: &mut SourceRegistry,
    health: &HealthStore,
    max_fail_count: u32,
) -> Vec<SourceDescriptor> {
    let doomed: Vec<String> = registry
        .feeds()
        .iter()
        .filter(|f| health.fail_count(&f.url) >= max_fail_count)
        .map(|f| f.url.clone())
        .collect();

    let mut evicted = Vec::with_capacity(doomed.len());
    for url in doomed {
        if let Some(d) = registry.remove_by_url(&url) {
            tracing::warn!(
                target: "health",
                source = %d.name,
                url = %d.url,
                fail_count = health.fail_count(&url),
                max_fail_count,
                "evicting source"
            );
            counter!("curator_evictions_total").increment(1);
            evicted.push(d);
        }
    }
    evicted
}

/// Probe every roster entry in order, update health, then evict.
pub async fn run_health_checks(
    registry: &mut SourceRegistry,
    health: &mut HealthStore,
    transport: &dyn Transport,
    pacing: &mut Pacing,
    now: DateTime<Utc>,
) -> CheckReport {
    let max_fail_count = registry.config().max_fail_count;
    let mut report = CheckReport::default();

    for feed in registry.feeds().to_vec() {
        pacing.probes.wait().await;
        let outcome = probe(transport, &feed.url, &pacing.retry).await;

        let fail_count = if outcome.is_alive() {
            health.record_success(&feed.url, &feed.name, now);
            tracing::info!(target: "health", source = %feed.name, ?outcome, "feed ok");
            0
        } else {
            let n = health.record_failure(&feed.url, &feed.name, now);
            tracing::warn!(target: "health", source = %feed.name, url = %feed.url, ?outcome, fail_count = n, "feed check failed");
            report.failed.push(FailedSource {
                descriptor: feed.clone(),
                fail_count: n,
                evicted: false,
            });
            n
        };

        report.results.push(ProbeResult {
            name: feed.name.clone(),
            url: feed.url.clone(),
            outcome,
            fail_count,
        });
    }

    report.evicted = evaluate_eviction(registry, health, max_fail_count);
    for f in report.failed.iter_mut() {
        f.evicted = report.evicted.iter().any(|e| e.url == f.descriptor.url);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::transport::FixtureTransport;
    use std::time::Duration;

    const OK_FEED: &str = "<rss version=\"2.0\"><channel><item><title>x</title></item></channel></rss>";

    #[test]
    fn classify_needs_success_and_a_feed() {
        assert!(classify(&HttpBody::ok(OK_FEED)).is_alive());
        assert_eq!(
            classify(&HttpBody { status: 503, text: OK_FEED.into() }),
            ProbeOutcome::HttpStatus { status: 503 }
        );
        assert_eq!(classify(&HttpBody::ok("<html></html>")), ProbeOutcome::NotAFeed);
        assert_eq!(classify(&HttpBody::ok("")), ProbeOutcome::NotAFeed);
    }

    #[tokio::test]
    async fn transport_errors_are_retried_within_one_probe() {
        let t = FixtureTransport::new().with_error("https://down.test/rss", "timeout");
        let retry = Backoff::exponential(Duration::ZERO, Duration::ZERO, 3);
        let out = probe(&t, "https://down.test/rss", &retry).await;
        assert!(matches!(out, ProbeOutcome::Transport { .. }));
        assert_eq!(t.calls().len(), 3);
    }

    #[tokio::test]
    async fn http_errors_are_not_retried() {
        let t = FixtureTransport::new().with_body("https://gone.test/rss", 410, "");
        let retry = Backoff::exponential(Duration::ZERO, Duration::ZERO, 3);
        let out = probe(&t, "https://gone.test/rss", &retry).await;
        assert_eq!(out, ProbeOutcome::HttpStatus { status: 410 });
        assert_eq!(t.calls().len(), 1);
    }
}
