// src/maintain/repair.rs
//! Ask the oracle for a replacement URL for each source that failed this run.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;

use super::checker::FailedSource;
use super::Pacing;
use crate::health::{HealthRecord, HealthStore};
use crate::oracle::decode::decode_repair;
use crate::oracle::prompts::repair_prompt;
use crate::oracle::Oracle;
use crate::registry::SourceRegistry;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RepairOutcome {
    Repaired {
        name: String,
        old_url: String,
        new_url: String,
        /// The source had been evicted this run and is back in the roster.
        reinstated: bool,
    },
    NotRepaired {
        name: String,
        url: String,
        reason: &'static str,
    },
}

impl RepairOutcome {
    pub fn is_repaired(&self) -> bool {
        matches!(self, RepairOutcome::Repaired { .. })
    }
}

/// One oracle query per failed source, in the order they failed. Stops at the
/// first unreachable-oracle error; later sources get no outcome.
///
/// A usable answer moves the source to the new URL with a fresh health record.
/// Evicted sources are appended back to the roster; degraded ones keep their
/// position.
pub async fn repair_failed(
    failed: &[FailedSource],
    registry: &mut SourceRegistry,
    health: &mut HealthStore,
    oracle: &dyn Oracle,
    pacing: &mut Pacing,
    now: DateTime<Utc>,
) -> Vec<RepairOutcome> {
    let keywords = registry.keywords().to_vec();
    let mut outcomes = Vec::with_capacity(failed.len());

    for f in failed {
        let d = &f.descriptor;
        let not_repaired = |reason| RepairOutcome::NotRepaired {
            name: d.name.clone(),
            url: d.url.clone(),
            reason,
        };

        pacing.oracle.wait().await;
        let reply = match oracle.ask(&repair_prompt(d, &keywords)).await {
            Ok(reply) => reply,
            Err(_) => {
                tracing::warn!(target: "repair", source = %d.name, "oracle unreachable; stopping repairs");
                outcomes.push(not_repaired("oracle unreachable"));
                break;
            }
        };

        let outcome = match decode_repair(reply.as_deref()) {
            None => not_repaired("no url found"),
            Some(new_url) if new_url == d.url => not_repaired("same url"),
            Some(new_url) if registry.contains_url(&new_url) => not_repaired("url already in roster"),
            Some(new_url) => {
                let applied = if f.evicted {
                    let mut back = d.clone();
                    back.url = new_url.clone();
                    registry.push(back)
                } else {
                    registry.replace_url(&d.url, &new_url)
                };
                if applied {
                    health.remove(&d.url);
                    health.put(&new_url, HealthRecord::fresh(&d.name, now));
                    counter!("curator_repairs_total").increment(1);
                    RepairOutcome::Repaired {
                        name: d.name.clone(),
                        old_url: d.url.clone(),
                        new_url,
                        reinstated: f.evicted,
                    }
                } else {
                    not_repaired("source no longer in roster")
                }
            }
        };

        match &outcome {
            RepairOutcome::Repaired { name, new_url, reinstated, .. } => {
                tracing::info!(target: "repair", source = %name, %new_url, reinstated, "repaired feed url");
            }
            RepairOutcome::NotRepaired { name, reason, .. } => {
                tracing::info!(target: "repair", source = %name, reason, "no repair");
            }
        }
        outcomes.push(outcome);
    }
    outcomes
}
