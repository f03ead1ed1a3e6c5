// src/maintain/mod.rs
//! Maintenance run: health check, eviction, oracle repair, oracle discovery.
//!
//! Everything mutates the in-memory registry and health store; [`commit`]
//! writes both back unless the run was a dry run.

pub mod checker;
pub mod discovery;
pub mod repair;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::backoff::{Backoff, Pacer};
use crate::health::HealthStore;
use crate::ingest::transport::Transport;
use crate::oracle::{BudgetedOracle, DynOracle};
use crate::registry::{MaintenanceLimits, SourceRegistry};

use checker::{run_health_checks, CheckReport};
use discovery::{discover_feeds, LanguageRound};
use repair::{repair_failed, RepairOutcome};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceOptions {
    pub dry_run: bool,
    pub auto_add: bool,
    pub skip_grounding: bool,
}

/// Sleeps between outbound calls and the probe retry policy.
#[derive(Debug, Clone)]
pub struct Pacing {
    pub probes: Pacer,
    pub oracle: Pacer,
    pub retry: Backoff,
}

impl Pacing {
    pub fn from_limits(limits: &MaintenanceLimits) -> Self {
        Self {
            probes: Pacer::from_millis(limits.probe_delay_ms),
            oracle: Pacer::from_millis(limits.oracle_delay_ms),
            retry: Backoff::exponential(
                Duration::from_secs(1),
                Duration::from_secs(8),
                limits.probe_attempts,
            ),
        }
    }

    /// No sleeping at all, one attempt per probe.
    pub fn none() -> Self {
        Self {
            probes: Pacer::none(),
            oracle: Pacer::none(),
            retry: Backoff::none(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Repair,
    Discovery,
}

const ORACLE_UNREACHABLE: &str = "oracle unreachable";

/// A phase that did not run, or was cut short, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPhase {
    pub phase: Phase,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintenanceReport {
    pub dry_run: bool,
    pub check: CheckReport,
    pub repairs: Vec<RepairOutcome>,
    pub discovery: Vec<LanguageRound>,
    pub skipped_phases: Vec<SkippedPhase>,
    pub oracle_calls: u32,
    /// Roster size after the run.
    pub total_feeds: usize,
}

impl MaintenanceReport {
    pub fn failed_count(&self) -> usize {
        self.check.failed.len()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} feeds total, {} failed this run",
            self.total_feeds,
            self.failed_count()
        )
    }
}

/// One maintenance pass over the in-memory stores. Never writes to disk.
pub async fn run_maintenance(
    registry: &mut SourceRegistry,
    health: &mut HealthStore,
    transport: &dyn Transport,
    oracle: DynOracle,
    options: MaintenanceOptions,
    pacing: &mut Pacing,
    now: DateTime<Utc>,
) -> MaintenanceReport {
    tracing::info!(target: "maintain", feeds = registry.feeds().len(), ?options, "maintenance started");

    let check = run_health_checks(registry, health, transport, pacing, now).await;

    let mut report = MaintenanceReport {
        dry_run: options.dry_run,
        check,
        repairs: Vec::new(),
        discovery: Vec::new(),
        skipped_phases: Vec::new(),
        oracle_calls: 0,
        total_feeds: 0,
    };

    let skip_reason = if options.skip_grounding {
        Some("skipped by request")
    } else if !oracle.is_available() {
        Some("oracle not configured")
    } else {
        None
    };

    match skip_reason {
        Some(reason) => {
            tracing::warn!(target: "maintain", reason, "skipping repair and discovery");
            report.skipped_phases = vec![
                SkippedPhase { phase: Phase::Repair, reason },
                SkippedPhase { phase: Phase::Discovery, reason },
            ];
        }
        None => {
            let budgeted = BudgetedOracle::new(oracle, registry.maintenance().max_oracle_calls);
            report.repairs =
                repair_failed(&report.check.failed, registry, health, &budgeted, pacing, now).await;
            if budgeted.is_unreachable() {
                report.skipped_phases = vec![
                    SkippedPhase { phase: Phase::Repair, reason: ORACLE_UNREACHABLE },
                    SkippedPhase { phase: Phase::Discovery, reason: ORACLE_UNREACHABLE },
                ];
            } else {
                let commit = options.auto_add && !options.dry_run;
                report.discovery =
                    discover_feeds(registry, health, transport, &budgeted, pacing, commit, now).await;
                if budgeted.is_unreachable() {
                    report.skipped_phases = vec![SkippedPhase {
                        phase: Phase::Discovery,
                        reason: ORACLE_UNREACHABLE,
                    }];
                }
            }
            report.oracle_calls = budgeted.calls_used();
        }
    }

    report.total_feeds = registry.feeds().len();
    tracing::info!(target: "maintain", summary = %report.summary(), "maintenance finished");
    report
}

/// Persist registry and health unless `dry_run`. Returns whether anything was written.
pub fn commit(registry: &SourceRegistry, health: &HealthStore, dry_run: bool) -> Result<bool> {
    if dry_run {
        tracing::info!(target: "maintain", "dry run: no files were modified");
        return Ok(false);
    }
    registry.commit().context("saving source registry")?;
    health.commit().context("saving feed health")?;
    Ok(true)
}
