//! Grounded-search oracle: provider abstraction + per-run call budget.
//!
//! The oracle answers free-form prompts with free-form text. `Err` means the
//! provider could not be reached at all (transport failure, error status);
//! `Ok(None)` means it answered with nothing usable. The decoders in
//! [`decode`] turn text into "a URL" / "a list of candidates" or nothing.

pub mod decode;
pub mod gemini;
pub mod prompts;

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::config::oracle::OracleConfig;

pub type OracleFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>>;

/// Trait object used by the repair and discovery agents.
pub trait Oracle: Send + Sync {
    /// Ask a question. `Ok(None)` when there is no usable answer, `Err` when
    /// the provider is unreachable.
    fn ask<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
    /// False when no query could possibly succeed (no key, disabled in config).
    fn is_available(&self) -> bool {
        true
    }
}

pub type DynOracle = Arc<dyn Oracle>;

/// Factory: disabled unless configured with a key.
pub fn build_oracle(config: &OracleConfig) -> DynOracle {
    if !config.enabled || config.api_key.trim().is_empty() {
        return Arc::new(DisabledOracle);
    }
    match config.provider.as_str() {
        "gemini" => match gemini::GeminiOracle::new(config) {
            Ok(g) => Arc::new(g),
            Err(e) => {
                tracing::warn!(target: "oracle", error = %format!("{e:#}"), "gemini client init failed");
                Arc::new(DisabledOracle)
            }
        },
        other => {
            tracing::warn!(target: "oracle", provider = other, "unsupported oracle provider");
            Arc::new(DisabledOracle)
        }
    }
}

/// Never answers; used when no oracle is configured.
pub struct DisabledOracle;

impl Oracle for DisabledOracle {
    fn ask<'a>(&'a self, _prompt: &'a str) -> OracleFuture<'a> {
        Box::pin(async { Ok(None) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
    fn is_available(&self) -> bool {
        false
    }
}

/// Caps the number of real queries per maintenance run.
///
/// After the first unreachable-provider error every later query fails fast
/// without touching the provider or the budget.
pub struct BudgetedOracle {
    inner: DynOracle,
    max_calls: u32,
    used: AtomicU32,
    unreachable: AtomicBool,
}

impl BudgetedOracle {
    pub fn new(inner: DynOracle, max_calls: u32) -> Self {
        Self {
            inner,
            max_calls,
            used: AtomicU32::new(0),
            unreachable: AtomicBool::new(false),
        }
    }

    pub fn calls_used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn is_unreachable(&self) -> bool {
        self.unreachable.load(Ordering::SeqCst)
    }
}

impl Oracle for BudgetedOracle {
    fn ask<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a> {
        Box::pin(async move {
            if self.is_unreachable() {
                return Err(anyhow!("oracle unreachable earlier in this run"));
            }
            let prev = self
                .used
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    (n < self.max_calls).then_some(n + 1)
                });
            if prev.is_err() {
                tracing::warn!(target: "oracle", max_calls = self.max_calls, "oracle budget exhausted");
                return Ok(None);
            }
            metrics::counter!("curator_oracle_calls_total").increment(1);
            let answer = self.inner.ask(prompt).await;
            if let Err(e) = &answer {
                tracing::warn!(
                    target: "oracle",
                    provider = self.inner.provider_name(),
                    error = %format!("{e:#}"),
                    "oracle unreachable; no further queries this run"
                );
                self.unreachable.store(true, Ordering::SeqCst);
            }
            answer
        })
    }
    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
    fn is_available(&self) -> bool {
        self.inner.is_available()
    }
}

type ScriptedReply = std::result::Result<Option<String>, String>;

/// Deterministic oracle for tests and local runs: the first rule whose needle
/// occurs in the prompt answers; otherwise the next queued reply; otherwise `None`.
#[derive(Default)]
pub struct ScriptedOracle {
    rules: Vec<(String, ScriptedReply)>,
    queue: Mutex<VecDeque<Option<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, needle: &str, reply: Option<&str>) -> Self {
        self.rules
            .push((needle.to_string(), Ok(reply.map(str::to_string))));
        self
    }

    /// Prompts containing `needle` fail as if the provider were down.
    pub fn with_outage(mut self, needle: &str, message: &str) -> Self {
        self.rules.push((needle.to_string(), Err(message.to_string())));
        self
    }

    pub fn with_reply(self, reply: Option<&str>) -> Self {
        self.queue
            .lock()
            .expect("scripted queue poisoned")
            .push_back(reply.map(str::to_string));
        self
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("scripted prompts poisoned").clone()
    }
}

impl Oracle for ScriptedOracle {
    fn ask<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a> {
        self.prompts
            .lock()
            .expect("scripted prompts poisoned")
            .push(prompt.to_string());
        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| {
                Ok(self
                    .queue
                    .lock()
                    .expect("scripted queue poisoned")
                    .pop_front()
                    .flatten())
            });
        Box::pin(async move { reply.map_err(|msg| anyhow!("{msg}")) })
    }
    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}
