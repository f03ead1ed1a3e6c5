// src/lib.rs
// Public library surface for the CLI and integration tests.

pub mod article;
pub mod backoff;
pub mod config;
pub mod health;
pub mod history;
pub mod registry;
pub mod scoring;
pub mod selector;
pub mod store;

// Fetching and feed parsing
pub mod ingest;

// Oracle-assisted roster upkeep
pub mod maintain;
pub mod oracle;

pub mod api;
pub mod metrics;
pub mod pipeline;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::article::{Article, Origin};
pub use crate::pipeline::{commit_seen, select_articles};
pub use crate::registry::{SelectionConfig, SourceDescriptor, SourceRegistry};
