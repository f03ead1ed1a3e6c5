use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::article::Article;
use crate::backoff::Pacer;
use crate::health::{HealthState, HealthStore};
use crate::history::HistoryStore;
use crate::ingest::transport::Transport;
use crate::metrics::Metrics;
use crate::pipeline;
use crate::registry::SourceRegistry;

#[derive(Clone)]
pub struct AppState {
    registry: Arc<SourceRegistry>,
    health: Arc<HealthStore>,
    history: Arc<Mutex<HistoryStore>>,
    transport: Arc<dyn Transport>,
}

impl AppState {
    pub fn new(
        registry: SourceRegistry,
        health: HealthStore,
        history: HistoryStore,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            health: Arc::new(health),
            history: Arc::new(Mutex::new(history)),
            transport,
        }
    }
}

pub fn create_router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let router = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/selection", get(selection))
        .route("/history", post(commit_history))
        .route("/feeds", get(feeds))
        .layer(CorsLayer::very_permissive())
        .with_state(state);

    match metrics {
        Some(m) => router.merge(m.router()),
        None => router,
    }
}

#[derive(serde::Serialize)]
struct SelectionResp {
    generated_at: DateTime<Utc>,
    count: usize,
    articles: Vec<Article>,
}

/// Runs a fresh selection; history is read, not written. The history lock is
/// only held for the filtering step, never across the fetch.
async fn selection(State(state): State<AppState>) -> Json<SelectionResp> {
    let now = Utc::now();
    let fetched =
        pipeline::fetch_candidates(&state.registry, state.transport.clone(), &mut Pacer::none(), now)
            .await;
    let articles = {
        let history = state.history.lock().await;
        pipeline::select_fetched(fetched, &state.registry, &history)
    };
    Json(SelectionResp {
        generated_at: now,
        count: articles.len(),
        articles,
    })
}

#[derive(serde::Deserialize)]
struct HistoryReq {
    urls: Vec<String>,
}

#[derive(serde::Serialize)]
struct HistoryResp {
    added: usize,
    total: usize,
}

async fn commit_history(
    State(state): State<AppState>,
    Json(body): Json<HistoryReq>,
) -> Result<Json<HistoryResp>, (StatusCode, String)> {
    let mut history = state.history.lock().await;
    let added = pipeline::commit_seen(&mut history, body.urls).map_err(|e| {
        tracing::error!(target: "api", error = %format!("{e:#}"), "history commit failed");
        (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
    })?;
    Ok(Json(HistoryResp {
        added,
        total: history.len(),
    }))
}

#[derive(serde::Serialize)]
struct FeedView {
    name: String,
    url: String,
    language: String,
    weight: f64,
    state: HealthState,
    fail_count: u32,
}

async fn feeds(State(state): State<AppState>) -> Json<Vec<FeedView>> {
    let max = state.registry.config().max_fail_count;
    let out = state
        .registry
        .feeds()
        .iter()
        .map(|f| FeedView {
            name: f.name.clone(),
            url: f.url.clone(),
            language: f.language.clone(),
            weight: f.effective_weight(),
            state: state.health.state(&f.url, max),
            fail_count: state.health.fail_count(&f.url),
        })
        .collect();
    Json(out)
}
