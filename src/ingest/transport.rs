// src/ingest/transport.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub const USER_AGENT: &str = "news-curator/0.1 (feed checker)";

/// Status + body of one GET. Redirects are already followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBody {
    pub status: u16,
    pub text: String,
}

impl HttpBody {
    pub fn ok(text: &str) -> Self {
        Self {
            status: 200,
            text: text.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound GET used by fetchers and health probes.
/// `Err` means the request never produced a response (DNS, TLS, timeout, …).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpBody>;
}

/// reqwest-backed transport; every request carries a timeout.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_timeouts(Duration::from_secs(5), Duration::from_secs(15))
    }

    pub fn with_timeouts(connect: Duration, total: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect)
            .timeout(total)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<HttpBody> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .with_context(|| format!("reading body of {url}"))?;
        Ok(HttpBody { status, text })
    }
}

/// Canned responses keyed by exact url. Unknown urls fail like a dead host.
/// Routes can be swapped between runs to script multi-run scenarios.
#[derive(Default)]
pub struct FixtureTransport {
    routes: Mutex<HashMap<String, std::result::Result<HttpBody, String>>>,
    calls: Mutex<Vec<String>>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(self, url: &str, status: u16, text: &str) -> Self {
        self.set_body(url, status, text);
        self
    }

    pub fn with_error(self, url: &str, message: &str) -> Self {
        self.set_error(url, message);
        self
    }

    pub fn set_body(&self, url: &str, status: u16, text: &str) {
        self.routes.lock().expect("fixture routes poisoned").insert(
            url.to_string(),
            Ok(HttpBody {
                status,
                text: text.to_string(),
            }),
        );
    }

    pub fn set_error(&self, url: &str, message: &str) {
        self.routes
            .lock()
            .expect("fixture routes poisoned")
            .insert(url.to_string(), Err(message.to_string()));
    }

    /// Urls requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("fixture calls poisoned").clone()
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    async fn get(&self, url: &str) -> Result<HttpBody> {
        self.calls
            .lock()
            .expect("fixture calls poisoned")
            .push(url.to_string());
        let routes = self.routes.lock().expect("fixture routes poisoned");
        match routes.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(msg)) => Err(anyhow!("{msg}")),
            None => Err(anyhow!("connection refused: {url}")),
        }
    }
}
