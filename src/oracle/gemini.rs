// src/oracle/gemini.rs
//! Gemini `generateContent` with the Google Search grounding tool.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Oracle, OracleFuture};
use crate::config::oracle::OracleConfig;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiOracle {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(crate::ingest::transport::USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building gemini http client")?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}
#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}
#[derive(Serialize)]
struct Tool {
    google_search: serde_json::Map<String, serde_json::Value>,
}
#[derive(Serialize)]
struct Req<'a> {
    contents: Vec<Content<'a>>,
    tools: Vec<Tool>,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}
#[derive(Deserialize)]
struct Candidate {
    content: Option<RespContent>,
}
#[derive(Deserialize)]
struct RespContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}
#[derive(Deserialize)]
struct RespPart {
    text: Option<String>,
}

impl GeminiOracle {
    async fn generate(&self, prompt: &str) -> Result<Option<String>> {
        let req = Req {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            tools: vec![Tool {
                google_search: serde_json::Map::new(),
            }],
        };
        let url = format!("{API_BASE}/{}:generateContent", self.model);

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await
            .context("gemini request failed")?;
        if !resp.status().is_success() {
            bail!("gemini returned HTTP {}", resp.status().as_u16());
        }
        let body: Resp = match resp.json().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(target: "oracle", error = %e, "gemini response not understood");
                return Ok(None);
            }
        };
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text.to_string()))
        }
    }
}

impl Oracle for GeminiOracle {
    fn ask<'a>(&'a self, prompt: &'a str) -> OracleFuture<'a> {
        Box::pin(self.generate(prompt))
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}
