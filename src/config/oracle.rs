// src/config/oracle.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_ORACLE_CONFIG_PATH: &str = "config/oracle.json";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_ORACLE_MODEL: &str = "CURATOR_ORACLE_MODEL";

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-3-flash-preview".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Only "gemini" is implemented.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from GEMINI_API_KEY.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: default_provider(),
            model: default_model(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl OracleConfig {
    /// Defaults + environment. A missing key leaves the oracle disabled.
    pub fn from_env() -> Self {
        let mut cfg = Self {
            api_key: "ENV".to_string(),
            ..Self::default()
        };
        cfg.resolve_env();
        cfg
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: OracleConfig = serde_json::from_str(&data)?;
        cfg.provider = cfg.provider.trim().to_lowercase();
        if cfg.provider != "gemini" {
            anyhow::bail!("Unsupported oracle provider in config: {}", cfg.provider);
        }
        cfg.resolve_env();
        Ok(cfg)
    }

    /// `config/oracle.json` when present, otherwise the environment.
    pub fn load_default() -> anyhow::Result<Self> {
        let p = Path::new(DEFAULT_ORACLE_CONFIG_PATH);
        if p.exists() {
            Self::load_from_file(p)
        } else {
            Ok(Self::from_env())
        }
    }

    fn resolve_env(&mut self) {
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = env::var(ENV_GEMINI_API_KEY).unwrap_or_default();
        }
        if let Ok(model) = env::var(ENV_ORACLE_MODEL) {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
    }
}
