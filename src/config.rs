//! Application configuration: file values, then environment, then CLI
//! flag overrides applied in `main`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Environment variable holding the default OpenAI API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable holding the automation agent endpoint.
pub const AGENT_ENDPOINT_ENV: &str = "FIELDSCOUT_AGENT_ENDPOINT";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSettings,
    pub agent: AgentSettings,
    pub run: RunSettings,
    /// Directory reports are saved into.
    pub results_dir: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Keys tried in rotation when drafting plans.
    pub api_keys: Vec<String>,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// HTTP endpoint of the browser-automation agent.
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Total drafting attempts before a run gives up.
    pub max_attempts: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmSettings::default(),
            agent: AgentSettings::default(),
            run: RunSettings::default(),
            results_dir: PathBuf::from("results"),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 600,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl AppConfig {
    /// Load configuration from `explicit` or the default location, then
    /// apply environment overrides. A broken or missing file degrades to
    /// defaults with a warning rather than failing the whole run.
    pub fn load(explicit: Option<&Path>) -> Self {
        let mut config = match explicit {
            Some(path) => Self::from_file(path).unwrap_or_else(|err| {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to load config file; using defaults"
                );
                Self::default()
            }),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path).unwrap_or_else(|err| {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to load config file; using defaults"
                    );
                    Self::default()
                }),
                _ => Self::default(),
            },
        };
        config.apply_env();
        config
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            let key = key.trim().to_string();
            if !key.is_empty() && !self.llm.api_keys.contains(&key) {
                self.llm.api_keys.insert(0, key);
            }
        }
        if let Ok(endpoint) = std::env::var(AGENT_ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                self.agent.endpoint = Some(endpoint.trim().to_string());
            }
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push("fieldscout");
        path.push("config.yaml");
        path
    })
}
