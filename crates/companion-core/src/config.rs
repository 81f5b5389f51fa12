use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

/// Placeholder shipped in sample settings files; treated as "no key".
pub const PLACEHOLDER_API_KEY: &str = "YOUR_OPENAI_API_KEY_HERE";

/// Upper bound for one chat request, streamed body included.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;

pub const DEFAULT_DIRECTIVE: &str = "You are a friendly and helpful desktop assistant. \
Answer the user's questions concisely and accurately, and help with their tasks when needed.";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub local: LocalConfig,
    pub cloud: CloudConfig,
    pub history: HistoryConfig,
    pub session: SessionConfig,
    pub probe: ProbeConfig,
}

/// Local model server settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LocalConfig {
    pub enabled: bool,
    pub prefer_local: bool,
    /// Local backend flavour. Only "ollama" is implemented.
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout_ms: u64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefer_local: true,
            provider: "ollama".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            model: "phi3:mini".to_string(),
            max_tokens: 500,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl LocalConfig {
    pub fn should_use_local(&self) -> bool {
        self.enabled && self.prefer_local
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Cloud chat API settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CloudConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub endpoint: String,
    pub request_timeout_ms: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4".to_string(),
            max_tokens: 2000,
            temperature: 0.7,
            endpoint: "https://api.openai.com/v1".to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl CloudConfig {
    pub fn is_configured(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != PLACEHOLDER_API_KEY
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of messages kept, directive included.
    pub cap: usize,
    pub directive: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            cap: 20,
            directive: DEFAULT_DIRECTIVE.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub listen_delay_ms: u64,
    pub settle_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            listen_delay_ms: 80,
            settle_delay_ms: 300,
        }
    }
}

impl SessionConfig {
    pub fn listen_delay(&self) -> Duration {
        Duration::from_millis(self.listen_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    pub liveness_timeout_ms: u64,
    pub catalog_timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_ms: 10_000,
            catalog_timeout_ms: 10_000,
        }
    }
}

impl ProbeConfig {
    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_millis(self.liveness_timeout_ms)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_millis(self.catalog_timeout_ms)
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Loads the settings file, or defaults when it doesn't exist yet.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    /// Like [`Config::load`], but a broken settings file never stops startup.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("failed to load settings, using defaults: {e}");
                Self::new()
            }
        }
    }

    /// Environment variables win over the settings file.
    pub fn apply_env(mut self) -> Self {
        if let Some(key) = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()) {
            self.cloud.api_key = key;
        }
        if let Some(host) = std::env::var("OLLAMA_HOST").ok().filter(|h| !h.trim().is_empty()) {
            self.local.endpoint = normalize_endpoint(&host);
        }
        self
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("companion").join("config.json"))
    }
}

/// `OLLAMA_HOST` is often given without a scheme (`127.0.0.1:11434`).
fn normalize_endpoint(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}
