//! Configuration: a single hierarchical TOML document read once at
//! startup. Every section has a hardcoded `Default` and `#[serde(default)]`
//! so a partial or missing config file is legal per spec §6.
//!
//! Grounded on the inherited `Config::load`/`save` shape (TOML,
//! `~/.kaido/config.toml`, 0600 permissions on save), generalized to the
//! `directories` crate's XDG-aware config dir and to the much larger
//! option surface (`llm.*`, `safety.*`, `sessions.*`, `mcp.servers[]`,
//! `watch.*`, `embedded_llm.*`) the agentic core actually consumes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderKind {
    #[default]
    Openai,
    Anthropic,
    Gemini,
    Ollama,
    Upstage,
    Azure,
    Embedded,
}

impl LlmProviderKind {
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            LlmProviderKind::Openai => "https://api.openai.com/v1",
            LlmProviderKind::Upstage => "https://api.upstage.ai/v1",
            LlmProviderKind::Anthropic => "https://api.anthropic.com",
            LlmProviderKind::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            LlmProviderKind::Ollama => "http://localhost:11434",
            LlmProviderKind::Azure => "",
            LlmProviderKind::Embedded => "http://127.0.0.1:8080",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub max_backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { enabled: true, max_attempts: 5, max_backoff_secs: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub model: String,
    /// Overrides the provider's default endpoint; empty means "use the
    /// provider's default".
    pub endpoint: String,
    pub api_key: String,
    pub region: String,
    pub azure_deployment: String,
    pub skip_tls_verify: bool,
    pub reasoning_effort: String,
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            model: "gpt-4o-mini".to_string(),
            endpoint: String::new(),
            api_key: String::new(),
            region: String::new(),
            azure_deployment: String::new(),
            skip_tls_verify: false,
            reasoning_effort: String::new(),
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// The endpoint to actually dial: the configured override if set,
    /// otherwise the provider's documented default.
    pub fn resolved_endpoint(&self) -> String {
        if self.endpoint.is_empty() {
            self.provider.default_endpoint().to_string()
        } else {
            self.endpoint.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub auto_approve_readonly: bool,
    pub require_approval_for_write: bool,
    pub block_dangerous: bool,
    pub blocked_patterns: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            auto_approve_readonly: true,
            require_approval_for_write: true,
            block_dangerous: false,
            blocked_patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStorageKind {
    #[default]
    Memory,
    Filesystem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub storage: SessionStorageKind,
    pub max_age_hours: u64,
    pub max_sessions: usize,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self { storage: SessionStorageKind::default(), max_age_hours: 24 * 7, max_sessions: 200 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct McpServerConfig {
    pub name: String,
    pub enabled: bool,
    pub command: String,
    pub args: Vec<String>,
    pub env: std::collections::HashMap<String, String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct McpConfig {
    pub servers: Vec<McpServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub relist_interval_secs: u64,
    pub debounce_interval_ms: u64,
    pub fallback_interval_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { relist_interval_secs: 10, debounce_interval_ms: 100, fallback_interval_secs: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedLlmConfig {
    pub port: u16,
    pub model_path: PathBuf,
    pub context_size: u32,
    pub threads: usize,
    pub gpu_layers: u32,
    pub verbose: bool,
}

impl Default for EmbeddedLlmConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            model_path: PathBuf::new(),
            context_size: 2048,
            threads: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1).min(2),
            gpu_layers: 0,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub safety: SafetyConfig,
    pub sessions: SessionsConfig,
    pub mcp: McpConfig,
    pub watch: WatchConfig,
    pub embedded_llm: EmbeddedLlmConfig,
}

impl Config {
    /// Loads from the config file if present, otherwise returns
    /// [`Default`]. Absent keys within a present file use their field
    /// defaults courtesy of `#[serde(default)]`.
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    pub fn config_path() -> anyhow::Result<PathBuf> {
        if let Some(dirs) = directories::ProjectDirs::from("", "", "k13d") {
            return Ok(dirs.config_dir().join("config.toml"));
        }
        let home = directories::UserDirs::new()
            .map(|d| d.home_dir().to_path_buf())
            .ok_or_else(|| anyhow::anyhow!("cannot determine a home directory for the config file"))?;
        Ok(home.join(".k13d").join("config.toml"))
    }

    /// Platform XDG data dir for supervisor artifacts:
    /// `k13d/llm/{bin,models}` per spec §6.
    pub fn data_dir() -> anyhow::Result<PathBuf> {
        if let Some(dirs) = directories::ProjectDirs::from("", "", "k13d") {
            return Ok(dirs.data_dir().to_path_buf());
        }
        let home = directories::UserDirs::new()
            .map(|d| d.home_dir().to_path_buf())
            .ok_or_else(|| anyhow::anyhow!("cannot determine a home directory for the data dir"))?;
        Ok(home.join(".k13d").join("data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.llm.provider, config.llm.provider);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let partial = "[safety]\nblock_dangerous = true\n";
        let config: Config = toml::from_str(partial).unwrap();
        assert!(config.safety.block_dangerous);
        assert!(config.safety.auto_approve_readonly);
        assert_eq!(config.watch.fallback_interval_secs, 1);
    }

    #[test]
    fn resolved_endpoint_falls_back_to_provider_default() {
        let mut llm = LlmConfig::default();
        llm.provider = LlmProviderKind::Ollama;
        assert_eq!(llm.resolved_endpoint(), "http://localhost:11434");
        llm.endpoint = "http://elsewhere:9999".to_string();
        assert_eq!(llm.resolved_endpoint(), "http://elsewhere:9999");
    }
}
