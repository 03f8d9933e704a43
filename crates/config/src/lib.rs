//! Configuration loading, validation, and management for DeepBrief.
//!
//! Loads configuration from `~/.deepbrief/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use deepbrief_core::retry::{RetryPolicy, duration_from_secs};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for any configured timeout or retry delay, in seconds.
pub const MAX_WAIT_SECS: f64 = 3600.0;

/// The root configuration structure.
///
/// Maps directly to `~/.deepbrief/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// LLM-backed calls made beyond the search/extract pipeline
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Research tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Conversation memory bounds
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("agents", &self.agents)
            .field("tools", &self.tools)
            .field("memory", &self.memory)
            .field("gateway", &self.gateway)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl std::fmt::Debug for WebSearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearchConfig")
            .field("engine", &self.engine)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("max_results", &self.max_results)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

// ── agents ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-call timeout in seconds
    #[serde(default = "default_agent_timeout")]
    pub timeout: f64,

    #[serde(default = "default_agent_retries")]
    pub max_retries: u32,

    /// Fixed delay between retries in seconds
    #[serde(default = "default_one_second")]
    pub retry_delay: f64,

    /// Maximum tokens the LLM may produce for a brief
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "gpt-4-turbo-preview".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_agent_timeout() -> f64 {
    30.0
}
fn default_agent_retries() -> u32 {
    3
}
fn default_one_second() -> f64 {
    1.0
}
fn default_max_tokens() -> u32 {
    1000
}

impl AgentsConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs_f64(self.max_retries, self.retry_delay)
    }

    pub fn timeout(&self) -> Duration {
        duration_from_secs(self.timeout)
    }
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            default_model: default_model(),
            temperature: default_temperature(),
            timeout: default_agent_timeout(),
            max_retries: default_agent_retries(),
            retry_delay: default_one_second(),
            max_tokens: default_max_tokens(),
        }
    }
}

// ── tools ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub web_search: WebSearchConfig,

    #[serde(default)]
    pub content_extractor: ContentExtractorConfig,

    #[serde(default)]
    pub research_synthesizer: ResearchSynthesizerConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// "duckduckgo" or "serpapi"
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Search API key (SerpAPI)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override for the engine (mirrors, test servers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_search_attempts")]
    pub retry_attempts: u32,

    /// Fixed delay between retries in seconds
    #[serde(default = "default_search_delay")]
    pub retry_delay: f64,
}

fn default_engine() -> String {
    "duckduckgo".into()
}
fn default_max_results() -> usize {
    5
}
fn default_search_attempts() -> u32 {
    3
}
fn default_search_delay() -> f64 {
    2.0
}

impl WebSearchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs_f64(self.retry_attempts, self.retry_delay)
    }
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            api_key: None,
            api_url: None,
            max_results: default_max_results(),
            retry_attempts: default_search_attempts(),
            retry_delay: default_search_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentExtractorConfig {
    /// Hard per-attempt timeout in seconds
    #[serde(default = "default_extract_timeout")]
    pub timeout: f64,

    /// Maximum characters kept per document
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,

    #[serde(default = "default_extract_attempts")]
    pub retry_attempts: u32,

    /// Fixed delay between retries in seconds
    #[serde(default = "default_one_second")]
    pub retry_delay: f64,

    /// Maximum extractions in flight for one run
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_extract_timeout() -> f64 {
    30.0
}
fn default_max_content_length() -> usize {
    10_000
}
fn default_extract_attempts() -> u32 {
    2
}
fn default_concurrency() -> usize {
    4
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into()
}

impl ContentExtractorConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs_f64(self.retry_attempts, self.retry_delay)
    }

    pub fn timeout(&self) -> Duration {
        duration_from_secs(self.timeout)
    }
}

impl Default for ContentExtractorConfig {
    fn default() -> Self {
        Self {
            timeout: default_extract_timeout(),
            max_content_length: default_max_content_length(),
            retry_attempts: default_extract_attempts(),
            retry_delay: default_one_second(),
            concurrency: default_concurrency(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSynthesizerConfig {
    #[serde(default = "default_max_key_points")]
    pub max_key_points: usize,

    /// Minimum characters for a sentence to become a key point
    #[serde(default = "default_min_sentence_length")]
    pub min_sentence_length: usize,
}

fn default_max_key_points() -> usize {
    5
}
fn default_min_sentence_length() -> usize {
    50
}

impl Default for ResearchSynthesizerConfig {
    fn default() -> Self {
        Self {
            max_key_points: default_max_key_points(),
            min_sentence_length: default_min_sentence_length(),
        }
    }
}

// ── memory / gateway / providers ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_max_token_limit")]
    pub max_token_limit: usize,

    /// Entry time-to-live in seconds
    #[serde(default = "default_ttl")]
    pub ttl: u64,
}

fn default_max_token_limit() -> usize {
    4096
}
fn default_ttl() -> u64 {
    3600
}

impl MemoryConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_token_limit: default_max_token_limit(),
            ttl: default_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origins allowed by CORS. Empty = same-origin only.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: vec![],
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.deepbrief/config.toml).
    ///
    /// Also checks environment variables:
    /// - `DEEPBRIEF_API_KEY`, then `OPENAI_API_KEY` for the LLM
    /// - `SERPAPI_API_KEY` for the SerpAPI search engine
    /// - `DEEPBRIEF_MODEL`, `DEEPBRIEF_SEARCH_ENGINE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("DEEPBRIEF_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }

        if self.tools.web_search.api_key.is_none() {
            self.tools.web_search.api_key = lookup("SERPAPI_API_KEY");
        }

        if let Some(model) = lookup("DEEPBRIEF_MODEL") {
            self.agents.default_model = model;
        }

        if let Some(engine) = lookup("DEEPBRIEF_SEARCH_ENGINE") {
            self.tools.web_search.engine = engine;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".deepbrief")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.agents.temperature) {
            return Err(ConfigError::ValidationError(
                "agents.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let tools = &self.tools;
        let checks = [
            (tools.web_search.max_results == 0, "tools.web_search.max_results must be > 0"),
            (tools.web_search.retry_attempts == 0, "tools.web_search.retry_attempts must be > 0"),
            (
                tools.content_extractor.max_content_length == 0,
                "tools.content_extractor.max_content_length must be > 0",
            ),
            (
                tools.content_extractor.retry_attempts == 0,
                "tools.content_extractor.retry_attempts must be > 0",
            ),
            (
                tools.content_extractor.concurrency == 0,
                "tools.content_extractor.concurrency must be > 0",
            ),
            (
                tools.research_synthesizer.max_key_points == 0,
                "tools.research_synthesizer.max_key_points must be > 0",
            ),
            (self.agents.max_retries == 0, "agents.max_retries must be > 0"),
        ];
        if let Some((_, message)) = checks.iter().find(|(failed, _)| *failed) {
            return Err(ConfigError::ValidationError((*message).into()));
        }

        // (key, seconds, zero allowed)
        let waits = [
            ("agents.timeout", self.agents.timeout, false),
            ("agents.retry_delay", self.agents.retry_delay, true),
            ("tools.web_search.retry_delay", tools.web_search.retry_delay, true),
            ("tools.content_extractor.timeout", tools.content_extractor.timeout, false),
            ("tools.content_extractor.retry_delay", tools.content_extractor.retry_delay, true),
        ];
        for (key, secs, zero_allowed) in waits {
            let above_floor = if zero_allowed { secs >= 0.0 } else { secs > 0.0 };
            // NaN fails both comparisons.
            if !(above_floor && secs <= MAX_WAIT_SECS) {
                let floor = if zero_allowed { ">= 0" } else { "> 0" };
                return Err(ConfigError::ValidationError(format!(
                    "{key} must be {floor} and at most {MAX_WAIT_SECS}s, got {secs}"
                )));
            }
        }

        if !matches!(tools.web_search.engine.as_str(), "duckduckgo" | "serpapi") {
            return Err(ConfigError::ValidationError(format!(
                "unknown search engine '{}' (expected duckduckgo or serpapi)",
                tools.web_search.engine
            )));
        }

        Ok(())
    }

    /// Resolve the LLM key: provider-specific first, then the global key.
    pub fn llm_api_key(&self) -> Option<&str> {
        self.providers
            .get(&self.default_provider)
            .and_then(|p| p.api_key.as_deref())
            .or(self.api_key.as_deref())
    }

    /// Resolve the LLM model: provider-specific first, then
    /// `agents.default_model`.
    pub fn llm_model(&self) -> &str {
        self.providers
            .get(&self.default_provider)
            .and_then(|p| p.default_model.as_deref())
            .unwrap_or(&self.agents.default_model)
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            agents: AgentsConfig::default(),
            tools: ToolsConfig::default(),
            memory: MemoryConfig::default(),
            gateway: GatewayConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.tools.web_search.max_results, 5);
        assert_eq!(config.tools.web_search.retry_attempts, 3);
        assert!((config.tools.web_search.retry_delay - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.tools.content_extractor.timeout(), Duration::from_secs(30));
        assert_eq!(config.tools.content_extractor.max_content_length, 10_000);
        assert_eq!(config.tools.content_extractor.retry_attempts, 2);
        assert_eq!(config.tools.research_synthesizer.max_key_points, 5);
        assert_eq!(config.tools.research_synthesizer.min_sentence_length, 50);
        assert_eq!(config.memory.ttl(), Duration::from_secs(3600));
        assert_eq!(config.agents.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn retry_policies_follow_config() {
        let config = AppConfig::default();
        assert_eq!(config.tools.web_search.retry_policy(), RetryPolicy::search());
        assert_eq!(
            config.tools.content_extractor.retry_policy(),
            RetryPolicy::extraction()
        );
        assert_eq!(config.agents.retry_policy(), RetryPolicy::agent());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.agents.default_model, config.agents.default_model);
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let toml_str = r#"
[tools.web_search]
max_results = 8

[memory]
max_token_limit = 100
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.tools.web_search.max_results, 8);
        assert_eq!(config.tools.web_search.retry_attempts, 3);
        assert_eq!(config.memory.max_token_limit, 100);
        assert_eq!(config.memory.ttl, 3600);
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.agents.temperature = 5.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.tools.research_synthesizer.max_key_points = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.tools.web_search.engine = "altavista".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("altavista"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.tools.web_search.engine, "duckduckgo");
    }

    #[test]
    fn load_from_file_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tools.content_extractor]\nconcurrency = 0").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn unrepresentable_waits_rejected_at_load() {
        for body in [
            "[tools.web_search]\nretry_delay = inf",
            "[tools.content_extractor]\ntimeout = 1e300",
            "[tools.content_extractor]\nretry_delay = nan",
            "[agents]\ntimeout = -1.0",
            "[agents]\ntimeout = 0.0",
        ] {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "{body}").unwrap();
            let err = AppConfig::load_from(file.path()).unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError(_)), "{body}");
        }
    }

    #[test]
    fn wait_bounds_are_inclusive() {
        let mut config = AppConfig::default();
        config.tools.web_search.retry_delay = 0.0;
        config.agents.timeout = MAX_WAIT_SECS;
        assert!(config.validate().is_ok());

        config.agents.retry_delay = MAX_WAIT_SECS + 1.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("agents.retry_delay"));
    }

    #[test]
    fn unparsable_file_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is = = not toml").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_fill_missing_keys_only() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env_overrides(|key| match key {
            "OPENAI_API_KEY" => Some("from-env".into()),
            "SERPAPI_API_KEY" => Some("serp".into()),
            "DEEPBRIEF_SEARCH_ENGINE" => Some("serpapi".into()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
        assert_eq!(config.tools.web_search.api_key.as_deref(), Some("serp"));
        assert_eq!(config.tools.web_search.engine, "serpapi");
    }

    #[test]
    fn provider_key_wins_over_global_key() {
        let mut config = AppConfig {
            api_key: Some("global".into()),
            ..AppConfig::default()
        };
        assert_eq!(config.llm_api_key(), Some("global"));
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("scoped".into()),
                api_url: None,
                default_model: None,
            },
        );
        assert_eq!(config.llm_api_key(), Some("scoped"));
    }

    #[test]
    fn provider_model_wins_over_agents_model() {
        let mut config = AppConfig::default();
        assert_eq!(config.llm_model(), "gpt-4-turbo-preview");

        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: None,
                api_url: None,
                default_model: Some("gpt-4o-mini".into()),
            },
        );
        assert_eq!(config.llm_model(), "gpt-4o-mini");

        config.default_provider = "ollama".into();
        assert_eq!(config.llm_model(), "gpt-4-turbo-preview");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        config.tools.web_search.api_key = Some("serp-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("serp-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("duckduckgo"));
        assert!(toml_str.contains("max_token_limit"));
    }
}
