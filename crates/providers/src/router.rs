//! Provider selection from configuration.
//!
//! The research pipeline uses a single LLM, the configured default
//! provider. When no key is available the pipeline runs without one and
//! skips the written brief.

use std::sync::Arc;

use deepbrief_config::AppConfig;
use deepbrief_core::error::ProviderError;
use deepbrief_core::provider::Provider;
use tracing::info;

use crate::openai_compat::OpenAiCompatProvider;

/// Build the default provider from configuration.
///
/// Returns `Ok(None)` when the provider needs a key and none is set.
pub fn build_from_config(config: &AppConfig) -> Result<Option<Arc<dyn Provider>>, ProviderError> {
    let name = config.default_provider.as_str();
    let provider_config = config.providers.get(name);

    let base_url = provider_config
        .and_then(|p| p.api_url.clone())
        .unwrap_or_else(|| default_base_url(name));

    let api_key = match config.llm_api_key() {
        Some(key) => key.to_string(),
        None if is_local(name) => name.to_string(),
        None => {
            info!(provider = name, "No LLM API key configured, briefs disabled");
            return Ok(None);
        }
    };

    let provider =
        OpenAiCompatProvider::with_timeout(name, base_url, api_key, config.agents.timeout())?;
    Ok(Some(Arc::new(provider)))
}

fn is_local(provider_name: &str) -> bool {
    matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepbrief_config::ProviderConfig;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn no_key_means_no_provider() {
        let config = AppConfig::default();
        assert!(build_from_config(&config).unwrap().is_none());
    }

    #[test]
    fn global_key_builds_default_provider() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        let provider = build_from_config(&config).unwrap().unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn local_provider_needs_no_key() {
        let mut config = AppConfig {
            default_provider: "ollama".into(),
            ..AppConfig::default()
        };
        config.providers.insert(
            "ollama".into(),
            ProviderConfig {
                api_key: None,
                api_url: Some("http://gpu-box:11434/v1".into()),
                default_model: None,
            },
        );
        let provider = build_from_config(&config).unwrap().unwrap();
        assert_eq!(provider.name(), "ollama");
    }
}
