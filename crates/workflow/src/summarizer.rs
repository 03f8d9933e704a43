//! LLM-written brief over the extracted documents.
//!
//! Optional: the workflow only builds one when a provider is configured,
//! and a failed brief leaves `SynthesisResult::summary` empty rather than
//! failing the run.

use std::sync::Arc;
use std::time::Duration;

use deepbrief_config::AgentsConfig;
use deepbrief_core::error::ProviderError;
use deepbrief_core::provider::{Message, Provider, ProviderRequest};
use deepbrief_core::research::{ExtractedDocument, Topic};
use deepbrief_core::retry::{RetryError, RetryExecutor, RetryPolicy};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Characters of each document included in the prompt.
const MAX_EXCERPT_CHARS: usize = 2_000;

const SYSTEM_PROMPT: &str = "You are a research assistant. Write a concise, factual brief \
from the provided sources. Do not invent facts that are not in the sources.";

pub struct BriefSummarizer {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    policy: RetryPolicy,
    timeout: Duration,
}

impl BriefSummarizer {
    pub fn new(provider: Arc<dyn Provider>, config: &AgentsConfig) -> Self {
        Self {
            provider,
            model: config.default_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            policy: config.retry_policy(),
            timeout: config.timeout(),
        }
    }

    /// Use `model` instead of `agents.default_model`.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Ask the provider for a brief. Each attempt is bounded by the agent
    /// timeout; attempts follow the agent retry policy.
    pub async fn summarize(
        &self,
        topic: &Topic,
        documents: &[ExtractedDocument],
        memory_context: &str,
        cancel: &CancellationToken,
    ) -> Result<String, RetryError<ProviderError>> {
        let request = self.build_request(topic, documents, memory_context);
        debug!(
            provider = self.provider.name(),
            model = %self.model,
            sources = documents.iter().filter(|d| d.success).count(),
            "Requesting research brief"
        );

        RetryExecutor::new(self.policy)
            .named("brief_summary")
            .with_cancellation(cancel.clone())
            .execute(|| {
                let request = request.clone();
                async move {
                    let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
                        .await
                        .map_err(|_| {
                            ProviderError::Timeout(format!(
                                "no response within {:.1}s",
                                self.timeout.as_secs_f64()
                            ))
                        })??;
                    let text = response.message.content.trim().to_string();
                    if text.is_empty() {
                        return Err(ProviderError::ApiError {
                            status_code: 200,
                            message: "empty completion".into(),
                        });
                    }
                    Ok(text)
                }
            })
            .await
    }

    fn build_request(
        &self,
        topic: &Topic,
        documents: &[ExtractedDocument],
        memory_context: &str,
    ) -> ProviderRequest {
        let mut prompt = format!("Synthesize the following information about {topic}:\n\n");
        for doc in documents.iter().filter(|d| d.success) {
            let title = doc.title.as_deref().unwrap_or(&doc.source_url);
            let excerpt: String = doc.text.chars().take(MAX_EXCERPT_CHARS).collect();
            prompt.push_str(&format!("Source: {title}\n{excerpt}\n\n"));
        }
        if !memory_context.is_empty() {
            prompt.push_str("Earlier research in this session:\n");
            prompt.push_str(memory_context);
            prompt.push('\n');
        }

        ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)],
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
        }
    }
}
