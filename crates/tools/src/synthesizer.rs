//! Research synthesis: fold extracted documents into key points.
//!
//! Pure and deterministic. Sentences come from successful documents only,
//! in document rank order and then in position order within a document, so
//! the same inputs always produce the same key points.

use std::collections::HashSet;

use async_trait::async_trait;
use deepbrief_config::ResearchSynthesizerConfig;
use deepbrief_core::error::ToolError;
use deepbrief_core::research::{ExtractedDocument, SynthesisResult};
use deepbrief_core::tool::{Tool, ToolKind, ToolOutput};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ResearchSynthesizer {
    max_key_points: usize,
    min_sentence_length: usize,
}

impl ResearchSynthesizer {
    pub fn new(config: &ResearchSynthesizerConfig) -> Self {
        Self {
            max_key_points: config.max_key_points,
            min_sentence_length: config.min_sentence_length,
        }
    }

    pub fn synthesize(&self, documents: &[ExtractedDocument]) -> SynthesisResult {
        let successful: Vec<&ExtractedDocument> = documents.iter().filter(|d| d.success).collect();
        if successful.is_empty() {
            warn!(attempted = documents.len(), "No successful documents to synthesize");
            return SynthesisResult::default();
        }

        let mut source_urls: Vec<String> = Vec::new();
        for d in &successful {
            if !source_urls.contains(&d.source_url) {
                source_urls.push(d.source_url.clone());
            }
        }

        let mut seen_sentences = HashSet::new();
        let key_points: Vec<String> = successful
            .iter()
            .copied()
            .flat_map(|d| split_sentences(&d.text))
            .filter(|s| s.chars().count() >= self.min_sentence_length)
            .filter(|s| seen_sentences.insert(*s))
            .take(self.max_key_points)
            .map(str::to_string)
            .collect();

        debug!(
            documents = successful.len(),
            key_points = key_points.len(),
            "Synthesized key points"
        );

        SynthesisResult {
            key_points,
            source_urls,
            summary: None,
        }
    }
}

/// Split on line breaks, and on `.`, `!` or `?` followed by whitespace.
/// Terminators stay with their sentence; pieces are trimmed and blanks
/// dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    for line in text.lines() {
        let mut start = 0;
        let mut chars = line.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            let at_boundary = matches!(c, '.' | '!' | '?')
                && chars.peek().is_some_and(|(_, next)| next.is_whitespace());
            if at_boundary {
                let end = i + c.len_utf8();
                sentences.push(line[start..end].trim());
                start = end;
            }
        }
        sentences.push(line[start..].trim());
    }
    sentences.retain(|s| !s.is_empty());
    sentences
}

#[async_trait]
impl Tool for ResearchSynthesizer {
    fn kind(&self) -> ToolKind {
        ToolKind::ResearchSynthesizer
    }

    fn description(&self) -> &str {
        "Synthesize extracted documents into a bounded list of key points with their sources."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "documents": {
                    "type": "array",
                    "description": "Extracted documents in search rank order",
                    "items": {
                        "type": "object",
                        "properties": {
                            "sourceUrl": {"type": "string"},
                            "text": {"type": "string"},
                            "success": {"type": "boolean"}
                        },
                        "required": ["sourceUrl", "text", "success"]
                    }
                }
            },
            "required": ["documents"]
        })
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let documents: Vec<ExtractedDocument> = input
            .get("documents")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ToolError::InvalidArguments(format!("Invalid 'documents': {e}")))?
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'documents' argument".into()))?;

        let synthesis = self.synthesize(&documents);
        let output = synthesis
            .key_points
            .iter()
            .map(|p| format!("- {p}"))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ToolOutput {
            tool: self.kind(),
            success: true,
            output,
            data: Some(serde_json::to_value(&synthesis)?),
        })
    }
}
