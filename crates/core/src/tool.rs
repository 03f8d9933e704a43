//! Tool capability: the interface shared by the research tools.
//!
//! The set of tools is closed: [`ToolKind`] enumerates every tool the
//! pipeline knows, and callers select one explicitly instead of looking
//! tools up by free-form name at runtime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// Every tool the research pipeline can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    WebSearch,
    ContentExtractor,
    ResearchSynthesizer,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [
        ToolKind::WebSearch,
        ToolKind::ContentExtractor,
        ToolKind::ResearchSynthesizer,
    ];

    /// The wire name of this tool.
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::WebSearch => "web_search",
            ToolKind::ContentExtractor => "content_extractor",
            ToolKind::ResearchSynthesizer => "research_synthesizer",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolKind {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ToolError::InvalidArguments(format!("unknown tool: {s}")))
    }
}

/// The result of invoking a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool: ToolKind,

    /// Whether the tool achieved its goal. Extraction reports failures
    /// here rather than as an `Err`.
    pub success: bool,

    /// Human-readable output
    pub output: String,

    /// Structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// The shared capability interface.
#[async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's input.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Invoke the tool with JSON input.
    async fn invoke(&self, input: serde_json::Value)
    -> std::result::Result<ToolOutput, ToolError>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_roundtrip_through_names() {
        for kind in ToolKind::ALL {
            assert_eq!(kind.name().parse::<ToolKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_tool_name_is_rejected() {
        let err = "shell".parse::<ToolKind>().unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }

    #[test]
    fn kind_serializes_as_wire_name() {
        let json = serde_json::to_string(&ToolKind::ResearchSynthesizer).unwrap();
        assert_eq!(json, "\"research_synthesizer\"");
    }
}
