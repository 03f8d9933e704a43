//! Research tools for DeepBrief.
//!
//! The tool set is closed: web search, content extraction and research
//! synthesis. [`ToolSet`] owns one of each and dispatches by [`ToolKind`];
//! there is no registry of free-form names.

pub mod content_extractor;
pub mod fetcher;
pub mod html;
pub mod providers;
pub mod synthesizer;
pub mod web_search;

use std::sync::Arc;

use async_trait::async_trait;
use deepbrief_config::ToolsConfig;
use deepbrief_core::error::ToolError;
use deepbrief_core::fetch::PageFetcher;
use deepbrief_core::provider::ToolDefinition;
use deepbrief_core::search::SearchProvider;
use deepbrief_core::tool::{Tool, ToolKind, ToolOutput};

pub use content_extractor::ContentExtractor;
pub use fetcher::HttpPageFetcher;
pub use providers::{DuckDuckGoProvider, SerpApiProvider, build_search_provider};
pub use synthesizer::ResearchSynthesizer;
pub use web_search::WebSearchTool;

/// One member of the closed tool set, borrowed from a [`ToolSet`].
#[derive(Clone, Copy)]
pub enum ResearchTool<'a> {
    WebSearch(&'a WebSearchTool),
    ContentExtractor(&'a ContentExtractor),
    ResearchSynthesizer(&'a ResearchSynthesizer),
}

impl ResearchTool<'_> {
    fn as_tool(&self) -> &dyn Tool {
        match *self {
            ResearchTool::WebSearch(t) => t,
            ResearchTool::ContentExtractor(t) => t,
            ResearchTool::ResearchSynthesizer(t) => t,
        }
    }
}

#[async_trait]
impl<'a> Tool for ResearchTool<'a> {
    fn kind(&self) -> ToolKind {
        self.as_tool().kind()
    }

    fn description(&self) -> &str {
        self.as_tool().description()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.as_tool().parameters_schema()
    }

    async fn invoke(&self, input: serde_json::Value) -> Result<ToolOutput, ToolError> {
        self.as_tool().invoke(input).await
    }
}

/// The three research tools, wired to their collaborators.
pub struct ToolSet {
    pub web_search: WebSearchTool,
    pub content_extractor: ContentExtractor,
    pub synthesizer: ResearchSynthesizer,
}

impl ToolSet {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
        config: &ToolsConfig,
    ) -> Self {
        Self {
            web_search: WebSearchTool::new(search, &config.web_search),
            content_extractor: ContentExtractor::new(fetcher, &config.content_extractor),
            synthesizer: ResearchSynthesizer::new(&config.research_synthesizer),
        }
    }

    /// Build with the HTTP search provider and page fetcher named in config.
    pub fn from_config(config: &ToolsConfig) -> Result<Self, ToolError> {
        let user_agent = &config.content_extractor.user_agent;
        let search = build_search_provider(&config.web_search, user_agent)?;
        let fetcher = HttpPageFetcher::new(user_agent).map_err(|e| ToolError::ExecutionFailed {
            tool_name: ToolKind::ContentExtractor.name().into(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(search, Arc::new(fetcher), config))
    }

    pub fn get(&self, kind: ToolKind) -> ResearchTool<'_> {
        match kind {
            ToolKind::WebSearch => ResearchTool::WebSearch(&self.web_search),
            ToolKind::ContentExtractor => ResearchTool::ContentExtractor(&self.content_extractor),
            ToolKind::ResearchSynthesizer => ResearchTool::ResearchSynthesizer(&self.synthesizer),
        }
    }

    pub async fn invoke(
        &self,
        kind: ToolKind,
        input: serde_json::Value,
    ) -> Result<ToolOutput, ToolError> {
        self.get(kind).invoke(input).await
    }

    /// Definitions of every tool, in [`ToolKind::ALL`] order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        ToolKind::ALL
            .into_iter()
            .map(|kind| self.get(kind).to_definition())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepbrief_core::error::{FetchError, SearchError};
    use deepbrief_core::fetch::FetchedPage;
    use deepbrief_core::research::SearchResult;

    struct OneHit;

    #[async_trait]
    impl SearchProvider for OneHit {
        fn name(&self) -> &str {
            "one"
        }

        async fn search(&self, query: &str, _num: usize) -> Result<Vec<SearchResult>, SearchError> {
            Ok(vec![SearchResult {
                title: query.into(),
                url: "https://one.example".into(),
                snippet: String::new(),
            }])
        }
    }

    struct StaticPage;

    #[async_trait]
    impl PageFetcher for StaticPage {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
            Ok(FetchedPage::html(url, "<p>Static page text that is long enough.</p>"))
        }
    }

    fn tool_set() -> ToolSet {
        ToolSet::new(Arc::new(OneHit), Arc::new(StaticPage), &ToolsConfig::default())
    }

    #[test]
    fn dispatch_matches_kind() {
        let tools = tool_set();
        for kind in ToolKind::ALL {
            let tool = tools.get(kind);
            assert_eq!(tool.kind(), kind);
            assert_eq!(tool.name(), kind.name());
        }
    }

    #[test]
    fn definitions_cover_the_closed_set() {
        let names: Vec<_> = tool_set().definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["web_search", "content_extractor", "research_synthesizer"]);
    }

    #[tokio::test]
    async fn invoke_by_kind() {
        let tools = tool_set();
        let search = tools
            .invoke(ToolKind::WebSearch, serde_json::json!({"query": "rust"}))
            .await
            .unwrap();
        assert!(search.output.contains("https://one.example"));

        let extract = tools
            .invoke(
                ToolKind::ContentExtractor,
                serde_json::json!({"url": "https://one.example"}),
            )
            .await
            .unwrap();
        assert!(extract.success);
        assert_eq!(extract.output, "Static page text that is long enough.");
    }

    #[test]
    fn from_default_config_builds() {
        assert!(ToolSet::from_config(&ToolsConfig::default()).is_ok());
    }
}
