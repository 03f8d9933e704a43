//! End-to-end integration tests for the DeepBrief research pipeline.
//!
//! These tests wire the real adapters (DuckDuckGo HTML search, reqwest page
//! fetcher, OpenAI-compatible LLM) from configuration and point them at a
//! local mock server, then drive the workflow directly and through the
//! HTTP gateway.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use deepbrief_config::{AppConfig, ProviderConfig};
use deepbrief_core::error::WorkflowError;
use deepbrief_core::event::EventBus;
use deepbrief_gateway::api_v1::ApiV1State;
use deepbrief_workflow::ResearchWorkflow;

const OWNERSHIP_PAGE: &str = "<html><head><title>Ownership</title></head><body>\
    <nav>Menu Docs Blog</nav>\
    <article><p>Ownership is a set of rules that govern how a Rust program manages memory.</p>\
    <p>Each value in Rust has a variable that is called its owner.</p></article>\
    <footer>Copyright</footer></body></html>";

const BORROWING_PAGE: &str = "<html><head><title>Borrowing</title></head><body>\
    <main><p>References allow you to refer to a value without taking ownership of it.</p>\
    <script>track()</script><p>Short.</p></main></body></html>";

const BRIEF: &str = "Rust manages memory through ownership and borrowing.";

// ── Fixtures ─────────────────────────────────────────────────────────────

fn search_page(base: &str) -> String {
    let result = |slug: &str, title: &str| {
        format!(
            r#"<div class="result"><h2><a rel="nofollow" class="result__a" href="{base}/articles/{slug}">{title}</a></h2>
            <a class="result__snippet" href="{base}/articles/{slug}">About {title}</a></div>"#
        )
    };
    format!(
        "<html><body>{}{}{}</body></html>",
        result("ownership", "Ownership"),
        result("missing", "Gone"),
        result("borrowing", "Borrowing")
    )
}

async fn mount_search(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/html/"))
        .and(query_param("q", "rust ownership"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(search_page(&server.uri()), "text/html"))
        .mount(server)
        .await;
}

async fn mount_pages(server: &MockServer) {
    for (slug, body) in [("ownership", OWNERSHIP_PAGE), ("borrowing", BORROWING_PAGE)] {
        Mock::given(method("GET"))
            .and(path(format!("/articles/{slug}")))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8"))
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/articles/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

async fn mount_llm(server: &MockServer, status: u16, expected_calls: u64) {
    let response = if status == 200 {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "gpt-4-turbo-preview",
            "choices": [{"message": {"role": "assistant", "content": BRIEF}}]
        }))
    } else {
        ResponseTemplate::new(status)
    };
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(response)
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Configuration pointing every adapter at `server`, with no retry pauses.
fn config_for(server: &MockServer, with_llm: bool) -> AppConfig {
    let mut config = AppConfig::default();
    config.tools.web_search.api_url = Some(server.uri());
    config.tools.web_search.retry_delay = 0.0;
    config.tools.content_extractor.retry_delay = 0.0;
    config.tools.content_extractor.timeout = 5.0;
    config.agents.retry_delay = 0.0;
    if with_llm {
        config.api_key = Some("sk-test".into());
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: None,
                api_url: Some(format!("{}/v1", server.uri())),
                default_model: None,
            },
        );
    }
    config
}

fn workflow_for(config: &AppConfig) -> ResearchWorkflow {
    ResearchWorkflow::from_config(config, Arc::new(EventBus::default())).unwrap()
}

// ── Workflow ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn research_pipeline_over_http_adapters() {
    let server = MockServer::start().await;
    mount_search(&server).await;
    mount_pages(&server).await;
    mount_llm(&server, 200, 1).await;

    let workflow = workflow_for(&config_for(&server, true));
    let result = workflow.run("rust ownership").await.unwrap();

    let urls: Vec<_> = result.sources.iter().map(|s| s.url.clone()).collect();
    assert_eq!(
        urls,
        [
            format!("{}/articles/ownership", server.uri()),
            format!("{}/articles/missing", server.uri()),
            format!("{}/articles/borrowing", server.uri()),
        ]
    );
    assert_eq!(result.sources[0].snippet, "About Ownership");

    assert_eq!(result.partial_failures.len(), 1);
    assert_eq!(result.partial_failures[0].url, urls[1]);
    assert!(result.partial_failures[0].reason.contains("404"));

    assert_eq!(
        result.synthesis.key_points,
        [
            "Ownership is a set of rules that govern how a Rust program manages memory.",
            "Each value in Rust has a variable that is called its owner.",
            "References allow you to refer to a value without taking ownership of it.",
        ]
    );
    assert_eq!(result.synthesis.source_urls, [urls[0].clone(), urls[2].clone()]);
    assert_eq!(result.synthesis.summary.as_deref(), Some(BRIEF));

    let memory = workflow.memory().lock().await.snapshot();
    assert_eq!(memory.len(), 1);
    assert_eq!(memory[0].summary, BRIEF);
}

#[tokio::test]
async fn llm_outage_keeps_key_points() {
    let server = MockServer::start().await;
    mount_search(&server).await;
    mount_pages(&server).await;
    // Three attempts under the agent retry policy, then give up.
    mount_llm(&server, 500, 3).await;

    let workflow = workflow_for(&config_for(&server, true));
    let result = workflow.run("rust ownership").await.unwrap();

    assert!(result.synthesis.summary.is_none());
    assert_eq!(result.synthesis.key_points.len(), 3);
}

#[tokio::test]
async fn search_outage_fails_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let workflow = workflow_for(&config_for(&server, false));
    let err = workflow.run("rust ownership").await.unwrap_err();
    assert!(matches!(err, WorkflowError::SearchUnavailable(_)));
}

// ── Gateway ──────────────────────────────────────────────────────────────

fn gateway_for(config: &AppConfig) -> axum::Router {
    let workflow = Arc::new(workflow_for(config));
    deepbrief_gateway::build_router(Arc::new(ApiV1State::new(workflow)), &[])
}

fn post_research(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/research")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn gateway_serves_research_results() {
    let server = MockServer::start().await;
    mount_search(&server).await;
    mount_pages(&server).await;

    let app = gateway_for(&config_for(&server, false));
    let response = app
        .clone()
        .oneshot(post_research(serde_json::json!({"topic": "rust ownership"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    assert_eq!(body["topic"], "rust ownership");
    assert_eq!(body["sources"].as_array().unwrap().len(), 3);
    assert_eq!(body["partialFailures"].as_array().unwrap().len(), 1);
    assert_eq!(body["metadata"]["sourceCount"], 3);
    assert_eq!(body["metadata"]["failureCount"], 1);
    assert!(body["metadata"]["durationMs"].is_u64());
    assert!(body["metadata"]["completedAt"].is_string());
    assert_eq!(body["synthesis"]["keyPoints"].as_array().unwrap().len(), 3);
    assert!(body["synthesis"].get("summary").is_none());

    let memory = app
        .oneshot(Request::builder().uri("/api/v1/memory").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let memory = json(memory).await;
    assert_eq!(memory["count"], 1);
    assert_eq!(memory["entries"][0]["topic"], "rust ownership");
}

#[tokio::test]
async fn gateway_maps_search_outage_to_503() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let response = gateway_for(&config_for(&server, false))
        .oneshot(post_research(serde_json::json!({"topic": "rust ownership"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json(response).await["error"], "search_unavailable");
}

#[tokio::test]
async fn gateway_rejects_blank_topic_without_searching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let response = gateway_for(&config_for(&server, false))
        .oneshot(post_research(serde_json::json!({"topic": " \n "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json(response).await;
    assert_eq!(body["error"], "invalid_topic");
    assert!(body["message"].as_str().unwrap().contains("must not be empty"));
}
