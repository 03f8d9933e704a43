//! HTTP API gateway for DeepBrief.
//!
//! Exposes the research pipeline over REST: `POST /api/v1/research` plus
//! tool and memory listings, and a `/health` check.
//!
//! Built on Axum for high performance async HTTP.

pub mod api_v1;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use deepbrief_core::event::EventBus;
use deepbrief_workflow::ResearchWorkflow;

/// Request body limit for every route.
const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Build the full router: `/health` plus the v1 API under `/api/v1`.
///
/// Layers applied:
/// - CORS restricted to the configured origins
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(api_state: api_v1::SharedApiState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", api_v1::v1_router(api_state))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors_layer(allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// CORS for the configured origins. With none configured, no cross-origin
/// request is allowed.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
///
/// Builds the workflow (tools, session memory, optional LLM brief) once and
/// shares it across requests. Stops on Ctrl-C.
pub async fn start(config: deepbrief_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let event_bus = Arc::new(EventBus::default());
    let workflow = Arc::new(ResearchWorkflow::from_config(&config, event_bus)?);
    let api_state = Arc::new(api_v1::ApiV1State::new(workflow));

    let app = build_router(api_state, &config.gateway.allowed_origins);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use deepbrief_memory::ConversationMemory;
    use deepbrief_tools::ToolSet;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> api_v1::SharedApiState {
        let config = deepbrief_config::ToolsConfig::default();
        let tools = Arc::new(ToolSet::from_config(&config).unwrap());
        let memory = ConversationMemory::new(4096, Duration::from_secs(3600)).shared();
        let workflow = ResearchWorkflow::new(tools, memory, Arc::new(EventBus::default()));
        Arc::new(api_v1::ApiV1State::new(Arc::new(workflow)))
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state(), &[]);

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn v1_is_nested_under_api() {
        let app = build_router(test_state(), &[]);

        let req = Request::builder()
            .uri("/api/v1/tools")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let req = Request::builder()
            .uri("/v1/tools")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let app = build_router(test_state(), &[]);
        let topic = "a".repeat(BODY_LIMIT_BYTES + 1);

        let req = Request::builder()
            .method("POST")
            .uri("/api/v1/research")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::json!({"topic": topic}).to_string()))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn configured_origin_gets_cors_headers() {
        let app = build_router(test_state(), &["http://localhost:3000".to_string()]);

        let req = Request::builder()
            .uri("/health")
            .header("origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );
    }
}
