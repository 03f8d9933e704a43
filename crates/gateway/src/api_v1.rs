//! HTTP API v1.
//!
//! Endpoints (nested under `/api/v1`):
//!
//! - `POST /research`: Research a topic, get sources and synthesis
//! - `GET  /tools`: List the research tools
//! - `GET  /memory`: Session memory snapshot

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use deepbrief_core::error::WorkflowError;
use deepbrief_core::research::WorkflowResult;
use deepbrief_memory::MemoryEntry;
use deepbrief_workflow::ResearchWorkflow;

// ── State ─────────────────────────────────────────────────────────────────

/// Upper bound for a request's `max_sources`.
pub const MAX_SOURCES_LIMIT: usize = 10;

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub workflow: Arc<ResearchWorkflow>,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl ApiV1State {
    pub fn new(workflow: Arc<ResearchWorkflow>) -> Self {
        Self {
            workflow,
            start_time: chrono::Utc::now(),
        }
    }
}

pub type SharedApiState = Arc<ApiV1State>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/api/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/research", post(research_handler))
        .route("/tools", get(list_tools_handler))
        .route("/memory", get(memory_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ResearchRequest {
    /// Missing and blank topics are both rejected as `invalid_topic`.
    #[serde(default)]
    topic: String,

    #[serde(default)]
    max_sources: Option<usize>,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Serialize, Deserialize)]
pub struct ToolDto {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Serialize, Deserialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDto>,
    pub count: usize,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryResponse {
    pub entries: Vec<MemoryEntry>,
    pub count: usize,
    pub total_tokens: usize,
    pub max_token_limit: usize,
    pub uptime_secs: u64,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn research_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Json<WorkflowResult>, ApiError> {
    if let Some(n) = payload.max_sources
        && !(1..=MAX_SOURCES_LIMIT).contains(&n)
    {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            format!("max_sources must be between 1 and {MAX_SOURCES_LIMIT}, got {n}"),
        ));
    }

    info!(topic_len = payload.topic.len(), max_sources = ?payload.max_sources, "v1/research request");

    // A dropped request (client gone) drops this guard and cancels the run.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    state
        .workflow
        .run_limited(&payload.topic, payload.max_sources, cancel)
        .await
        .map(Json)
        .map_err(workflow_error)
}

async fn list_tools_handler(State(state): State<SharedApiState>) -> Json<ToolListResponse> {
    let defs = state.workflow.tools().definitions();
    let count = defs.len();

    Json(ToolListResponse {
        tools: defs
            .into_iter()
            .map(|d| ToolDto {
                name: d.name,
                description: d.description,
                parameters: d.parameters,
            })
            .collect(),
        count,
    })
}

async fn memory_handler(State(state): State<SharedApiState>) -> Json<MemoryResponse> {
    let mut memory = state.workflow.memory().lock().await;
    // Expired entries must not be served.
    memory.prune();
    let entries = memory.snapshot();

    let uptime = chrono::Utc::now()
        .signed_duration_since(state.start_time)
        .num_seconds()
        .max(0) as u64;

    Json(MemoryResponse {
        count: entries.len(),
        entries,
        total_tokens: memory.total_tokens(),
        max_token_limit: memory.max_token_limit(),
        uptime_secs: uptime,
    })
}

// ── Errors ────────────────────────────────────────────────────────────────

fn error_response(status: StatusCode, kind: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: kind.to_string(),
            message: message.into(),
        }),
    )
}

/// `InvalidTopic` is the caller's fault; search outages and cancellation
/// are reported as the service being unavailable.
fn workflow_error(e: WorkflowError) -> ApiError {
    let status = match &e {
        WorkflowError::InvalidTopic(_) => StatusCode::BAD_REQUEST,
        WorkflowError::SearchUnavailable(_) | WorkflowError::Cancelled => {
            warn!(error = %e, "Research run did not complete");
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    error_response(status, e.kind(), e.to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────
