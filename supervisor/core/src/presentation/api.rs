// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP/WebSocket surface of the supervisor.
//!
//! JSON bodies are camelCase exclusively. Failures map the error taxonomy to
//! status codes (409/404/401/400/501/504) with a `detail` string, matching
//! what the dashboard expects.

use axum::{
    body::Bytes,
    extract::ws::WebSocketUpgrade,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::application::runner::{build_runner, AgentRunner, RunnerContext, RunnerMode};
use crate::domain::audit::{trust_outcomes, AuditEntityType, AuditLogEntry};
use crate::domain::brief::{AgentBrief, ContextInjection};
use crate::domain::error::SupervisorError;
use crate::domain::handle::{
    AgentStatus, DecisionResolution, HealthStatus, KillRequest, ResolveRequest,
    SandboxHealthResponse, SandboxResourceUsage, SerializedAgentState, ToolApprovalAction,
};
use crate::infrastructure::artifact_upload::ArtifactUploader;
use crate::infrastructure::audit_store::InMemoryAuditLog;
use crate::infrastructure::event_stream::{EventStreamer, SharedRunner};
use crate::infrastructure::tick_service::TickService;
use crate::infrastructure::token_service::TokenService;

/// Convenience wait for the first events after spawn/resume; callers must
/// still stream for the rest.
const SPAWN_SETTLE: Duration = Duration::from_millis(50);
/// Bounded window for the runner to emit events after a resolution.
const RESOLVE_SETTLE: Duration = Duration::from_millis(200);
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

impl IntoResponse for SupervisorError {
    fn into_response(self) -> Response {
        let status = match &self {
            SupervisorError::Conflict(_) => StatusCode::CONFLICT,
            SupervisorError::NotFound(_) => StatusCode::NOT_FOUND,
            SupervisorError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            SupervisorError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            SupervisorError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            SupervisorError::Malformed(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({"detail": self.to_string()}))).into_response()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Scripted mock backend instead of the Codex CLI.
    pub mock: bool,
    /// Working directory handed to the Codex CLI.
    pub workspace: Option<String>,
    /// Wall-clock tick interval; defaults to one second.
    pub tick_interval: Option<Duration>,
}

#[derive(Clone)]
pub struct AppState {
    runner: SharedRunner,
    streamer: Arc<EventStreamer>,
    ticks: Arc<TickService>,
    tokens: Arc<TokenService>,
    audit_log: InMemoryAuditLog,
    provider_config: Arc<Mutex<Option<serde_json::Value>>>,
    mock: bool,
    workspace: Option<String>,
    started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let runner: SharedRunner = Arc::new(RwLock::new(None));
        let ticks = Arc::new(TickService::wall_clock(
            config.tick_interval.unwrap_or(DEFAULT_TICK_INTERVAL),
        ));
        ticks.start();
        let streamer = Arc::new(EventStreamer::new(
            runner.clone(),
            ArtifactUploader::from_env(),
        ));
        streamer.start_pump();
        Self {
            runner,
            streamer,
            ticks,
            tokens: Arc::new(TokenService::with_random_secret()),
            audit_log: InMemoryAuditLog::new(),
            provider_config: Arc::new(Mutex::new(None)),
            mock: config.mock,
            workspace: config.workspace,
            started_at: Instant::now(),
        }
    }

    pub fn audit_log(&self) -> &InMemoryAuditLog {
        &self.audit_log
    }

    fn runner_mode(&self) -> RunnerMode {
        if self.mock {
            RunnerMode::Mock
        } else {
            RunnerMode::Codex
        }
    }

    fn runner_context(&self) -> RunnerContext {
        RunnerContext {
            ticks: self.ticks.clone(),
            tokens: self.tokens.clone(),
            workspace: self.workspace.clone(),
        }
    }

    async fn active_runner(&self) -> Result<Arc<dyn AgentRunner>, SupervisorError> {
        self.runner
            .read()
            .await
            .clone()
            .ok_or_else(|| SupervisorError::not_found("No agent running"))
    }
}

pub fn app(config: AppConfig) -> Router {
    let mock = config.mock;
    let state = AppState::new(config);

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/spawn", post(spawn))
        .route("/kill", post(kill))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/resolve", post(resolve))
        .route("/checkpoint", post(checkpoint))
        .route("/inject-context", post(inject_context))
        .route("/update-brief", post(update_brief))
        .route("/events", get(events_ws));

    if mock {
        router = router.route("/debug/config", get(debug_config));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<SandboxHealthResponse> {
    let agent_status = match state.runner.read().await.as_ref() {
        Some(runner) => runner.handle().status,
        None => AgentStatus::Idle,
    };
    Json(SandboxHealthResponse {
        status: HealthStatus::Healthy,
        agent_status,
        uptime_ms: state.started_at.elapsed().as_millis() as u64,
        resource_usage: SandboxResourceUsage {
            cpu_percent: 0.0,
            memory_mb: 0.0,
            disk_mb: 0.0,
            collected_at: Utc::now(),
        },
        pending_event_buffer_size: state.streamer.pending_buffer_size(),
    })
}

async fn spawn(
    State(state): State<AppState>,
    Json(brief): Json<AgentBrief>,
) -> Result<Response, SupervisorError> {
    {
        let slot = state.runner.read().await;
        if slot.as_ref().is_some_and(|r| r.is_running()) {
            return Err(SupervisorError::conflict("Agent already running"));
        }
    }

    info!(agent_id = %brief.agent_id, control_mode = brief.control_mode.as_str(), "spawning agent");
    *state.provider_config.lock() = brief.provider_config.clone();

    let runner = build_runner(state.runner_mode(), brief, state.runner_context(), None);
    *state.runner.write().await = Some(runner.clone());
    runner.clone().start();

    // Let the first events land before returning the handle.
    tokio::time::sleep(SPAWN_SETTLE).await;
    Ok(Json(runner.handle()).into_response())
}

async fn kill(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, SupervisorError> {
    // An absent body means a default graceful kill.
    let request: KillRequest = if body.is_empty() {
        KillRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| SupervisorError::Malformed(format!("Invalid kill request: {e}")))?
    };
    let runner = state.active_runner().await?;

    let response = runner
        .kill(
            request.grace,
            request.grace_timeout_ms.map(Duration::from_millis),
        )
        .await?;
    // Capture terminal events, then release the slot so a second kill
    // reports "no agent running".
    state.streamer.drain_runner().await;
    *state.runner.write().await = None;
    Ok(Json(response).into_response())
}

async fn pause(State(state): State<AppState>) -> Result<Response, SupervisorError> {
    let runner = state.active_runner().await?;
    let serialized = runner.pause().await?;
    state.streamer.drain_runner().await;
    Ok(Json(serialized).into_response())
}

async fn resume(
    State(state): State<AppState>,
    Json(serialized): Json<SerializedAgentState>,
) -> Result<Response, SupervisorError> {
    let resume_session_id = serialized
        .checkpoint
        .session_id
        .clone()
        .unwrap_or_else(|| serialized.session_id.clone());
    let brief = serialized.brief_snapshot;
    info!(agent_id = %brief.agent_id, session_id = %resume_session_id, "resuming agent");
    *state.provider_config.lock() = brief.provider_config.clone();

    let runner = build_runner(
        state.runner_mode(),
        brief,
        state.runner_context(),
        Some(resume_session_id),
    );
    *state.runner.write().await = Some(runner.clone());
    runner.clone().start();

    tokio::time::sleep(SPAWN_SETTLE).await;
    Ok(Json(runner.handle()).into_response())
}

async fn resolve(
    State(state): State<AppState>,
    Json(request): Json<ResolveRequest>,
) -> Result<Response, SupervisorError> {
    let runner = state.active_runner().await?;
    if !runner.resolve_decision(&request) {
        return Err(SupervisorError::not_found(format!(
            "No pending decision with id {}",
            request.decision_id
        )));
    }
    record_trust_outcome(&state, &runner, &request);

    // Give the unblocked run a bounded window to emit follow-up events.
    tokio::time::sleep(RESOLVE_SETTLE).await;
    Ok(Json(json!({"status": "resolved", "decisionId": request.decision_id})).into_response())
}

/// Decision resolutions feed the trust ledger the analyzers mine. Rejecting
/// or modifying a requested tool call is a human override.
fn record_trust_outcome(state: &AppState, runner: &Arc<dyn AgentRunner>, request: &ResolveRequest) {
    let (outcome, decision_type) = match &request.resolution {
        DecisionResolution::ToolApproval(resolution) => (
            match resolution.action {
                ToolApprovalAction::Approve => trust_outcomes::HUMAN_CONFIRMS_AGENT_DECISION,
                ToolApprovalAction::Reject | ToolApprovalAction::Modify => {
                    trust_outcomes::HUMAN_OVERRIDES_AGENT_DECISION
                }
            },
            "tool_approval",
        ),
        DecisionResolution::OptionChoice(_) => {
            (trust_outcomes::HUMAN_CONFIRMS_AGENT_DECISION, "option")
        }
    };
    let details = json!({
        "outcome": outcome,
        "decisionType": decision_type,
        "tick": state.ticks.current_tick(),
    });
    state.audit_log.append(
        AuditLogEntry::new(
            AuditEntityType::TrustOutcome,
            &request.decision_id,
            "decision_resolution",
            details,
        )
        .with_caller(runner.handle().id),
    );
}

async fn checkpoint(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Response, SupervisorError> {
    let runner = state.active_runner().await?;
    let decision_id = body
        .get("decisionId")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    Ok(Json(runner.checkpoint(decision_id)).into_response())
}

async fn debug_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({"providerConfig": state.provider_config.lock().clone()}))
}

async fn inject_context(Json(_injection): Json<ContextInjection>) -> Json<serde_json::Value> {
    // Plumbing only in this phase: accepted, not acted on.
    Json(json!({"status": "accepted"}))
}

async fn update_brief(
    State(state): State<AppState>,
    Json(changes): Json<serde_json::Value>,
) -> Result<Response, SupervisorError> {
    let runner = state.active_runner().await?;
    // No backend supports hot updates yet; the change is queued on the
    // handle and takes effect on the next spawn/resume cycle.
    runner.queue_brief_changes(changes);
    Ok(Json(json!({"status": "accepted"})).into_response())
}

async fn events_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| state.streamer.clone().serve(socket))
}
