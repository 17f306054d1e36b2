// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Runner protocol: the uniform seam between the control plane and a
//! concrete agent backend.
//!
//! Different backends support different subsets of pause/resume/kill/hot
//! brief update, so every adapter declares a static capability descriptor and
//! unsupported operations fail with `Unsupported` instead of silently
//! no-opping. Concrete runners are constructed through [`build_runner`],
//! keyed on a mode flag.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::application::codex_runner::CodexRunner;
use crate::application::mock_runner::MockRunner;
use crate::domain::brief::AgentBrief;
use crate::domain::error::SupervisorError;
use crate::domain::events::AdapterEvent;
use crate::domain::handle::{
    AgentHandle, KillResponse, ResolveRequest, SerializedAgentState,
};
use crate::infrastructure::tick_service::TickService;
use crate::infrastructure::token_service::TokenService;

/// Degree of backend support for one runner operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Support {
    Yes,
    No,
    /// The operation succeeds but may lose some in-flight state.
    Partial,
}

impl Support {
    pub fn is_available(&self) -> bool {
        !matches!(self, Support::No)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerCapabilities {
    pub pause: Support,
    pub resume: Support,
    pub kill: Support,
    pub hot_brief_update: bool,
}

impl RunnerCapabilities {
    pub fn require(&self, operation: &str) -> Result<(), SupervisorError> {
        let support = match operation {
            "pause" => self.pause,
            "resume" => self.resume,
            "kill" => self.kill,
            _ => return Ok(()),
        };
        if support.is_available() {
            Ok(())
        } else {
            Err(SupervisorError::unsupported(format!(
                "Backend does not support {operation}"
            )))
        }
    }
}

/// One live agent session behind a uniform protocol.
///
/// A runner instance drives exactly one session; callers serialize
/// operations against it. Events accumulate in an internal queue until
/// [`drain_events`](AgentRunner::drain_events) moves them out.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    fn capabilities(&self) -> RunnerCapabilities;

    fn handle(&self) -> AgentHandle;

    fn is_running(&self) -> bool;

    /// Start the underlying agent process/session. The first emitted event of
    /// a run is `lifecycle(started)`.
    fn start(self: Arc<Self>);

    /// Checkpoint the run and stop it (`serializedBy = "pause"`).
    async fn pause(&self) -> Result<SerializedAgentState, SupervisorError>;

    /// Terminate the run. A graceful kill attempts orderly shutdown and
    /// produces a `kill_grace` checkpoint; a forced kill may report
    /// `cleanShutdown = false`.
    async fn kill(
        &self,
        grace: bool,
        grace_timeout: Option<Duration>,
    ) -> Result<KillResponse, SupervisorError>;

    /// Resolve a pending decision by id. Returns false when no such pending
    /// decision exists.
    fn resolve_decision(&self, request: &ResolveRequest) -> bool;

    /// Snapshot the run without stopping it (`decision_checkpoint`).
    fn checkpoint(&self, decision_id: &str) -> SerializedAgentState;

    /// Return and clear the internally queued, not-yet-delivered events.
    fn drain_events(&self) -> Vec<AdapterEvent>;

    /// Queue a brief change for backends without hot update support; it takes
    /// effect on the next spawn/resume cycle.
    fn queue_brief_changes(&self, changes: serde_json::Value);
}

/// Backend selector for [`build_runner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerMode {
    Mock,
    Codex,
}

/// Shared services handed to every runner at construction.
#[derive(Clone)]
pub struct RunnerContext {
    pub ticks: Arc<TickService>,
    pub tokens: Arc<TokenService>,
    pub workspace: Option<String>,
}

/// Construct the concrete runner for `mode`. `resume_session_id` is set when
/// reconstructing from a checkpoint.
pub fn build_runner(
    mode: RunnerMode,
    brief: AgentBrief,
    context: RunnerContext,
    resume_session_id: Option<String>,
) -> Arc<dyn AgentRunner> {
    match mode {
        RunnerMode::Mock => Arc::new(MockRunner::new(brief, context)),
        RunnerMode::Codex => Arc::new(CodexRunner::new(brief, context, resume_session_id)),
    }
}
