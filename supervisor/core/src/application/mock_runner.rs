// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Scripted mock backend.
//!
//! Emits a fixed event sequence over time so the control plane, transport,
//! and dashboard can be exercised without a real agent SDK:
//!
//! 1. `lifecycle(started)`
//! 2. `status("Starting task...")`
//! 3. `tool_call` requested → running → completed
//! 4. `decision(tool_approval)` — blocks until `POST /resolve` (skipped when
//!    the brief's control mode disables gating)
//! 5. `artifact`
//! 6. `completion(success)`

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::application::runner::{AgentRunner, RunnerCapabilities, RunnerContext, Support};
use crate::domain::brief::{AgentBrief, ArtifactKind, ArtifactStatus, BlastRadius, Severity};
use crate::domain::error::SupervisorError;
use crate::domain::events::{
    AdapterEvent, AgentEvent, ArtifactEvent, CompletionEvent, CompletionOutcome, DecisionEvent,
    EventFactory, LifecycleAction, LifecycleEvent, Provenance, StatusEvent, ToolApprovalEvent,
    ToolCallEvent, ToolCallPhase,
};
use crate::domain::handle::{
    AgentHandle, AgentStatus, KillResponse, ResolveRequest, SdkCheckpoint, SerializationReason,
    SerializedAgentState,
};

const PLUGIN_NAME: &str = "aegis-mock";

pub struct MockRunner {
    brief: AgentBrief,
    agent_id: String,
    session_id: String,
    gating: bool,
    factory: EventFactory,
    context: RunnerContext,
    status: Mutex<AgentHandle>,
    buffer: Mutex<Vec<AdapterEvent>>,
    pending_decision: Mutex<Option<(String, oneshot::Sender<ResolveRequest>)>>,
    script_task: Mutex<Option<JoinHandle<()>>>,
    killed: AtomicBool,
    completed: AtomicBool,
    artifacts_emitted: AtomicU64,
}

impl MockRunner {
    pub fn new(brief: AgentBrief, context: RunnerContext) -> Self {
        let agent_id = brief.agent_id.clone();
        let session_id = Uuid::new_v4().to_string();
        let gating = brief.decision_gating_enabled();
        Self {
            status: Mutex::new(AgentHandle::new(
                &agent_id,
                PLUGIN_NAME,
                AgentStatus::Running,
                &session_id,
            )),
            factory: EventFactory::new(Uuid::new_v4().to_string()),
            agent_id,
            session_id,
            gating,
            brief,
            context,
            buffer: Mutex::new(Vec::new()),
            pending_decision: Mutex::new(None),
            script_task: Mutex::new(None),
            killed: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            artifacts_emitted: AtomicU64::new(0),
        }
    }

    fn emit(&self, event: AgentEvent) {
        if matches!(event, AgentEvent::Artifact(_)) {
            self.artifacts_emitted.fetch_add(1, Ordering::SeqCst);
        }
        let envelope = self.factory.wrap(event);
        self.buffer.lock().push(envelope);
    }

    fn set_status(&self, status: AgentStatus) {
        self.status.lock().status = status;
    }

    fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    fn serialize(&self, reason: SerializationReason) -> SerializedAgentState {
        let pending_decision_ids = self
            .pending_decision
            .lock()
            .as_ref()
            .map(|(id, _)| vec![id.clone()])
            .unwrap_or_default();
        SerializedAgentState {
            agent_id: self.agent_id.clone(),
            plugin_name: PLUGIN_NAME.to_string(),
            session_id: self.session_id.clone(),
            checkpoint: SdkCheckpoint {
                sdk: "mock".to_string(),
                script_position: Some(self.factory.last_sequence()),
                ..SdkCheckpoint::default()
            },
            brief_snapshot: self.brief.clone(),
            conversation_summary: None,
            pending_decision_ids,
            last_sequence: self.factory.last_sequence(),
            serialized_at: Utc::now(),
            serialized_by: reason,
            estimated_size_bytes: 256,
        }
    }

    async fn stop_script(&self) {
        // Dropping the sender wakes a script blocked on a decision.
        self.pending_decision.lock().take();
        let task = self.script_task.lock().take();
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }
    }

    async fn run_script(self: Arc<Self>) {
        self.emit(AgentEvent::Lifecycle(LifecycleEvent {
            agent_id: self.agent_id.clone(),
            action: LifecycleAction::Started,
            reason: None,
        }));
        tokio::time::sleep(Duration::from_millis(100)).await;
        if self.is_killed() {
            return;
        }

        self.emit(AgentEvent::Status(StatusEvent {
            agent_id: self.agent_id.clone(),
            message: "Starting task...".to_string(),
            tick: Some(self.context.ticks.current_tick()),
        }));
        tokio::time::sleep(Duration::from_millis(100)).await;
        if self.is_killed() {
            return;
        }

        let tool_call_id = Uuid::new_v4().to_string();
        let input = json!({"query": "project requirements"});
        self.emit(AgentEvent::ToolCall(ToolCallEvent {
            agent_id: self.agent_id.clone(),
            tool_call_id: tool_call_id.clone(),
            tool_name: "file_search".to_string(),
            phase: ToolCallPhase::Requested,
            input: input.clone(),
            output: None,
            approved: true,
            duration_ms: None,
        }));
        tokio::time::sleep(Duration::from_millis(50)).await;

        self.emit(AgentEvent::ToolCall(ToolCallEvent {
            agent_id: self.agent_id.clone(),
            tool_call_id: tool_call_id.clone(),
            tool_name: "file_search".to_string(),
            phase: ToolCallPhase::Running,
            input: input.clone(),
            output: None,
            approved: true,
            duration_ms: None,
        }));
        tokio::time::sleep(Duration::from_millis(100)).await;

        self.emit(AgentEvent::ToolCall(ToolCallEvent {
            agent_id: self.agent_id.clone(),
            tool_call_id,
            tool_name: "file_search".to_string(),
            phase: ToolCallPhase::Completed,
            input,
            output: Some(json!({"results": ["requirements.md"]})),
            approved: true,
            duration_ms: Some(150),
        }));
        tokio::time::sleep(Duration::from_millis(50)).await;
        if self.is_killed() {
            return;
        }

        if self.gating {
            let decision_id = Uuid::new_v4().to_string();
            let (tx, rx) = oneshot::channel();
            *self.pending_decision.lock() = Some((decision_id.clone(), tx));
            self.set_status(AgentStatus::WaitingOnHuman);

            self.emit(AgentEvent::Decision(DecisionEvent::ToolApproval(
                ToolApprovalEvent {
                    agent_id: self.agent_id.clone(),
                    decision_id,
                    tool_name: "execute_code".to_string(),
                    tool_args: json!({"code": "print('hello world')", "language": "python"}),
                    severity: Some(Severity::Medium),
                    confidence: Some(0.85),
                    blast_radius: Some(BlastRadius::Small),
                    affected_artifact_ids: None,
                    due_by_tick: None,
                },
            )));

            match rx.await {
                Ok(resolution) => debug!(decision_id = %resolution.decision_id, "decision resolved"),
                // Sender dropped: the run was paused or killed while blocked.
                Err(_) => return,
            }
            self.pending_decision.lock().take();
            if self.is_killed() {
                return;
            }
            self.set_status(AgentStatus::Running);
        }

        let artifact_id = Uuid::new_v4().to_string();
        self.emit(AgentEvent::Artifact(ArtifactEvent {
            agent_id: self.agent_id.clone(),
            artifact_id: artifact_id.clone(),
            name: "report.md".to_string(),
            kind: ArtifactKind::Document,
            workstream: self.brief.workstream.clone(),
            status: ArtifactStatus::Draft,
            quality_score: 0.9,
            provenance: Provenance::created_now(&self.agent_id),
            uri: Some("/workspace/output/report.md".to_string()),
            mime_type: Some("text/markdown".to_string()),
            size_bytes: Some(1024),
            content_hash: None,
        }));
        tokio::time::sleep(Duration::from_millis(50)).await;
        if self.is_killed() {
            return;
        }

        self.emit(AgentEvent::Completion(CompletionEvent {
            agent_id: self.agent_id.clone(),
            summary: "Mock task completed successfully. Generated report.md.".to_string(),
            artifacts_produced: vec![artifact_id],
            decisions_needed: vec![],
            outcome: CompletionOutcome::Success,
            reason: None,
        }));
        self.set_status(AgentStatus::Completed);
        self.completed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AgentRunner for MockRunner {
    fn capabilities(&self) -> RunnerCapabilities {
        RunnerCapabilities {
            pause: Support::Yes,
            // The script restarts from the top on resume.
            resume: Support::Partial,
            kill: Support::Yes,
            hot_brief_update: false,
        }
    }

    fn handle(&self) -> AgentHandle {
        self.status.lock().clone()
    }

    fn is_running(&self) -> bool {
        !self.killed.load(Ordering::SeqCst) && !self.completed.load(Ordering::SeqCst)
    }

    fn start(self: Arc<Self>) {
        let runner = self.clone();
        let task = tokio::spawn(runner.run_script());
        *self.script_task.lock() = Some(task);
    }

    async fn pause(&self) -> Result<SerializedAgentState, SupervisorError> {
        self.capabilities().require("pause")?;
        self.killed.store(true, Ordering::SeqCst);
        let state = self.serialize(SerializationReason::Pause);
        self.stop_script().await;
        self.emit(AgentEvent::Lifecycle(LifecycleEvent {
            agent_id: self.agent_id.clone(),
            action: LifecycleAction::Paused,
            reason: None,
        }));
        self.set_status(AgentStatus::Paused);
        Ok(state)
    }

    async fn kill(
        &self,
        grace: bool,
        _grace_timeout: Option<Duration>,
    ) -> Result<KillResponse, SupervisorError> {
        self.killed.store(true, Ordering::SeqCst);
        let state = grace.then(|| self.serialize(SerializationReason::KillGrace));
        self.stop_script().await;
        self.emit(AgentEvent::Lifecycle(LifecycleEvent {
            agent_id: self.agent_id.clone(),
            action: LifecycleAction::Killed,
            reason: Some(
                if grace {
                    "kill requested (graceful)"
                } else {
                    "kill requested (force)"
                }
                .to_string(),
            ),
        }));
        self.set_status(AgentStatus::Completed);
        Ok(KillResponse {
            state,
            artifacts_extracted: self.artifacts_emitted.load(Ordering::SeqCst),
            clean_shutdown: grace,
        })
    }

    fn resolve_decision(&self, request: &ResolveRequest) -> bool {
        let mut pending = self.pending_decision.lock();
        let matches = pending
            .as_ref()
            .is_some_and(|(id, _)| *id == request.decision_id);
        if !matches {
            return false;
        }
        let (_, tx) = pending.take().expect("pending decision present");
        tx.send(request.clone()).is_ok()
    }

    fn checkpoint(&self, decision_id: &str) -> SerializedAgentState {
        let mut state = self.serialize(SerializationReason::DecisionCheckpoint);
        state.conversation_summary = Some("Agent blocked on decision".to_string());
        if !decision_id.is_empty() {
            state.pending_decision_ids = vec![decision_id.to_string()];
        }
        state
    }

    fn drain_events(&self) -> Vec<AdapterEvent> {
        std::mem::take(&mut *self.buffer.lock())
    }

    fn queue_brief_changes(&self, changes: serde_json::Value) {
        self.status.lock().pending_brief_changes = Some(changes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::brief::{
        ActionKind, ControlMode, EscalationProtocol, KnowledgeSnapshot, ProjectBrief,
    };
    use crate::domain::handle::{DecisionResolution, ToolApprovalAction, ToolApprovalResolution};
    use crate::infrastructure::tick_service::TickService;
    use crate::infrastructure::token_service::TokenService;

    fn brief(mode: ControlMode) -> AgentBrief {
        AgentBrief {
            agent_id: "agent-1".to_string(),
            role: "implementer".to_string(),
            description: "Build the thing".to_string(),
            workstream: "backend".to_string(),
            readable_workstreams: vec![],
            constraints: vec![],
            escalation_protocol: EscalationProtocol::default(),
            control_mode: mode,
            project_brief: ProjectBrief {
                id: None,
                title: "Demo".to_string(),
                description: "Demo".to_string(),
                goals: vec![],
                checkpoints: vec![],
                constraints: None,
            },
            knowledge_snapshot: KnowledgeSnapshot::default(),
            model_preference: None,
            allowed_tools: vec![],
            mcp_servers: None,
            workspace_requirements: None,
            output_schema: None,
            guardrail_policy: None,
            delegation_policy: None,
            session_policy: None,
            context_injection_policy: None,
            secret_refs: None,
            provider_config: None,
        }
    }

    fn context() -> RunnerContext {
        RunnerContext {
            ticks: Arc::new(TickService::manual()),
            tokens: Arc::new(TokenService::with_random_secret()),
            workspace: None,
        }
    }

    async fn drain_until<F>(runner: &Arc<MockRunner>, mut pred: F) -> Vec<AdapterEvent>
    where
        F: FnMut(&[AdapterEvent]) -> bool,
    {
        let mut collected = Vec::new();
        for _ in 0..100 {
            collected.extend(runner.drain_events());
            if pred(&collected) {
                return collected;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("timed out waiting for events; got {collected:?}");
    }

    fn approval(decision_id: &str) -> ResolveRequest {
        ResolveRequest {
            decision_id: decision_id.to_string(),
            resolution: DecisionResolution::ToolApproval(ToolApprovalResolution {
                action: ToolApprovalAction::Approve,
                modified_args: None,
                always_approve: None,
                rationale: None,
                action_kind: ActionKind::Review,
            }),
        }
    }

    #[tokio::test]
    async fn gated_script_blocks_until_resolved_then_completes() {
        let runner = Arc::new(MockRunner::new(brief(ControlMode::Orchestrator), context()));
        runner.clone().start();

        let events = drain_until(&runner, |events| {
            events
                .iter()
                .any(|e| matches!(e.event, AgentEvent::Decision(_)))
        })
        .await;
        assert_eq!(runner.handle().status, AgentStatus::WaitingOnHuman);

        let decision_id = events
            .iter()
            .find_map(|e| match &e.event {
                AgentEvent::Decision(d) => Some(d.decision_id().to_string()),
                _ => None,
            })
            .unwrap();
        assert!(runner.resolve_decision(&approval(&decision_id)));

        let rest = drain_until(&runner, |events| {
            events
                .iter()
                .any(|e| matches!(e.event, AgentEvent::Completion(_)))
        })
        .await;
        assert!(rest
            .iter()
            .any(|e| matches!(e.event, AgentEvent::Artifact(_))));
        assert_eq!(runner.handle().status, AgentStatus::Completed);
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn ecosystem_mode_skips_decision_gating() {
        let runner = Arc::new(MockRunner::new(brief(ControlMode::Ecosystem), context()));
        runner.clone().start();

        let events = drain_until(&runner, |events| {
            events
                .iter()
                .any(|e| matches!(e.event, AgentEvent::Completion(_)))
        })
        .await;
        assert!(!events
            .iter()
            .any(|e| matches!(e.event, AgentEvent::Decision(_))));
    }

    #[tokio::test]
    async fn sequences_are_strictly_increasing_per_run() {
        let runner = Arc::new(MockRunner::new(brief(ControlMode::Ecosystem), context()));
        runner.clone().start();
        let events = drain_until(&runner, |events| {
            events
                .iter()
                .any(|e| matches!(e.event, AgentEvent::Completion(_)))
        })
        .await;
        let sequences: Vec<u64> = events.iter().map(|e| e.source_sequence).collect();
        let mut sorted = sequences.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sequences, sorted);
        assert_eq!(sequences[0], 1);
        assert!(events.iter().all(|e| e.run_id == events[0].run_id));
    }

    #[tokio::test]
    async fn resolve_with_unknown_id_returns_false() {
        let runner = Arc::new(MockRunner::new(brief(ControlMode::Orchestrator), context()));
        runner.clone().start();
        drain_until(&runner, |events| {
            events
                .iter()
                .any(|e| matches!(e.event, AgentEvent::Decision(_)))
        })
        .await;
        assert!(!runner.resolve_decision(&approval("no-such-decision")));
    }

    #[tokio::test]
    async fn graceful_kill_produces_checkpoint_and_killed_event() {
        let runner = Arc::new(MockRunner::new(brief(ControlMode::Orchestrator), context()));
        runner.clone().start();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let response = runner.kill(true, None).await.unwrap();
        let state = response.state.expect("graceful kill serializes state");
        assert_eq!(state.serialized_by, SerializationReason::KillGrace);
        assert!(response.clean_shutdown);

        let events = runner.drain_events();
        assert!(events.iter().any(|e| matches!(
            &e.event,
            AgentEvent::Lifecycle(LifecycleEvent {
                action: LifecycleAction::Killed,
                ..
            })
        )));
        assert_eq!(runner.handle().status, AgentStatus::Completed);
    }

    #[tokio::test]
    async fn pause_serializes_pending_decision_ids() {
        let runner = Arc::new(MockRunner::new(brief(ControlMode::Orchestrator), context()));
        runner.clone().start();
        drain_until(&runner, |events| {
            events
                .iter()
                .any(|e| matches!(e.event, AgentEvent::Decision(_)))
        })
        .await;

        let state = runner.pause().await.unwrap();
        assert_eq!(state.serialized_by, SerializationReason::Pause);
        assert_eq!(state.pending_decision_ids.len(), 1);
        assert_eq!(state.checkpoint.sdk, "mock");
        assert_eq!(runner.handle().status, AgentStatus::Paused);
    }
}
