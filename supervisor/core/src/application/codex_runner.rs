// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Codex CLI backend.
//!
//! Spawns `codex exec --full-auto --json` (or the `resume` variant when
//! reconstructing from a checkpoint), reads its NDJSON stdout line by line,
//! and maps each record into wire-protocol events. The child environment
//! carries a freshly issued supervisor token and bridge coordinates so
//! sandboxed tool hooks can call back into the control plane.
//!
//! Decision gating is a no-op for this backend: the CLI runs full-auto, so
//! `resolve_decision` always reports not-found.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::brief_prompt::brief_to_prompt;
use crate::application::event_mapper::CodexEventMapper;
use crate::application::runner::{AgentRunner, RunnerCapabilities, RunnerContext, Support};
use crate::domain::brief::{AgentBrief, Severity};
use crate::domain::error::SupervisorError;
use crate::domain::events::{
    AdapterEvent, AgentEvent, CompletionEvent, CompletionOutcome, ErrorCategory, ErrorEvent,
    EventFactory, LifecycleAction, LifecycleEvent,
};
use crate::domain::handle::{
    AgentHandle, AgentStatus, KillResponse, ResolveRequest, SdkCheckpoint, SerializationReason,
    SerializedAgentState,
};

const PLUGIN_NAME: &str = "aegis-codex";
const DEFAULT_GRACE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CodexRunner {
    brief: AgentBrief,
    agent_id: String,
    session_id: Mutex<String>,
    resume_session_id: Option<String>,
    program: String,
    factory: EventFactory,
    context: RunnerContext,
    status: Mutex<AgentHandle>,
    buffer: Mutex<Vec<AdapterEvent>>,
    child_pid: AtomicU64,
    read_task: Mutex<Option<JoinHandle<()>>>,
    killed: AtomicBool,
    completed: AtomicBool,
    artifacts_emitted: AtomicU64,
    crash_checkpoint: Mutex<Option<SerializedAgentState>>,
}

impl CodexRunner {
    pub fn new(
        brief: AgentBrief,
        context: RunnerContext,
        resume_session_id: Option<String>,
    ) -> Self {
        Self::with_program(brief, context, resume_session_id, "codex")
    }

    /// Test seam: run an arbitrary program in place of the Codex CLI.
    pub fn with_program(
        brief: AgentBrief,
        context: RunnerContext,
        resume_session_id: Option<String>,
        program: impl Into<String>,
    ) -> Self {
        let agent_id = brief.agent_id.clone();
        let session_id = resume_session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            status: Mutex::new(AgentHandle::new(
                &agent_id,
                PLUGIN_NAME,
                AgentStatus::Running,
                &session_id,
            )),
            agent_id,
            session_id: Mutex::new(session_id),
            resume_session_id,
            program: program.into(),
            factory: EventFactory::new(Uuid::new_v4().to_string()),
            context,
            brief,
            buffer: Mutex::new(Vec::new()),
            child_pid: AtomicU64::new(0),
            read_task: Mutex::new(None),
            killed: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            artifacts_emitted: AtomicU64::new(0),
            crash_checkpoint: Mutex::new(None),
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

    fn set_session_id(&self, session_id: String) {
        *self.session_id.lock() = session_id.clone();
        self.status.lock().session_id = session_id;
    }

    fn build_command(&self) -> Command {
        let prompt = brief_to_prompt(&self.brief, false);
        let mut command = Command::new(&self.program);
        command.arg("exec");
        if let Some(resume_session) = &self.resume_session_id {
            if let Some(workspace) = &self.context.workspace {
                command.arg("--cd").arg(workspace);
            }
            command.arg("resume").arg(resume_session);
            command.args(["--full-auto", "--json"]);
            command.arg(&prompt);
        } else {
            command.args(["--full-auto", "--json"]);
            if let Some(workspace) = &self.context.workspace {
                command.arg("--cd").arg(workspace);
            }
            command.arg(&prompt);
        }

        // Tool hooks inside the sandbox authenticate back with this token.
        let token = self.context.tokens.issue_token(&self.agent_id, None, None);
        command.env("AGENT_TOKEN", token.token);
        command.env("BRIDGE_AGENT_ID", &self.agent_id);
        command.env("BRIDGE_RUN_ID", self.factory.run_id());

        command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }

    async fn spawn_and_read(self: Arc<Self>) {
        let mut child = match self.build_command().spawn() {
            Ok(child) => child,
            Err(error) => {
                warn!(%error, "failed to spawn codex CLI");
                self.emit(AgentEvent::Error(ErrorEvent {
                    agent_id: self.agent_id.clone(),
                    severity: Severity::Critical,
                    message: "codex CLI not found. Install with: npm install -g @openai/codex"
                        .to_string(),
                    recoverable: false,
                    error_code: None,
                    category: ErrorCategory::Internal,
                    context: None,
                }));
                self.emit(AgentEvent::Completion(CompletionEvent {
                    agent_id: self.agent_id.clone(),
                    summary: "Failed to start: codex CLI not found".to_string(),
                    artifacts_produced: vec![],
                    decisions_needed: vec![],
                    outcome: CompletionOutcome::Abandoned,
                    reason: None,
                }));
                self.set_status(AgentStatus::Error);
                self.completed.store(true, Ordering::SeqCst);
                return;
            }
        };

        if let Some(pid) = child.id() {
            self.child_pid.store(pid as u64, Ordering::SeqCst);
        }

        self.emit(AgentEvent::Lifecycle(LifecycleEvent {
            agent_id: self.agent_id.clone(),
            action: LifecycleAction::Started,
            reason: None,
        }));

        let stdout = child.stdout.take().expect("stdout piped");
        let mut mapper = CodexEventMapper::new(&self.agent_id, &self.brief.workstream);
        let mut lines = BufReader::new(stdout).lines();

        while let Ok(Some(line)) = lines.next_line().await {
            let data: serde_json::Value = match serde_json::from_str(line.trim()) {
                Ok(data) => data,
                Err(_) => continue,
            };
            for event in mapper.map_event(&data) {
                self.emit(event);
            }
            if let Some(session_id) = mapper.session_id() {
                if *self.session_id.lock() != session_id {
                    self.set_session_id(session_id.to_string());
                }
            }
        }

        let exit = child.wait().await;
        self.child_pid.store(0, Ordering::SeqCst);
        if self.killed.load(Ordering::SeqCst) {
            // kill()/pause() own the terminal events.
            return;
        }

        match exit {
            Ok(status) if status.success() => {
                self.emit(AgentEvent::Completion(CompletionEvent {
                    agent_id: self.agent_id.clone(),
                    summary: "Codex session completed successfully".to_string(),
                    artifacts_produced: vec![],
                    decisions_needed: vec![],
                    outcome: CompletionOutcome::Success,
                    reason: None,
                }));
                self.set_status(AgentStatus::Completed);
            }
            Ok(status) => {
                let exit_code = status.code().unwrap_or(-1);
                let mut stderr_text = String::new();
                if let Some(mut stderr) = child.stderr.take() {
                    let mut raw = Vec::new();
                    let _ = stderr.read_to_end(&mut raw).await;
                    stderr_text = String::from_utf8_lossy(&raw).chars().take(500).collect();
                }
                let message = if stderr_text.is_empty() {
                    format!("Codex exited with code {exit_code}")
                } else {
                    format!("Codex exited with code {exit_code}: {stderr_text}")
                };
                self.emit(AgentEvent::Error(ErrorEvent {
                    agent_id: self.agent_id.clone(),
                    severity: Severity::High,
                    message,
                    recoverable: false,
                    error_code: None,
                    category: ErrorCategory::Internal,
                    context: None,
                }));
                self.emit(AgentEvent::Lifecycle(LifecycleEvent {
                    agent_id: self.agent_id.clone(),
                    action: LifecycleAction::Crashed,
                    reason: Some(format!("Exit code {exit_code}")),
                }));
                // Last-known-good state so a human can resume the session.
                *self.crash_checkpoint.lock() =
                    Some(self.serialize(SerializationReason::CrashRecovery));
                self.set_status(AgentStatus::Error);
            }
            Err(error) => {
                warn!(%error, "failed to reap codex process");
                self.set_status(AgentStatus::Error);
            }
        }
        self.completed.store(true, Ordering::SeqCst);
    }

    fn serialize(&self, reason: SerializationReason) -> SerializedAgentState {
        let session_id = self.session_id.lock().clone();
        SerializedAgentState {
            agent_id: self.agent_id.clone(),
            plugin_name: PLUGIN_NAME.to_string(),
            session_id: session_id.clone(),
            checkpoint: SdkCheckpoint {
                sdk: "codex".to_string(),
                session_id: Some(session_id),
                ..SdkCheckpoint::default()
            },
            brief_snapshot: self.brief.clone(),
            conversation_summary: None,
            pending_decision_ids: vec![],
            last_sequence: self.factory.last_sequence(),
            serialized_at: Utc::now(),
            serialized_by: reason,
            estimated_size_bytes: 512,
        }
    }

    fn signal_child(&self, force: bool) {
        let pid = self.child_pid.load(Ordering::SeqCst);
        if pid == 0 {
            return;
        }
        #[cfg(unix)]
        unsafe {
            let signal = if force { libc::SIGKILL } else { libc::SIGTERM };
            libc::kill(pid as libc::pid_t, signal);
        }
        #[cfg(not(unix))]
        {
            let _ = force;
        }
    }

    /// Stop the child and the read loop. Returns true when shutdown stayed
    /// within the grace window.
    async fn shutdown(&self, grace: bool, grace_timeout: Duration) -> bool {
        self.killed.store(true, Ordering::SeqCst);
        self.signal_child(!grace);

        let task = self.read_task.lock().take();
        let mut clean = true;
        if let Some(task) = task {
            let abort = task.abort_handle();
            if tokio::time::timeout(grace_timeout, task).await.is_err() {
                clean = false;
                self.signal_child(true);
                // Aborting the read task drops the child; kill_on_drop reaps it.
                abort.abort();
            }
        }
        clean && grace
    }
}

#[async_trait]
impl AgentRunner for CodexRunner {
    fn capabilities(&self) -> RunnerCapabilities {
        RunnerCapabilities {
            pause: Support::Yes,
            // The session resumes, but in-flight tool calls are lost.
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
        info!(agent_id = %self.agent_id, program = %self.program, "starting codex runner");
        let runner = self.clone();
        let task = tokio::spawn(runner.spawn_and_read());
        *self.read_task.lock() = Some(task);
    }

    async fn pause(&self) -> Result<SerializedAgentState, SupervisorError> {
        self.capabilities().require("pause")?;
        self.shutdown(true, DEFAULT_GRACE_TIMEOUT).await;
        self.emit(AgentEvent::Lifecycle(LifecycleEvent {
            agent_id: self.agent_id.clone(),
            action: LifecycleAction::Paused,
            reason: None,
        }));
        self.set_status(AgentStatus::Paused);
        Ok(self.serialize(SerializationReason::Pause))
    }

    async fn kill(
        &self,
        grace: bool,
        grace_timeout: Option<Duration>,
    ) -> Result<KillResponse, SupervisorError> {
        let clean = self
            .shutdown(grace, grace_timeout.unwrap_or(DEFAULT_GRACE_TIMEOUT))
            .await;
        self.emit(AgentEvent::Lifecycle(LifecycleEvent {
            agent_id: self.agent_id.clone(),
            action: LifecycleAction::Killed,
            reason: Some(
                if clean {
                    "kill requested (graceful)"
                } else {
                    "kill requested (force)"
                }
                .to_string(),
            ),
        }));
        self.set_status(AgentStatus::Completed);
        let state = if grace {
            Some(
                self.crash_checkpoint
                    .lock()
                    .take()
                    .unwrap_or_else(|| self.serialize(SerializationReason::KillGrace)),
            )
        } else {
            None
        };
        Ok(KillResponse {
            state,
            artifacts_extracted: self.artifacts_emitted.load(Ordering::SeqCst),
            clean_shutdown: clean,
        })
    }

    fn resolve_decision(&self, _request: &ResolveRequest) -> bool {
        // Full-auto mode never parks on a decision.
        false
    }

    fn checkpoint(&self, decision_id: &str) -> SerializedAgentState {
        let mut state = self.serialize(SerializationReason::DecisionCheckpoint);
        state.conversation_summary = Some("Agent running in full-auto mode".to_string());
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
        ControlMode, EscalationProtocol, KnowledgeSnapshot, ProjectBrief,
    };
    use crate::infrastructure::tick_service::TickService;
    use crate::infrastructure::token_service::TokenService;
    use std::io::Write;

    fn brief() -> AgentBrief {
        AgentBrief {
            agent_id: "agent-1".to_string(),
            role: "implementer".to_string(),
            description: "Build".to_string(),
            workstream: "backend".to_string(),
            readable_workstreams: vec![],
            constraints: vec![],
            escalation_protocol: EscalationProtocol::default(),
            control_mode: ControlMode::Orchestrator,
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

    #[cfg(unix)]
    fn fake_codex(script_body: &str) -> (tempfile::TempDir, String) {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake-codex");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        writeln!(file, "{script_body}").unwrap();
        drop(file);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        let program = path.to_string_lossy().to_string();
        (dir, program)
    }

    async fn drain_until<F>(runner: &Arc<CodexRunner>, mut pred: F) -> Vec<AdapterEvent>
    where
        F: FnMut(&[AdapterEvent]) -> bool,
    {
        let mut collected = Vec::new();
        for _ in 0..200 {
            collected.extend(runner.drain_events());
            if pred(&collected) {
                return collected;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("timed out waiting for events; got {collected:?}");
    }

    #[tokio::test]
    async fn missing_binary_reports_error_and_abandoned_completion() {
        let runner = Arc::new(CodexRunner::with_program(
            brief(),
            context(),
            None,
            "definitely-not-a-real-binary-aegis",
        ));
        runner.clone().start();
        let events = drain_until(&runner, |events| {
            events
                .iter()
                .any(|e| matches!(e.event, AgentEvent::Completion(_)))
        })
        .await;

        assert!(events
            .iter()
            .any(|e| matches!(e.event, AgentEvent::Error(_))));
        let completion = events
            .iter()
            .find_map(|e| match &e.event {
                AgentEvent::Completion(c) => Some(c),
                _ => None,
            })
            .unwrap();
        assert_eq!(completion.outcome, CompletionOutcome::Abandoned);
        assert_eq!(runner.handle().status, AgentStatus::Error);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_session_maps_ndjson_and_completes() {
        let (_dir, program) = fake_codex(concat!(
            r#"echo '{"type": "thread.started", "thread_id": "thread-7"}'"#,
            "\n",
            r#"echo '{"type": "turn.started"}'"#,
            "\n",
            r#"echo '{"type": "item.completed", "item": {"id": "i1", "type": "agent_message", "text": "done"}}'"#,
            "\n",
            "exit 0",
        ));
        let runner = Arc::new(CodexRunner::with_program(brief(), context(), None, program));
        runner.clone().start();

        let events = drain_until(&runner, |events| {
            events.iter().any(|e| {
                matches!(
                    &e.event,
                    AgentEvent::Completion(c) if c.outcome == CompletionOutcome::Success
                )
            })
        })
        .await;

        assert!(matches!(
            events[0].event,
            AgentEvent::Lifecycle(LifecycleEvent {
                action: LifecycleAction::Started,
                ..
            })
        ));
        assert_eq!(runner.handle().session_id, "thread-7");
        assert_eq!(runner.handle().status, AgentStatus::Completed);
        assert!(!runner.is_running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_emits_crash_and_stores_recovery_checkpoint() {
        let (_dir, program) = fake_codex("echo oops >&2\nexit 3");
        let runner = Arc::new(CodexRunner::with_program(brief(), context(), None, program));
        runner.clone().start();

        let events = drain_until(&runner, |events| {
            events.iter().any(|e| {
                matches!(
                    &e.event,
                    AgentEvent::Lifecycle(LifecycleEvent {
                        action: LifecycleAction::Crashed,
                        ..
                    })
                )
            })
        })
        .await;

        let error = events
            .iter()
            .find_map(|e| match &e.event {
                AgentEvent::Error(err) => Some(err),
                _ => None,
            })
            .unwrap();
        assert!(error.message.contains("code 3"));
        assert_eq!(runner.handle().status, AgentStatus::Error);

        // A later graceful kill hands back the crash-recovery state.
        let response = runner.kill(true, None).await.unwrap();
        let state = response.state.unwrap();
        assert_eq!(state.serialized_by, SerializationReason::CrashRecovery);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kill_terminates_long_running_child() {
        let (_dir, program) = fake_codex("sleep 30");
        let runner = Arc::new(CodexRunner::with_program(brief(), context(), None, program));
        runner.clone().start();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let response = runner
            .kill(true, Some(Duration::from_secs(2)))
            .await
            .unwrap();
        assert!(response.state.is_some());
        assert_eq!(runner.handle().status, AgentStatus::Completed);
        assert!(!runner.is_running());

        let events = runner.drain_events();
        assert!(events.iter().any(|e| matches!(
            &e.event,
            AgentEvent::Lifecycle(LifecycleEvent {
                action: LifecycleAction::Killed,
                ..
            })
        )));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pause_checkpoints_the_session() {
        let (_dir, program) = fake_codex(concat!(
            r#"echo '{"type": "thread.started", "thread_id": "thread-9"}'"#,
            "\n",
            "sleep 30",
        ));
        let runner = Arc::new(CodexRunner::with_program(brief(), context(), None, program));
        runner.clone().start();
        drain_until(&runner, |_| runner.handle().session_id == "thread-9").await;

        let state = runner.pause().await.unwrap();
        assert_eq!(state.serialized_by, SerializationReason::Pause);
        assert_eq!(state.checkpoint.sdk, "codex");
        assert_eq!(state.checkpoint.session_id.as_deref(), Some("thread-9"));
        assert_eq!(runner.handle().status, AgentStatus::Paused);
    }

    #[test]
    fn resolve_decision_is_not_supported_in_full_auto() {
        let runner = CodexRunner::with_program(brief(), context(), None, "codex");
        let request = ResolveRequest {
            decision_id: "dec-1".to_string(),
            resolution: crate::domain::handle::DecisionResolution::ToolApproval(
                crate::domain::handle::ToolApprovalResolution {
                    action: crate::domain::handle::ToolApprovalAction::Approve,
                    modified_args: None,
                    always_approve: None,
                    rationale: None,
                    action_kind: crate::domain::brief::ActionKind::Review,
                },
            ),
        };
        assert!(!runner.resolve_decision(&request));
    }
}
