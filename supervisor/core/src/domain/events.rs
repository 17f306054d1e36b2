// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent event wire types and the envelope factory.
//!
//! Every observable action of a running agent is one of nine `AgentEvent`
//! variants, discriminated on the wire by `type` (decisions additionally by
//! `subtype`). Runners wrap payloads into `AdapterEvent` envelopes through a
//! per-run [`EventFactory`] that owns the sequence counter.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::domain::brief::{ArtifactKind, ArtifactStatus, BlastRadius, Severity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub created_by: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_artifact_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
}

impl Provenance {
    pub fn created_now(created_by: impl Into<String>) -> Self {
        Self {
            created_by: created_by.into(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            modified_by: None,
            modified_at: None,
            source_artifact_ids: None,
            source_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub agent_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionOption {
    pub id: String,
    pub label: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tradeoffs: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolApprovalEvent {
    pub agent_id: String,
    pub decision_id: String,
    pub tool_name: String,
    pub tool_args: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blast_radius: Option<BlastRadius>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_artifact_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_by_tick: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDecisionEvent {
    pub agent_id: String,
    pub decision_id: String,
    pub title: String,
    pub summary: String,
    pub severity: Severity,
    pub confidence: f64,
    pub blast_radius: BlastRadius,
    pub options: Vec<DecisionOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_option_id: Option<String>,
    #[serde(default)]
    pub affected_artifact_ids: Vec<String>,
    #[serde(default)]
    pub requires_rationale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_by_tick: Option<u64>,
}

/// A decision the agent is blocked on, discriminated by `subtype`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum DecisionEvent {
    ToolApproval(ToolApprovalEvent),
    #[serde(rename = "option")]
    OptionChoice(OptionDecisionEvent),
}

impl DecisionEvent {
    pub fn decision_id(&self) -> &str {
        match self {
            DecisionEvent::ToolApproval(e) => &e.decision_id,
            DecisionEvent::OptionChoice(e) => &e.decision_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallPhase {
    Requested,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallEvent {
    pub agent_id: String,
    pub tool_call_id: String,
    pub tool_name: String,
    pub phase: ToolCallPhase,
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default = "default_approved")]
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEvent {
    pub agent_id: String,
    pub artifact_id: String,
    pub name: String,
    pub kind: ArtifactKind,
    pub workstream: String,
    pub status: ArtifactStatus,
    pub quality_score: f64,
    pub provenance: Provenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionOutcome {
    Success,
    Partial,
    Abandoned,
    MaxTurns,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub agent_id: String,
    pub summary: String,
    #[serde(default)]
    pub artifacts_produced: Vec<String>,
    #[serde(default)]
    pub decisions_needed: Vec<String>,
    pub outcome: CompletionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Provider,
    Tool,
    Model,
    Timeout,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub agent_id: String,
    pub severity: Severity,
    pub message: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub category: ErrorCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    Started,
    Paused,
    Resumed,
    Killed,
    Crashed,
    SessionStart,
    SessionEnd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub agent_id: String,
    pub action: LifecycleAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub agent_id: String,
    pub operation_id: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_pct: Option<f64>,
}

/// The nine-variant event union, discriminated by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Status(StatusEvent),
    Decision(DecisionEvent),
    ToolCall(ToolCallEvent),
    Artifact(ArtifactEvent),
    Completion(CompletionEvent),
    Error(ErrorEvent),
    Lifecycle(LifecycleEvent),
    Progress(ProgressEvent),
}

impl AgentEvent {
    pub fn agent_id(&self) -> &str {
        match self {
            AgentEvent::Status(e) => &e.agent_id,
            AgentEvent::Decision(DecisionEvent::ToolApproval(e)) => &e.agent_id,
            AgentEvent::Decision(DecisionEvent::OptionChoice(e)) => &e.agent_id,
            AgentEvent::ToolCall(e) => &e.agent_id,
            AgentEvent::Artifact(e) => &e.agent_id,
            AgentEvent::Completion(e) => &e.agent_id,
            AgentEvent::Error(e) => &e.agent_id,
            AgentEvent::Lifecycle(e) => &e.agent_id,
            AgentEvent::Progress(e) => &e.agent_id,
        }
    }
}

/// Transport envelope around one [`AgentEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterEvent {
    pub source_event_id: String,
    pub source_sequence: u64,
    pub source_occurred_at: String,
    pub run_id: String,
    pub event: AgentEvent,
}

/// Creates [`AdapterEvent`] envelopes with a per-run monotonic sequence.
///
/// The counter is owned by the runner that constructs envelopes and is seeded
/// at 0 per run, so `sourceSequence` is strictly increasing within a `runId`
/// with no gaps at the source.
pub struct EventFactory {
    run_id: String,
    sequence: AtomicU64,
}

impl EventFactory {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn wrap(&self, event: AgentEvent) -> AdapterEvent {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        AdapterEvent {
            source_event_id: Uuid::new_v4().to_string(),
            source_sequence: sequence,
            source_occurred_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            run_id: self.run_id.clone(),
            event,
        }
    }
}

fn default_approved() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_event_serializes_with_type_tag() {
        let event = AgentEvent::Status(StatusEvent {
            agent_id: "agent-1".to_string(),
            message: "Starting task...".to_string(),
            tick: Some(4),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "status");
        assert_eq!(value["agentId"], "agent-1");
        assert_eq!(value["tick"], 4);
    }

    #[test]
    fn decision_events_carry_type_and_subtype() {
        let event = AgentEvent::Decision(DecisionEvent::ToolApproval(ToolApprovalEvent {
            agent_id: "agent-1".to_string(),
            decision_id: "dec-1".to_string(),
            tool_name: "execute_code".to_string(),
            tool_args: json!({"code": "print('hi')"}),
            severity: Some(Severity::Medium),
            confidence: Some(0.85),
            blast_radius: Some(BlastRadius::Small),
            affected_artifact_ids: None,
            due_by_tick: None,
        }));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "decision");
        assert_eq!(value["subtype"], "tool_approval");

        let back: AgentEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn option_decision_uses_option_subtype() {
        let event = AgentEvent::Decision(DecisionEvent::OptionChoice(OptionDecisionEvent {
            agent_id: "agent-1".to_string(),
            decision_id: "dec-2".to_string(),
            title: "Pick storage".to_string(),
            summary: "Two viable backends".to_string(),
            severity: Severity::High,
            confidence: 0.6,
            blast_radius: BlastRadius::Medium,
            options: vec![DecisionOption {
                id: "opt-a".to_string(),
                label: "sqlite".to_string(),
                description: "embedded".to_string(),
                tradeoffs: None,
            }],
            recommended_option_id: Some("opt-a".to_string()),
            affected_artifact_ids: vec![],
            requires_rationale: true,
            due_by_tick: Some(30),
        }));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["subtype"], "option");
        assert_eq!(value["dueByTick"], 30);
    }

    #[test]
    fn factory_sequences_are_strictly_increasing_from_one() {
        let factory = EventFactory::new("run-1");
        assert_eq!(factory.last_sequence(), 0);
        let sequences: Vec<u64> = (0..5)
            .map(|_| {
                factory
                    .wrap(AgentEvent::Status(StatusEvent {
                        agent_id: "a".to_string(),
                        message: "m".to_string(),
                        tick: None,
                    }))
                    .source_sequence
            })
            .collect();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
        assert_eq!(factory.last_sequence(), 5);
    }

    #[test]
    fn envelope_round_trips() {
        let factory = EventFactory::new("run-xyz");
        let envelope = factory.wrap(AgentEvent::Lifecycle(LifecycleEvent {
            agent_id: "agent-1".to_string(),
            action: LifecycleAction::Started,
            reason: None,
        }));
        let json = serde_json::to_string(&envelope).unwrap();
        let back: AdapterEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, envelope);
        assert_eq!(back.run_id, "run-xyz");
    }
}
