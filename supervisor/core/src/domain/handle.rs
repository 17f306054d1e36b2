// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Runner handle, checkpoint, and control request/response wire types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::brief::{ActionKind, AgentBrief};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Running,
    Paused,
    WaitingOnHuman,
    Completed,
    Idle,
    Error,
}

impl AgentStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentStatus::Completed | AgentStatus::Error)
    }
}

/// Caller-facing view of one live (or finished) agent run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentHandle {
    pub id: String,
    pub plugin_name: String,
    pub status: AgentStatus,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_brief_changes: Option<serde_json::Value>,
}

impl AgentHandle {
    pub fn new(
        id: impl Into<String>,
        plugin_name: impl Into<String>,
        status: AgentStatus,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            plugin_name: plugin_name.into(),
            status,
            session_id: session_id.into(),
            pending_brief_changes: None,
        }
    }
}

/// Backend-specific resume state embedded in a checkpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkCheckpoint {
    pub sdk: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_state_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_snapshot: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_position: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationReason {
    Pause,
    KillGrace,
    CrashRecovery,
    DecisionCheckpoint,
}

/// Checkpoint of a paused/killed/crashed run. Consumed exactly once to
/// reconstruct a runner via resume; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedAgentState {
    pub agent_id: String,
    pub plugin_name: String,
    pub session_id: String,
    pub checkpoint: SdkCheckpoint,
    pub brief_snapshot: AgentBrief,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_summary: Option<String>,
    #[serde(default)]
    pub pending_decision_ids: Vec<String>,
    pub last_sequence: u64,
    pub serialized_at: DateTime<Utc>,
    pub serialized_by: SerializationReason,
    pub estimated_size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillRequest {
    #[serde(default = "default_grace")]
    pub grace: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_timeout_ms: Option<u64>,
}

impl Default for KillRequest {
    fn default() -> Self {
        Self {
            grace: true,
            grace_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KillResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<SerializedAgentState>,
    #[serde(default)]
    pub artifacts_extracted: u64,
    #[serde(default = "default_grace")]
    pub clean_shutdown: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolApprovalAction {
    Approve,
    Reject,
    Modify,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionResolution {
    pub chosen_option_id: String,
    pub rationale: String,
    pub action_kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolApprovalResolution {
    pub action: ToolApprovalAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_args: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_approve: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    pub action_kind: ActionKind,
}

/// Human answer to a pending decision, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionResolution {
    #[serde(rename = "option")]
    OptionChoice(OptionResolution),
    ToolApproval(ToolApprovalResolution),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub decision_id: String,
    pub resolution: DecisionResolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxResourceUsage {
    #[serde(default)]
    pub cpu_percent: f64,
    #[serde(default)]
    pub memory_mb: f64,
    #[serde(default)]
    pub disk_mb: f64,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxHealthResponse {
    pub status: HealthStatus,
    pub agent_status: AgentStatus,
    pub uptime_ms: u64,
    pub resource_usage: SandboxResourceUsage,
    #[serde(default)]
    pub pending_event_buffer_size: usize,
}

fn default_grace() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kill_request_defaults_to_graceful() {
        let request: KillRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.grace);
        assert!(request.grace_timeout_ms.is_none());
    }

    #[test]
    fn resolution_parses_both_subtypes() {
        let option: DecisionResolution = serde_json::from_value(json!({
            "type": "option",
            "chosenOptionId": "opt-a",
            "rationale": "lowest risk",
            "actionKind": "update",
        }))
        .unwrap();
        assert!(matches!(option, DecisionResolution::OptionChoice(_)));

        let approval: DecisionResolution = serde_json::from_value(json!({
            "type": "tool_approval",
            "action": "approve",
            "alwaysApprove": true,
            "actionKind": "deploy",
        }))
        .unwrap();
        match approval {
            DecisionResolution::ToolApproval(r) => {
                assert_eq!(r.action, ToolApprovalAction::Approve);
                assert_eq!(r.always_approve, Some(true));
            }
            other => panic!("wrong resolution type: {other:?}"),
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(AgentStatus::Completed.is_terminal());
        assert!(AgentStatus::Error.is_terminal());
        assert!(!AgentStatus::Paused.is_terminal());
        assert!(!AgentStatus::WaitingOnHuman.is_terminal());
    }
}
