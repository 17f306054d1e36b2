// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent brief wire types.
//!
//! The brief is the task specification and policy bundle handed to an agent
//! at spawn/resume time: goals, constraints, escalation rules, control mode,
//! and a knowledge snapshot of the surrounding project. All field names are
//! camelCase on the wire.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlastRadius {
    Trivial,
    Small,
    Medium,
    Large,
    Unknown,
}

/// Control mode governs how much human gating a run gets: `orchestrator`
/// gates everything, `adaptive` lets the system recommend shifts, and
/// `ecosystem` disables decision gating entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    Orchestrator,
    Adaptive,
    Ecosystem,
}

impl ControlMode {
    pub const ALL: [ControlMode; 3] = [
        ControlMode::Orchestrator,
        ControlMode::Adaptive,
        ControlMode::Ecosystem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMode::Orchestrator => "orchestrator",
            ControlMode::Adaptive => "adaptive",
            ControlMode::Ecosystem => "ecosystem",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectBrief {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub goals: Vec<String>,
    pub checkpoints: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub name: String,
    pub vault_key: String,
    pub scope: SecretScope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretScope {
    Agent,
    Project,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailSpec {
    pub name: String,
    pub description: String,
    pub action: GuardrailAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailAction {
    Block,
    Warn,
    Log,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardrailPolicy {
    #[serde(default)]
    pub input_guardrails: Vec<GuardrailSpec>,
    #[serde(default)]
    pub output_guardrails: Vec<GuardrailSpec>,
    #[serde(default)]
    pub tool_guardrails: Vec<GuardrailSpec>,
}

/// Predicate tree for escalation rules: either a leaf comparison
/// (`field`/`op`/`value`) or a combinator node carrying nested `rules`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationPredicate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<EscalationPredicate>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRule {
    pub predicate: EscalationPredicate,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationProtocol {
    #[serde(default)]
    pub always_escalate: Vec<String>,
    #[serde(default)]
    pub escalate_when: Vec<EscalationRule>,
    #[serde(default)]
    pub never_escalate: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMount {
    pub host_path: String,
    pub sandbox_path: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRequirements {
    #[serde(default)]
    pub mounts: Vec<WorkspaceMount>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_limits: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    Full,
    Summarized,
    RecentN,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_budget_tokens: Option<u64>,
    pub history_policy: HistoryPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_n: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextReactiveTrigger {
    pub on: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workstreams: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInjectionPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub periodic_interval_ticks: Option<u32>,
    #[serde(default)]
    pub reactive_events: Vec<ContextReactiveTrigger>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staleness_threshold: Option<u32>,
    #[serde(default = "default_max_injections_per_hour")]
    pub max_injections_per_hour: u32,
    #[serde(default)]
    pub cooldown_ticks: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkstreamSummary {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub active_agent_ids: Vec<String>,
    #[serde(default)]
    pub artifact_count: u32,
    #[serde(default)]
    pub pending_decision_count: u32,
    #[serde(default)]
    pub recent_activity: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSubtype {
    Option,
    ToolApproval,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionSummary {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub agent_id: String,
    pub subtype: DecisionSubtype,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoherenceCategory {
    Contradiction,
    Duplication,
    Gap,
    DependencyViolation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoherenceIssueSummary {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub category: CoherenceCategory,
    #[serde(default)]
    pub affected_workstreams: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Review,
    Deploy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Code,
    Document,
    Design,
    Config,
    Test,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Draft,
    InReview,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub id: String,
    pub name: String,
    pub kind: ArtifactKind,
    pub status: ArtifactStatus,
    pub workstream: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub id: String,
    pub role: String,
    pub workstream: String,
    pub status: crate::domain::handle::AgentStatus,
    pub plugin_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_preference: Option<String>,
}

/// Versioned digest of project state injected into agent context.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSnapshot {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub workstreams: Vec<WorkstreamSummary>,
    #[serde(default)]
    pub pending_decisions: Vec<DecisionSummary>,
    #[serde(default)]
    pub recent_coherence_issues: Vec<CoherenceIssueSummary>,
    #[serde(default)]
    pub artifact_index: Vec<ArtifactSummary>,
    #[serde(default)]
    pub active_agents: Vec<AgentSummary>,
    #[serde(default)]
    pub estimated_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationPolicy {
    #[serde(default)]
    pub can_spawn_subagents: bool,
    #[serde(default)]
    pub allowed_handoffs: Vec<String>,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

/// The full spawn/resume-time policy bundle for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentBrief {
    pub agent_id: String,
    pub role: String,
    pub description: String,
    pub workstream: String,
    #[serde(default)]
    pub readable_workstreams: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
    pub escalation_protocol: EscalationProtocol,
    pub control_mode: ControlMode,
    pub project_brief: ProjectBrief,
    pub knowledge_snapshot: KnowledgeSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_preference: Option<String>,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp_servers: Option<Vec<McpServerConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_requirements: Option<WorkspaceRequirements>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardrail_policy: Option<GuardrailPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation_policy: Option<DelegationPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_policy: Option<SessionPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_injection_policy: Option<ContextInjectionPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_refs: Option<Vec<SecretRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<serde_json::Value>,
}

impl AgentBrief {
    /// Whether runs under this brief block risky tool use on human approval.
    /// Full autonomy (`ecosystem`) disables gating.
    pub fn decision_gating_enabled(&self) -> bool {
        self.control_mode != ControlMode::Ecosystem
    }
}

/// One context re-injection payload pushed into a live session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextInjection {
    pub content: String,
    pub format: InjectionFormat,
    pub snapshot_version: u32,
    pub estimated_tokens: u64,
    pub priority: InjectionPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionFormat {
    Markdown,
    Json,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionPriority {
    Required,
    Recommended,
    Supplementary,
}

fn default_max_injections_per_hour() -> u32 {
    10
}

fn default_max_depth() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_brief() -> AgentBrief {
        AgentBrief {
            agent_id: "agent-1".to_string(),
            role: "implementer".to_string(),
            description: "Build the parser".to_string(),
            workstream: "backend".to_string(),
            readable_workstreams: vec![],
            constraints: vec!["no new dependencies".to_string()],
            escalation_protocol: EscalationProtocol::default(),
            control_mode: ControlMode::Orchestrator,
            project_brief: ProjectBrief {
                id: None,
                title: "Demo".to_string(),
                description: "Demo project".to_string(),
                goals: vec!["ship".to_string()],
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

    #[test]
    fn brief_round_trips_with_camel_case_keys() {
        let brief = minimal_brief();
        let json = serde_json::to_value(&brief).unwrap();
        assert_eq!(json["agentId"], "agent-1");
        assert_eq!(json["controlMode"], "orchestrator");
        assert!(json.get("agent_id").is_none());

        let back: AgentBrief = serde_json::from_value(json).unwrap();
        assert_eq!(back, brief);
    }

    #[test]
    fn ecosystem_mode_disables_decision_gating() {
        let mut brief = minimal_brief();
        assert!(brief.decision_gating_enabled());
        brief.control_mode = ControlMode::Adaptive;
        assert!(brief.decision_gating_enabled());
        brief.control_mode = ControlMode::Ecosystem;
        assert!(!brief.decision_gating_enabled());
    }
}
