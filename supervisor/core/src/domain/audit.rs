// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Audit log schema.
//!
//! The audit log is an append-only store of timestamped structured entries
//! written by the runner/decision layer and read by the analyzers. `details`
//! is an open schema that varies by `entityType`; entries that matter for
//! temporal analysis carry a `tick` inside `details`. Total order is append
//! order; analytical windowing is by tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntityType {
    TrustOutcome,
    CoherenceIssue,
    Artifact,
    ConstraintFeedback,
    Injection,
    Agent,
    Decision,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub entity_type: AuditEntityType,
    pub entity_id: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_agent_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

impl AuditLogEntry {
    pub fn new(
        entity_type: AuditEntityType,
        entity_id: impl Into<String>,
        action: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            action: action.into(),
            caller_agent_id: None,
            timestamp: Utc::now(),
            details,
        }
    }

    pub fn with_caller(mut self, caller_agent_id: impl Into<String>) -> Self {
        self.caller_agent_id = Some(caller_agent_id.into());
        self
    }

    /// The logical-time stamp inside `details`, when present. Entries without
    /// one cannot be placed in any analysis window.
    pub fn tick(&self) -> Option<i64> {
        self.details.get("tick").and_then(|v| v.as_i64())
    }

    pub fn detail_str(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(|v| v.as_str())
    }

    pub fn detail_str_list(&self, key: &str) -> Vec<String> {
        self.details
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Decision-resolution outcomes recorded as `trust_outcome` entries. The two
/// override outcomes are what constraint inference mines for.
pub mod trust_outcomes {
    pub const HUMAN_OVERRIDES_AGENT_DECISION: &str = "human_overrides_agent_decision";
    pub const HUMAN_PICKS_NON_RECOMMENDED: &str = "human_picks_non_recommended";
    pub const HUMAN_CONFIRMS_AGENT_DECISION: &str = "human_confirms_agent_decision";

    pub fn is_override(outcome: &str) -> bool {
        outcome == HUMAN_OVERRIDES_AGENT_DECISION || outcome == HUMAN_PICKS_NON_RECOMMENDED
    }
}

/// One point in a per-agent trust time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustSnapshot {
    pub tick: i64,
    pub score: f64,
    pub success_count: u64,
    pub override_count: u64,
    pub rework_count: u64,
    pub total_tasks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustProfile {
    pub agent_id: String,
    pub snapshots: Vec<TrustSnapshot>,
}
