// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Constraint inference over the audit log.
//!
//! Repeated human overrides of agent decisions, and repeated coherence
//! issues between the same workstreams, are signals that a standing
//! guardrail is missing. This analyzer mines both patterns and emits
//! candidate constraint suggestions for human review. Its only mutation is
//! `record_feedback`, which appends the accept/dismiss verdict back into the
//! audit log.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use serde_json::json;
use uuid::Uuid;

use crate::domain::audit::{trust_outcomes, AuditEntityType, AuditLogEntry};
use crate::infrastructure::audit_store::InMemoryAuditLog;

/// Overrides needed before a workstream/tool suggestion fires.
const OVERRIDE_THRESHOLD: usize = 3;
/// Overrides at which confidence moves from medium to high.
const HIGH_CONFIDENCE_THRESHOLD: usize = 5;
/// Co-occurrences needed before a coordination suggestion fires.
const COHERENCE_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionConfidence {
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    OverridePattern,
    CoherencePattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintSuggestion {
    pub id: String,
    pub text: String,
    pub reasoning: String,
    pub confidence: SuggestionConfidence,
    pub source: SuggestionSource,
    pub related_evidence: Vec<String>,
}

pub struct ConstraintInferenceService;

impl ConstraintInferenceService {
    pub fn new() -> Self {
        Self
    }

    /// Scan the log and emit every suggestion the current evidence supports.
    /// Malformed entries are skipped, never fatal.
    pub fn analyze(&self, entries: &[AuditLogEntry]) -> Vec<ConstraintSuggestion> {
        let mut suggestions = Vec::new();
        suggestions.extend(self.override_suggestions(entries));
        suggestions.extend(self.coherence_suggestions(entries));
        suggestions
    }

    fn override_suggestions(&self, entries: &[AuditLogEntry]) -> Vec<ConstraintSuggestion> {
        // BTreeMaps keep suggestion order deterministic across runs.
        let mut by_workstream: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut by_tool: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for entry in entries {
            if entry.entity_type != AuditEntityType::TrustOutcome
                || entry.action != "decision_resolution"
            {
                continue;
            }
            let Some(outcome) = entry.detail_str("outcome") else {
                continue;
            };
            if !trust_outcomes::is_override(outcome) {
                continue;
            }
            if let Some(workstream) = entry.detail_str("workstream") {
                by_workstream
                    .entry(workstream.to_string())
                    .or_default()
                    .push(entry.entity_id.clone());
            }
            if let Some(tool) = entry.detail_str("toolName") {
                by_tool
                    .entry(tool.to_string())
                    .or_default()
                    .push(entry.entity_id.clone());
            }
        }

        let mut suggestions = Vec::new();
        for (workstream, evidence) in by_workstream {
            if evidence.len() < OVERRIDE_THRESHOLD {
                continue;
            }
            suggestions.push(ConstraintSuggestion {
                id: Uuid::new_v4().to_string(),
                text: format!(
                    "Add a standing constraint for the \"{workstream}\" workstream: humans \
                     repeatedly overrode agent decisions there."
                ),
                reasoning: format!(
                    "{} override(s) recorded against workstream \"{workstream}\"",
                    evidence.len()
                ),
                confidence: confidence_for(evidence.len()),
                source: SuggestionSource::OverridePattern,
                related_evidence: evidence,
            });
        }
        for (tool, evidence) in by_tool {
            if evidence.len() < OVERRIDE_THRESHOLD {
                continue;
            }
            suggestions.push(ConstraintSuggestion {
                id: Uuid::new_v4().to_string(),
                text: format!(
                    "Require approval (or restrict use) of the \"{tool}\" tool: its \
                     invocations are repeatedly overridden."
                ),
                reasoning: format!("{} override(s) recorded against tool \"{tool}\"", evidence.len()),
                confidence: confidence_for(evidence.len()),
                source: SuggestionSource::OverridePattern,
                related_evidence: evidence,
            });
        }
        suggestions
    }

    fn coherence_suggestions(&self, entries: &[AuditLogEntry]) -> Vec<ConstraintSuggestion> {
        let mut by_workstream_set: BTreeMap<Vec<String>, Vec<String>> = BTreeMap::new();

        for entry in entries {
            if entry.entity_type != AuditEntityType::CoherenceIssue {
                continue;
            }
            let mut workstreams = entry.detail_str_list("affectedWorkstreams");
            // Coherence is inherently relational; single-workstream issues
            // carry no coordination signal.
            if workstreams.len() < 2 {
                continue;
            }
            workstreams.sort();
            workstreams.dedup();
            by_workstream_set
                .entry(workstreams)
                .or_default()
                .push(entry.entity_id.clone());
        }

        by_workstream_set
            .into_iter()
            .filter(|(_, evidence)| evidence.len() >= COHERENCE_THRESHOLD)
            .map(|(workstreams, evidence)| ConstraintSuggestion {
                id: Uuid::new_v4().to_string(),
                text: format!(
                    "Add a coordination constraint between workstreams {}: they keep \
                     producing conflicting artifacts.",
                    workstreams.join(", ")
                ),
                reasoning: format!(
                    "{} coherence issue(s) involved workstreams {}",
                    evidence.len(),
                    workstreams.join(" + ")
                ),
                confidence: SuggestionConfidence::Medium,
                source: SuggestionSource::CoherencePattern,
                related_evidence: evidence,
            })
            .collect()
    }

    /// Record the human verdict on a suggestion. Fire-and-record: the id is
    /// not validated against previously emitted suggestions.
    pub fn record_feedback(
        &self,
        log: &InMemoryAuditLog,
        suggestion_id: &str,
        accepted: bool,
        suggestion_text: Option<&str>,
    ) {
        let action = if accepted { "accepted" } else { "dismissed" };
        let mut details = json!({});
        if let Some(text) = suggestion_text {
            details["suggestionText"] = json!(text);
        }
        log.append(AuditLogEntry::new(
            AuditEntityType::ConstraintFeedback,
            suggestion_id,
            action,
            details,
        ));
    }
}

impl Default for ConstraintInferenceService {
    fn default() -> Self {
        Self::new()
    }
}

fn confidence_for(count: usize) -> SuggestionConfidence {
    if count >= HIGH_CONFIDENCE_THRESHOLD {
        SuggestionConfidence::High
    } else {
        SuggestionConfidence::Medium
    }
}
