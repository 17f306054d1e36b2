// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Rework causal linking.
//!
//! Explains each artifact update by searching a 10-tick inclusive lookback
//! window for candidate triggers, in priority order: a coherence issue
//! naming the artifact beats a human override naming it, which beats an
//! update to a different artifact (cascade); with no trigger the update is
//! voluntary improvement. Only `update` actions are classified; `create`
//! actions and entries without a tick are ignored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::audit::{trust_outcomes, AuditEntityType, AuditLogEntry};

/// Inclusive lookback distance: a trigger at exactly `update_tick - 10`
/// still qualifies.
const LOOKBACK_TICKS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReworkCause {
    CoherenceDriven,
    OverrideDriven,
    Cascade,
    VoluntaryImprovement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReworkLink {
    pub artifact_id: String,
    pub update_tick: i64,
    pub cause: ReworkCause,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_tick: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReworkWindow {
    pub start_tick: Option<i64>,
    pub end_tick: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReworkReport {
    pub links: Vec<ReworkLink>,
    pub aggregate: BTreeMap<ReworkCause, u64>,
    pub total: u64,
    pub aggregate_rates: BTreeMap<ReworkCause, f64>,
    pub analysis_window: ReworkWindow,
}

struct Candidate<'a> {
    entry: &'a AuditLogEntry,
    tick: i64,
}

pub struct ReworkCausalLinker;

impl ReworkCausalLinker {
    pub fn new() -> Self {
        Self
    }

    pub fn link(&self, entries: &[AuditLogEntry]) -> ReworkReport {
        // Entries missing a tick cannot be placed in any window.
        let updates: Vec<Candidate> = entries
            .iter()
            .filter(|e| e.entity_type == AuditEntityType::Artifact && e.action == "update")
            .filter_map(|e| e.tick().map(|tick| Candidate { entry: e, tick }))
            .collect();

        let coherence: Vec<Candidate> = entries
            .iter()
            .filter(|e| e.entity_type == AuditEntityType::CoherenceIssue)
            .filter_map(|e| e.tick().map(|tick| Candidate { entry: e, tick }))
            .collect();

        let overrides: Vec<Candidate> = entries
            .iter()
            .filter(|e| {
                e.entity_type == AuditEntityType::TrustOutcome
                    && e.detail_str("outcome")
                        .is_some_and(trust_outcomes::is_override)
            })
            .filter_map(|e| e.tick().map(|tick| Candidate { entry: e, tick }))
            .collect();

        let links: Vec<ReworkLink> = updates
            .iter()
            .map(|update| self.classify(update, &updates, &coherence, &overrides))
            .collect();

        let mut aggregate: BTreeMap<ReworkCause, u64> = BTreeMap::new();
        for link in &links {
            *aggregate.entry(link.cause).or_insert(0) += 1;
        }
        let total = links.len() as u64;
        let aggregate_rates = aggregate
            .iter()
            .map(|(&cause, &count)| (cause, count as f64 / total as f64))
            .collect();

        ReworkReport {
            analysis_window: ReworkWindow {
                start_tick: updates.iter().map(|u| u.tick).min(),
                end_tick: updates.iter().map(|u| u.tick).max(),
            },
            aggregate,
            total,
            aggregate_rates,
            links,
        }
    }

    fn classify(
        &self,
        update: &Candidate,
        updates: &[Candidate],
        coherence: &[Candidate],
        overrides: &[Candidate],
    ) -> ReworkLink {
        let artifact_id = update.entry.entity_id.clone();
        let window_start = update.tick - LOOKBACK_TICKS;
        let in_window = |tick: i64| tick >= window_start && tick <= update.tick;

        // 1. A coherence issue naming this artifact.
        if let Some(trigger) = best_trigger(coherence.iter().filter(|c| {
            in_window(c.tick)
                && c.entry
                    .detail_str_list("affectedArtifactIds")
                    .iter()
                    .any(|id| *id == artifact_id)
        })) {
            return link(update, ReworkCause::CoherenceDriven, trigger);
        }

        // 2. A human override naming this artifact.
        if let Some(trigger) = best_trigger(overrides.iter().filter(|c| {
            in_window(c.tick)
                && c.entry
                    .detail_str_list("affectedArtifactIds")
                    .iter()
                    .any(|id| *id == artifact_id)
        })) {
            return link(update, ReworkCause::OverrideDriven, trigger);
        }

        // 3. An update to a different artifact (cascade). An update to this
        //    artifact never counts as its own trigger.
        if let Some(trigger) = best_trigger(
            updates
                .iter()
                .filter(|c| in_window(c.tick) && c.entry.entity_id != artifact_id),
        ) {
            return link(update, ReworkCause::Cascade, trigger);
        }

        ReworkLink {
            artifact_id,
            update_tick: update.tick,
            cause: ReworkCause::VoluntaryImprovement,
            trigger_entity_id: None,
            trigger_tick: None,
        }
    }
}

impl Default for ReworkCausalLinker {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the candidate with the tick closest to the update (ties broken
/// toward the most recent log entry).
fn best_trigger<'a, 'b>(
    candidates: impl Iterator<Item = &'b Candidate<'a>>,
) -> Option<&'b Candidate<'a>>
where
    'a: 'b,
{
    let mut best: Option<&Candidate> = None;
    for candidate in candidates {
        best = match best {
            Some(current) if current.tick > candidate.tick => Some(current),
            // later entries at the same tick win
            _ => Some(candidate),
        };
    }
    best
}

fn link(update: &Candidate, cause: ReworkCause, trigger: &Candidate) -> ReworkLink {
    ReworkLink {
        artifact_id: update.entry.entity_id.clone(),
        update_tick: update.tick,
        cause,
        trigger_entity_id: Some(trigger.entry.entity_id.clone()),
        trigger_tick: Some(trigger.tick),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact_update(artifact_id: &str, tick: i64) -> AuditLogEntry {
        AuditLogEntry::new(
            AuditEntityType::Artifact,
            artifact_id,
            "update",
            json!({"tick": tick}),
        )
    }

    fn coherence_issue(id: &str, tick: i64, affected: &[&str]) -> AuditLogEntry {
        AuditLogEntry::new(
            AuditEntityType::CoherenceIssue,
            id,
            "detected",
            json!({"tick": tick, "affectedArtifactIds": affected}),
        )
    }

    fn override_outcome(id: &str, tick: i64, affected: &[&str]) -> AuditLogEntry {
        AuditLogEntry::new(
            AuditEntityType::TrustOutcome,
            id,
            "decision_resolution",
            json!({
                "tick": tick,
                "outcome": trust_outcomes::HUMAN_OVERRIDES_AGENT_DECISION,
                "affectedArtifactIds": affected,
            }),
        )
    }

    #[test]
    fn coherence_trigger_at_window_boundary_qualifies() {
        let entries = vec![
            coherence_issue("c1", 10, &["art-a"]),
            artifact_update("art-a", 20),
        ];
        let report = ReworkCausalLinker::new().link(&entries);
        assert_eq!(report.links[0].cause, ReworkCause::CoherenceDriven);
        assert_eq!(report.links[0].trigger_entity_id.as_deref(), Some("c1"));
        assert_eq!(report.links[0].trigger_tick, Some(10));
    }

    #[test]
    fn trigger_just_outside_window_is_voluntary() {
        let entries = vec![
            coherence_issue("c1", 10, &["art-a"]),
            artifact_update("art-a", 21),
        ];
        let report = ReworkCausalLinker::new().link(&entries);
        assert_eq!(report.links[0].cause, ReworkCause::VoluntaryImprovement);
        assert_eq!(report.links[0].trigger_entity_id, None);
        assert_eq!(report.links[0].trigger_tick, None);
    }

    #[test]
    fn coherence_beats_override_when_both_qualify() {
        let entries = vec![
            coherence_issue("c1", 14, &["art-a"]),
            override_outcome("t1", 16, &["art-a"]),
            artifact_update("art-a", 20),
        ];
        let report = ReworkCausalLinker::new().link(&entries);
        assert_eq!(report.links[0].cause, ReworkCause::CoherenceDriven);
        assert_eq!(report.links[0].trigger_entity_id.as_deref(), Some("c1"));
    }

    #[test]
    fn closest_coherence_issue_wins() {
        let entries = vec![
            coherence_issue("far", 11, &["art-a"]),
            coherence_issue("near", 18, &["art-a"]),
            artifact_update("art-a", 20),
        ];
        let report = ReworkCausalLinker::new().link(&entries);
        assert_eq!(report.links[0].trigger_entity_id.as_deref(), Some("near"));
    }

    #[test]
    fn same_tick_ties_break_toward_most_recent_entry() {
        let entries = vec![
            coherence_issue("first", 18, &["art-a"]),
            coherence_issue("second", 18, &["art-a"]),
            artifact_update("art-a", 20),
        ];
        let report = ReworkCausalLinker::new().link(&entries);
        assert_eq!(report.links[0].trigger_entity_id.as_deref(), Some("second"));
    }

    #[test]
    fn override_drives_when_no_coherence_trigger() {
        let entries = vec![
            override_outcome("t1", 15, &["art-a"]),
            artifact_update("art-a", 20),
        ];
        let report = ReworkCausalLinker::new().link(&entries);
        assert_eq!(report.links[0].cause, ReworkCause::OverrideDriven);
        assert_eq!(report.links[0].trigger_entity_id.as_deref(), Some("t1"));
    }

    #[test]
    fn update_to_other_artifact_is_cascade() {
        let entries = vec![
            artifact_update("art-b", 15),
            artifact_update("art-a", 20),
        ];
        let report = ReworkCausalLinker::new().link(&entries);
        let link_a = report
            .links
            .iter()
            .find(|l| l.artifact_id == "art-a")
            .unwrap();
        assert_eq!(link_a.cause, ReworkCause::Cascade);
        assert_eq!(link_a.trigger_entity_id.as_deref(), Some("art-b"));
    }

    #[test]
    fn own_update_is_not_a_cascade_trigger() {
        let entries = vec![
            artifact_update("art-a", 15),
            artifact_update("art-a", 20),
        ];
        let report = ReworkCausalLinker::new().link(&entries);
        // The tick-15 update looks back and finds nothing; the tick-20 update
        // may only cascade off *other* artifacts, of which there are none.
        assert!(report
            .links
            .iter()
            .all(|l| l.cause == ReworkCause::VoluntaryImprovement));
    }

    #[test]
    fn create_actions_are_not_classified() {
        let entries = vec![AuditLogEntry::new(
            AuditEntityType::Artifact,
            "art-a",
            "create",
            json!({"tick": 5}),
        )];
        let report = ReworkCausalLinker::new().link(&entries);
        assert!(report.links.is_empty());
        assert_eq!(report.total, 0);
    }

    #[test]
    fn tickless_updates_are_ignored() {
        let entries = vec![AuditLogEntry::new(
            AuditEntityType::Artifact,
            "art-a",
            "update",
            json!({}),
        )];
        let report = ReworkCausalLinker::new().link(&entries);
        assert!(report.links.is_empty());
        assert_eq!(report.analysis_window.start_tick, None);
        assert_eq!(report.analysis_window.end_tick, None);
    }

    #[test]
    fn aggregates_and_rates_cover_all_links() {
        let entries = vec![
            coherence_issue("c1", 9, &["art-a"]),
            artifact_update("art-a", 10),
            override_outcome("t1", 18, &["art-b"]),
            artifact_update("art-b", 20),
            artifact_update("art-c", 50),
            artifact_update("art-d", 55),
        ];
        let report = ReworkCausalLinker::new().link(&entries);
        assert_eq!(report.total, 4);
        assert_eq!(report.aggregate[&ReworkCause::CoherenceDriven], 1);
        assert_eq!(report.aggregate[&ReworkCause::OverrideDriven], 1);
        // art-c has no trigger; art-d cascades off art-c's update at tick 50.
        assert_eq!(report.aggregate[&ReworkCause::Cascade], 1);
        assert_eq!(report.aggregate[&ReworkCause::VoluntaryImprovement], 1);
        let rate_sum: f64 = report.aggregate_rates.values().sum();
        assert!((rate_sum - 1.0).abs() < 1e-9);
        assert_eq!(report.analysis_window.start_tick, Some(10));
        assert_eq!(report.analysis_window.end_tick, Some(55));
    }
}
