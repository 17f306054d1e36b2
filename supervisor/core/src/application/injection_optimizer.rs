// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Context-injection efficiency analysis.
//!
//! Each [`InjectionRecord`] describes one context re-injection and what the
//! agent actually referenced afterwards. The optimizer measures how much of
//! the injected material was used and suggests interval changes: very high
//! overlap means injections are wasted (inject less often), very low overlap
//! means context is being missed (inject more often).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::domain::brief::{ControlMode, InjectionPriority};

/// Interval suggestions are clamped to this range of ticks.
const MIN_INTERVAL: u32 = 5;
const MAX_INTERVAL: u32 = 100;
const HIGH_OVERLAP: f64 = 0.8;
const LOW_OVERLAP: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionRecord {
    pub tick: i64,
    pub reason: String,
    pub priority: InjectionPriority,
    pub snapshot_version: u32,
    #[serde(default)]
    pub artifact_ids_included: Vec<String>,
    #[serde(default)]
    pub agent_events_in_window: u64,
    #[serde(default)]
    pub artifact_ids_referenced_in_window: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonBreakdown {
    pub count: u64,
    pub overlap_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeRecommendation {
    pub mode: ControlMode,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisWindow {
    pub first_tick: i64,
    pub last_tick: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionEfficiencyReport {
    pub total_injections: u64,
    pub avg_artifacts_included: f64,
    pub avg_artifacts_referenced: f64,
    pub overlap_rate: f64,
    pub unused_artifact_rate: f64,
    pub per_reason_breakdown: BTreeMap<String, ReasonBreakdown>,
    pub analysis_window: AnalysisWindow,
    pub per_mode_recommendations: Vec<ModeRecommendation>,
}

pub struct InjectionOptimizer;

impl InjectionOptimizer {
    pub fn new() -> Self {
        Self
    }

    /// Overlap between what an injection included and what got referenced.
    /// An injection with nothing included contributes no signal (0), not a
    /// penalty.
    fn record_overlap(record: &InjectionRecord) -> f64 {
        if record.artifact_ids_included.is_empty() {
            return 0.0;
        }
        let included: HashSet<&str> = record
            .artifact_ids_included
            .iter()
            .map(String::as_str)
            .collect();
        let referenced: HashSet<&str> = record
            .artifact_ids_referenced_in_window
            .iter()
            .map(String::as_str)
            .collect();
        included.intersection(&referenced).count() as f64 / included.len() as f64
    }

    pub fn analyze_efficiency(&self, records: &[InjectionRecord]) -> InjectionEfficiencyReport {
        if records.is_empty() {
            return InjectionEfficiencyReport {
                total_injections: 0,
                avg_artifacts_included: 0.0,
                avg_artifacts_referenced: 0.0,
                overlap_rate: 0.0,
                unused_artifact_rate: 0.0,
                per_reason_breakdown: BTreeMap::new(),
                analysis_window: AnalysisWindow {
                    first_tick: 0,
                    last_tick: 0,
                },
                per_mode_recommendations: self.mode_recommendations(0.0),
            };
        }

        let total = records.len() as f64;
        let overlaps: Vec<f64> = records.iter().map(Self::record_overlap).collect();
        // Mean of per-record rates, not a ratio of sums: one huge injection
        // must not dominate the signal.
        let overlap_rate = overlaps.iter().sum::<f64>() / total;

        let mut per_reason: BTreeMap<String, (u64, f64)> = BTreeMap::new();
        for (record, overlap) in records.iter().zip(&overlaps) {
            let slot = per_reason.entry(record.reason.clone()).or_insert((0, 0.0));
            slot.0 += 1;
            slot.1 += overlap;
        }
        let per_reason_breakdown = per_reason
            .into_iter()
            .map(|(reason, (count, sum))| {
                (
                    reason,
                    ReasonBreakdown {
                        count,
                        overlap_rate: sum / count as f64,
                    },
                )
            })
            .collect();

        InjectionEfficiencyReport {
            total_injections: records.len() as u64,
            avg_artifacts_included: records
                .iter()
                .map(|r| r.artifact_ids_included.len() as f64)
                .sum::<f64>()
                / total,
            avg_artifacts_referenced: records
                .iter()
                .map(|r| r.artifact_ids_referenced_in_window.len() as f64)
                .sum::<f64>()
                / total,
            overlap_rate,
            unused_artifact_rate: 1.0 - overlap_rate,
            per_reason_breakdown,
            analysis_window: AnalysisWindow {
                first_tick: records.iter().map(|r| r.tick).min().unwrap_or(0),
                last_tick: records.iter().map(|r| r.tick).max().unwrap_or(0),
            },
            per_mode_recommendations: self.mode_recommendations(overlap_rate),
        }
    }

    /// Exactly one recommendation per control mode, regardless of data
    /// volume.
    fn mode_recommendations(&self, overlap_rate: f64) -> Vec<ModeRecommendation> {
        ControlMode::ALL
            .iter()
            .map(|&mode| {
                let recommendation = match mode {
                    ControlMode::Orchestrator => {
                        "Keep full snapshots: gated runs tolerate verbose context.".to_string()
                    }
                    ControlMode::Adaptive => format!(
                        "Tune interval from observed overlap ({:.2}); shift with trust.",
                        overlap_rate
                    ),
                    ControlMode::Ecosystem => {
                        "Prefer minimal, reactive injections: self-organizing agents pull \
                         context on demand."
                            .to_string()
                    }
                };
                ModeRecommendation {
                    mode,
                    recommendation,
                }
            })
            .collect()
    }

    /// Suggest a new injection interval from the observed overlap rate,
    /// clamped to [5, 100] ticks.
    pub fn suggest_interval(&self, current_interval: u32, observed_overlap_rate: f64) -> u32 {
        let raw = if observed_overlap_rate > HIGH_OVERLAP {
            // Most injected context goes unused; inject less often.
            (current_interval as f64 * 0.7).round() as u32
        } else if observed_overlap_rate < LOW_OVERLAP {
            // Context is being missed; inject more often.
            (current_interval as f64 * 1.5).round() as u32
        } else {
            current_interval
        };
        raw.clamp(MIN_INTERVAL, MAX_INTERVAL)
    }
}

impl Default for InjectionOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        tick: i64,
        reason: &str,
        included: &[&str],
        referenced: &[&str],
    ) -> InjectionRecord {
        InjectionRecord {
            tick,
            reason: reason.to_string(),
            priority: InjectionPriority::Recommended,
            snapshot_version: 1,
            artifact_ids_included: included.iter().map(|s| s.to_string()).collect(),
            agent_events_in_window: 4,
            artifact_ids_referenced_in_window: referenced.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn empty_input_yields_all_zero_report() {
        let report = InjectionOptimizer::new().analyze_efficiency(&[]);
        assert_eq!(report.total_injections, 0);
        assert_eq!(report.avg_artifacts_included, 0.0);
        assert_eq!(report.avg_artifacts_referenced, 0.0);
        assert_eq!(report.overlap_rate, 0.0);
        assert_eq!(report.unused_artifact_rate, 0.0);
        assert!(report.per_reason_breakdown.is_empty());
        assert_eq!(report.analysis_window.first_tick, 0);
        assert_eq!(report.analysis_window.last_tick, 0);
        // Recommendations are produced even with no data.
        assert_eq!(report.per_mode_recommendations.len(), 3);
    }

    #[test]
    fn overlap_is_mean_of_per_record_rates() {
        let records = vec![
            // 2 of 4 referenced: 0.5
            record(10, "periodic", &["a", "b", "c", "d"], &["a", "b"]),
            // 1 of 1 referenced: 1.0
            record(20, "periodic", &["e"], &["e"]),
        ];
        let report = InjectionOptimizer::new().analyze_efficiency(&records);
        assert!((report.overlap_rate - 0.75).abs() < 1e-9);
        assert!((report.unused_artifact_rate - 0.25).abs() < 1e-9);
        assert!((report.avg_artifacts_included - 2.5).abs() < 1e-9);
        assert!((report.avg_artifacts_referenced - 1.5).abs() < 1e-9);
    }

    #[test]
    fn empty_inclusion_contributes_zero_not_penalty() {
        let records = vec![
            record(5, "reactive", &[], &["x"]),
            record(6, "reactive", &["a", "b"], &["a", "b"]),
        ];
        let report = InjectionOptimizer::new().analyze_efficiency(&records);
        assert!((report.overlap_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn per_reason_breakdown_counts_and_means() {
        let records = vec![
            record(1, "periodic", &["a"], &["a"]),
            record(2, "periodic", &["b"], &[]),
            record(3, "reactive", &["c"], &["c"]),
        ];
        let report = InjectionOptimizer::new().analyze_efficiency(&records);
        let periodic = &report.per_reason_breakdown["periodic"];
        assert_eq!(periodic.count, 2);
        assert!((periodic.overlap_rate - 0.5).abs() < 1e-9);
        let reactive = &report.per_reason_breakdown["reactive"];
        assert_eq!(reactive.count, 1);
        assert!((reactive.overlap_rate - 1.0).abs() < 1e-9);
    }

    #[test]
    fn analysis_window_spans_all_records() {
        let records = vec![
            record(42, "periodic", &["a"], &[]),
            record(7, "periodic", &["b"], &[]),
            record(19, "reactive", &["c"], &[]),
        ];
        let report = InjectionOptimizer::new().analyze_efficiency(&records);
        assert_eq!(report.analysis_window.first_tick, 7);
        assert_eq!(report.analysis_window.last_tick, 42);
    }

    #[test]
    fn one_recommendation_per_mode_in_fixed_order() {
        let report = InjectionOptimizer::new().analyze_efficiency(&[record(1, "p", &["a"], &[])]);
        let modes: Vec<ControlMode> = report
            .per_mode_recommendations
            .iter()
            .map(|r| r.mode)
            .collect();
        assert_eq!(
            modes,
            vec![
                ControlMode::Orchestrator,
                ControlMode::Adaptive,
                ControlMode::Ecosystem,
            ]
        );
    }

    #[test]
    fn interval_suggestions_follow_overlap_bands() {
        let optimizer = InjectionOptimizer::new();
        assert_eq!(optimizer.suggest_interval(20, 0.9), 14);
        assert_eq!(optimizer.suggest_interval(20, 0.1), 30);
        assert_eq!(optimizer.suggest_interval(20, 0.5), 20);
    }

    #[test]
    fn interval_suggestions_are_clamped() {
        let optimizer = InjectionOptimizer::new();
        assert_eq!(optimizer.suggest_interval(5, 0.95), 5);
        assert_eq!(optimizer.suggest_interval(80, 0.1), 100);
    }

    #[test]
    fn boundary_overlap_rates_leave_interval_unchanged() {
        let optimizer = InjectionOptimizer::new();
        assert_eq!(optimizer.suggest_interval(20, 0.8), 20);
        assert_eq!(optimizer.suggest_interval(20, 0.3), 20);
    }
}
