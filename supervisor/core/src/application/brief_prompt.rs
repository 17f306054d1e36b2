// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Renders an [`AgentBrief`] as the structured prompt handed to the Codex
//! CLI. Capped at roughly 2000 tokens (~8000 chars).

use crate::domain::brief::AgentBrief;

const MAX_PROMPT_CHARS: usize = 8000;

pub fn brief_to_prompt(brief: &AgentBrief, continuation: bool) -> String {
    let mut sections: Vec<String> = Vec::new();

    if continuation {
        sections.push(
            "Your previous assignment is complete. Here is your next assignment:\n".to_string(),
        );
    }

    sections.push(format!(
        "You are a {} working on the \"{}\" workstream.",
        brief.role, brief.workstream
    ));
    sections.push(brief.description.clone());

    let project = &brief.project_brief;
    sections.push(format!(
        "\n## Project\n{}: {}",
        project.title, project.description
    ));

    if !project.goals.is_empty() {
        let goals: Vec<String> = project.goals.iter().map(|g| format!("- {g}")).collect();
        sections.push(format!("\n## Goals\n{}", goals.join("\n")));
    }

    let mut constraints = brief.constraints.clone();
    if let Some(project_constraints) = &project.constraints {
        constraints.extend(project_constraints.iter().cloned());
    }
    if !constraints.is_empty() {
        let lines: Vec<String> = constraints.iter().map(|c| format!("- {c}")).collect();
        sections.push(format!("\n## Constraints\n{}", lines.join("\n")));
    }

    let snapshot = &brief.knowledge_snapshot;
    if snapshot.estimated_tokens > 0 {
        let mut parts: Vec<String> = Vec::new();
        if !snapshot.workstreams.is_empty() {
            parts.push(format!("{} active workstream(s)", snapshot.workstreams.len()));
        }
        if !snapshot.pending_decisions.is_empty() {
            parts.push(format!(
                "{} pending decision(s)",
                snapshot.pending_decisions.len()
            ));
        }
        if !snapshot.artifact_index.is_empty() {
            parts.push(format!("{} artifact(s)", snapshot.artifact_index.len()));
        }
        if !parts.is_empty() {
            sections.push(format!("\n## Context\n{}.", parts.join(", ")));
        }
    }

    let result = sections.join("\n");
    if result.chars().count() > MAX_PROMPT_CHARS {
        let head: String = result.chars().take(MAX_PROMPT_CHARS - 3).collect();
        format!("{head}...")
    } else {
        result
    }
}
