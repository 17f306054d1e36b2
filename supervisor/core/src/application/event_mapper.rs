// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Maps Codex CLI NDJSON output to wire-protocol agent events.
//!
//! The CLI streams `thread.*`, `turn.*`, and `item.*` records; items nest
//! their fields under `item`. The mapper is stateful: it pairs
//! `item.started`/`item.completed` into tool-call request/completion pairs
//! and remembers the session id the CLI reports.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use uuid::Uuid;

use crate::domain::brief::{ArtifactKind, ArtifactStatus, Severity};
use crate::domain::events::{
    AgentEvent, ArtifactEvent, ErrorCategory, ErrorEvent, ProgressEvent, Provenance, StatusEvent,
    ToolCallEvent, ToolCallPhase,
};

/// Infer artifact kind from a file path.
pub fn infer_artifact_kind(file_path: &str) -> ArtifactKind {
    let base = Path::new(file_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = Path::new(&base)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if base.contains(".test.") || base.contains(".spec.") || base.starts_with("test_") {
        return ArtifactKind::Test;
    }
    match ext.as_str() {
        "ts" | "js" | "py" | "rs" | "go" | "java" | "tsx" | "jsx" => ArtifactKind::Code,
        "md" | "txt" | "rst" => ArtifactKind::Document,
        "json" | "yaml" | "yml" | "toml" | "ini" | "cfg" => ArtifactKind::Config,
        _ => ArtifactKind::Other,
    }
}

struct OpenToolCall {
    tool_call_id: String,
    tool_name: String,
    started_at: Instant,
    file_path: Option<String>,
}

pub struct CodexEventMapper {
    agent_id: String,
    workstream: String,
    session_id: Option<String>,
    turn_count: u32,
    open_tool_calls: HashMap<String, OpenToolCall>,
}

impl CodexEventMapper {
    pub fn new(agent_id: impl Into<String>, workstream: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            workstream: workstream.into(),
            session_id: None,
            turn_count: 0,
            open_tool_calls: HashMap::new(),
        }
    }

    /// Session id extracted from `thread.started`, once seen.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Map one parsed NDJSON record to zero or more agent events.
    pub fn map_event(&mut self, data: &Value) -> Vec<AgentEvent> {
        let event_type = data.get("type").and_then(Value::as_str).unwrap_or("");

        match event_type {
            "thread.started" => {
                self.session_id = str_field(data, "thread_id")
                    .or_else(|| str_field(data, "id"))
                    .map(str::to_string);
                vec![]
            }
            "turn.started" => {
                self.turn_count += 1;
                vec![self.status(format!("Turn {} started", self.turn_count))]
            }
            "turn.completed" => {
                let usage = data.get("usage").cloned().unwrap_or_else(|| json!({}));
                let input_tokens = usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0);
                let output_tokens = usage
                    .get("output_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                vec![self.status(format!(
                    "Turn completed (in: {input_tokens}, out: {output_tokens} tokens)"
                ))]
            }
            "turn.failed" => {
                let message = data
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("Turn failed")
                    .to_string();
                vec![AgentEvent::Error(ErrorEvent {
                    agent_id: self.agent_id.clone(),
                    severity: Severity::High,
                    message,
                    recoverable: false,
                    error_code: None,
                    category: ErrorCategory::Model,
                    context: None,
                })]
            }
            "item.started" | "item.completed" => self.handle_item(event_type, data),
            _ => vec![],
        }
    }

    fn handle_item(&mut self, event_type: &str, data: &Value) -> Vec<AgentEvent> {
        let item = data.get("item").cloned().unwrap_or_else(|| json!({}));
        let item_type = str_field(&item, "type")
            .or_else(|| str_field(data, "item_type"))
            .unwrap_or("")
            .to_string();
        let item_id = str_field(&item, "id")
            .or_else(|| str_field(data, "item_id"))
            .or_else(|| str_field(data, "id"))
            .unwrap_or("")
            .to_string();

        match item_type.as_str() {
            "reasoning" => vec![],
            "command_execution" => self.handle_command(event_type, &item_id, &item),
            "file_change" => self.handle_file_change(event_type, &item_id, &item),
            "agent_message" => {
                if event_type != "item.completed" {
                    return vec![];
                }
                let text = str_field(&item, "text")
                    .or_else(|| str_field(&item, "content"))
                    .unwrap_or("");
                let text = if text.chars().count() > 500 {
                    let head: String = text.chars().take(497).collect();
                    format!("{head}...")
                } else {
                    text.to_string()
                };
                vec![self.status(text)]
            }
            "mcp_tool_call" => self.handle_mcp_tool(event_type, &item_id, &item),
            "todo_list" => {
                if event_type != "item.completed" {
                    return vec![];
                }
                let items = item
                    .get("items")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let total = items.len();
                let done = items
                    .iter()
                    .filter(|i| i.get("completed").and_then(Value::as_bool).unwrap_or(false))
                    .count();
                let pct = if total > 0 {
                    done as f64 / total as f64 * 100.0
                } else {
                    0.0
                };
                let operation_id = if item_id.is_empty() {
                    Uuid::new_v4().to_string()
                } else {
                    item_id
                };
                vec![AgentEvent::Progress(ProgressEvent {
                    agent_id: self.agent_id.clone(),
                    operation_id,
                    description: format!("Todo: {done}/{total} completed"),
                    progress_pct: Some(pct),
                })]
            }
            _ => vec![],
        }
    }

    fn handle_command(&mut self, event_type: &str, item_id: &str, item: &Value) -> Vec<AgentEvent> {
        if event_type == "item.started" {
            let tool_call_id = Uuid::new_v4().to_string();
            let command = str_field(item, "command").unwrap_or("").to_string();
            self.open_tool_calls.insert(
                item_id.to_string(),
                OpenToolCall {
                    tool_call_id: tool_call_id.clone(),
                    tool_name: "Bash".to_string(),
                    started_at: Instant::now(),
                    file_path: None,
                },
            );
            return vec![AgentEvent::ToolCall(ToolCallEvent {
                agent_id: self.agent_id.clone(),
                tool_call_id,
                tool_name: "Bash".to_string(),
                phase: ToolCallPhase::Requested,
                input: json!({"command": command}),
                output: None,
                approved: true,
                duration_ms: None,
            })];
        }

        let open = self.open_tool_calls.remove(item_id);
        let (tool_call_id, duration_ms) = call_identity(&open);
        let exit_code = item
            .get("exit_code")
            .and_then(Value::as_i64)
            .or_else(|| item.get("status").and_then(Value::as_i64))
            .unwrap_or(0);
        let output = str_field(item, "aggregated_output")
            .or_else(|| str_field(item, "output"))
            .or_else(|| str_field(item, "stdout"))
            .unwrap_or("")
            .to_string();
        vec![AgentEvent::ToolCall(ToolCallEvent {
            agent_id: self.agent_id.clone(),
            tool_call_id,
            tool_name: "Bash".to_string(),
            phase: if exit_code == 0 {
                ToolCallPhase::Completed
            } else {
                ToolCallPhase::Failed
            },
            input: json!({}),
            output: Some(json!({"stdout": output, "exit_code": exit_code})),
            approved: true,
            duration_ms,
        })]
    }

    fn handle_file_change(
        &mut self,
        event_type: &str,
        item_id: &str,
        item: &Value,
    ) -> Vec<AgentEvent> {
        let file_path = str_field(item, "file_path")
            .or_else(|| str_field(item, "path"))
            .unwrap_or("")
            .to_string();

        if event_type == "item.started" {
            let tool_call_id = Uuid::new_v4().to_string();
            self.open_tool_calls.insert(
                item_id.to_string(),
                OpenToolCall {
                    tool_call_id: tool_call_id.clone(),
                    tool_name: "Edit".to_string(),
                    started_at: Instant::now(),
                    file_path: Some(file_path.clone()),
                },
            );
            return vec![AgentEvent::ToolCall(ToolCallEvent {
                agent_id: self.agent_id.clone(),
                tool_call_id,
                tool_name: "Edit".to_string(),
                phase: ToolCallPhase::Requested,
                input: json!({"file_path": file_path}),
                output: None,
                approved: true,
                duration_ms: None,
            })];
        }

        let open = self.open_tool_calls.remove(item_id);
        let (tool_call_id, duration_ms) = call_identity(&open);
        let path = if file_path.is_empty() {
            open.and_then(|tc| tc.file_path).unwrap_or_default()
        } else {
            file_path
        };

        let mut events = vec![AgentEvent::ToolCall(ToolCallEvent {
            agent_id: self.agent_id.clone(),
            tool_call_id,
            tool_name: "Edit".to_string(),
            phase: ToolCallPhase::Completed,
            input: json!({"file_path": path}),
            output: Some(json!({"success": true})),
            approved: true,
            duration_ms,
        })];

        if !path.is_empty() {
            let name = Path::new(&path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.clone());
            events.push(AgentEvent::Artifact(ArtifactEvent {
                agent_id: self.agent_id.clone(),
                artifact_id: Uuid::new_v4().to_string(),
                name,
                kind: infer_artifact_kind(&path),
                workstream: self.workstream.clone(),
                status: ArtifactStatus::Draft,
                quality_score: 0.5,
                provenance: Provenance::created_now(&self.agent_id),
                uri: Some(path),
                mime_type: None,
                size_bytes: None,
                content_hash: None,
            }));
        }
        events
    }

    fn handle_mcp_tool(&mut self, event_type: &str, item_id: &str, item: &Value) -> Vec<AgentEvent> {
        let tool_name = str_field(item, "tool_name")
            .or_else(|| str_field(item, "name"))
            .unwrap_or("mcp_tool")
            .to_string();

        if event_type == "item.started" {
            let tool_call_id = Uuid::new_v4().to_string();
            let input = item
                .get("input")
                .or_else(|| item.get("arguments"))
                .cloned()
                .unwrap_or_else(|| json!({}));
            self.open_tool_calls.insert(
                item_id.to_string(),
                OpenToolCall {
                    tool_call_id: tool_call_id.clone(),
                    tool_name: tool_name.clone(),
                    started_at: Instant::now(),
                    file_path: None,
                },
            );
            return vec![AgentEvent::ToolCall(ToolCallEvent {
                agent_id: self.agent_id.clone(),
                tool_call_id,
                tool_name,
                phase: ToolCallPhase::Requested,
                input,
                output: None,
                approved: true,
                duration_ms: None,
            })];
        }

        let open = self.open_tool_calls.remove(item_id);
        let (tool_call_id, duration_ms) = call_identity(&open);
        let name = open
            .as_ref()
            .map(|tc| tc.tool_name.clone())
            .unwrap_or(tool_name);
        let output = item.get("output").or_else(|| item.get("result")).cloned();
        vec![AgentEvent::ToolCall(ToolCallEvent {
            agent_id: self.agent_id.clone(),
            tool_call_id,
            tool_name: name,
            phase: ToolCallPhase::Completed,
            input: json!({}),
            output,
            approved: true,
            duration_ms,
        })]
    }

    fn status(&self, message: String) -> AgentEvent {
        AgentEvent::Status(StatusEvent {
            agent_id: self.agent_id.clone(),
            message,
            tick: None,
        })
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn call_identity(open: &Option<OpenToolCall>) -> (String, Option<u64>) {
    match open {
        Some(tc) => (
            tc.tool_call_id.clone(),
            Some(tc.started_at.elapsed().as_millis() as u64),
        ),
        None => (Uuid::new_v4().to_string(), None),
    }
}
