// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Bridge hook poster
//!
//! Invoked by tool hooks inside the sandbox to report tool use to the
//! control plane. Reads one tool-callback payload from stdin, wraps it into
//! the standard event envelope, and POSTs it to the configured ingest
//! endpoint with a hard 5 s budget.
//!
//! Observability must never fail the thing it observes: every error path is
//! swallowed and the process always exits 0.

use std::io::Read;
use std::time::Duration;

use serde_json::{json, Value};

use aegis_supervisor_core::domain::events::{
    AdapterEvent, AgentEvent, EventFactory, ToolCallEvent, ToolCallPhase,
};

const POST_TIMEOUT: Duration = Duration::from_secs(5);

struct BridgeConfig {
    server_url: String,
    agent_id: String,
    run_id: String,
    token: Option<String>,
}

impl BridgeConfig {
    fn from_env() -> Option<Self> {
        Some(Self {
            server_url: std::env::var("BRIDGE_SERVER_URL").ok()?,
            agent_id: std::env::var("BRIDGE_AGENT_ID").ok()?,
            run_id: std::env::var("BRIDGE_RUN_ID").ok()?,
            token: std::env::var("AGENT_TOKEN").ok(),
        })
    }

    fn ingest_url(&self) -> String {
        format!(
            "{}/api/events/ingest",
            self.server_url.trim_end_matches('/')
        )
    }
}

fn parse_phase(payload: &Value) -> ToolCallPhase {
    match payload.get("phase").and_then(Value::as_str) {
        Some("requested") => ToolCallPhase::Requested,
        Some("running") => ToolCallPhase::Running,
        Some("failed") => ToolCallPhase::Failed,
        _ => ToolCallPhase::Completed,
    }
}

/// Map a raw tool-callback payload into the wire envelope.
fn envelope_from_payload(
    factory: &EventFactory,
    agent_id: &str,
    payload: &Value,
) -> AdapterEvent {
    let tool_name = payload
        .get("toolName")
        .or_else(|| payload.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("tool")
        .to_string();
    let tool_call_id = payload
        .get("toolCallId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let input = payload
        .get("toolArgs")
        .or_else(|| payload.get("input"))
        .cloned()
        .unwrap_or_else(|| json!({}));
    let output = payload.get("output").or_else(|| payload.get("result")).cloned();

    factory.wrap(AgentEvent::ToolCall(ToolCallEvent {
        agent_id: agent_id.to_string(),
        tool_call_id,
        tool_name,
        phase: parse_phase(payload),
        input,
        output,
        approved: true,
        duration_ms: payload.get("durationMs").and_then(Value::as_u64),
    }))
}

async fn post_envelope(config: &BridgeConfig, envelope: &AdapterEvent) {
    let client = match reqwest::Client::builder().timeout(POST_TIMEOUT).build() {
        Ok(client) => client,
        Err(_) => return,
    };
    let mut request = client.post(config.ingest_url()).json(envelope);
    if let Some(token) = &config.token {
        request = request.bearer_auth(token);
    }
    // Fire-and-forget: a dead bridge must not block the wrapped agent.
    let _ = request.send().await;
}

#[tokio::main]
async fn main() {
    let Some(config) = BridgeConfig::from_env() else {
        return;
    };

    let mut raw = String::new();
    if std::io::stdin().read_to_string(&mut raw).is_err() {
        return;
    }
    let Ok(payload) = serde_json::from_str::<Value>(&raw) else {
        return;
    };

    let factory = EventFactory::new(&config.run_id);
    let envelope = envelope_from_payload(&factory, &config.agent_id, &payload);
    post_envelope(&config, &envelope).await;
}
