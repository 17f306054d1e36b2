// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # AEGIS Supervisor daemon
//!
//! Serves the supervisor wire protocol over HTTP/WebSocket for one sandbox.
//! The bound port is announced as a single JSON line on stdout so the parent
//! process that launched the sandbox can discover it (`--port 0` asks the OS
//! for a free port).

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aegis_supervisor_core::presentation::api::{app, AppConfig};

/// AEGIS agent supervisor - control plane for one sandboxed coding agent
#[derive(Parser)]
#[command(name = "aegis-supervisord")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Port to listen on (0 picks a free port)
    #[arg(long, env = "AGENT_PORT", default_value = "9100")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Run with the scripted mock backend (no agent CLI needed)
    #[arg(long)]
    mock: bool,

    /// Working directory for the agent CLI (passed as --cd)
    #[arg(long)]
    workspace: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let router = app(AppConfig {
        mock: cli.mock,
        workspace: cli.workspace,
        tick_interval: None,
    });

    let listener = TcpListener::bind((cli.host.as_str(), cli.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", cli.host, cli.port))?;
    let addr = listener.local_addr()?;

    // Parent process discovery: one JSON line, then logs go to stderr.
    println!("{}", serde_json::json!({"port": addr.port()}));

    info!(%addr, mock = cli.mock, "supervisor listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .context("server error")?;
    Ok(())
}
