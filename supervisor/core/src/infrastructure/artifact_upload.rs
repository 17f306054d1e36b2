// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Artifact upload and URI rewriting.
//!
//! Events referencing sandbox-local artifact URIs are rewritten to durable
//! backend URIs before delivery, when an upload endpoint is configured.
//! Best-effort with a bounded timeout: any failure forwards the event with
//! its original URI — the live feed must not stall on the upload path.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::domain::events::{AdapterEvent, AgentEvent};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest<'a> {
    agent_id: &'a str,
    artifact_id: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    backend_uri: Option<String>,
}

#[derive(Clone)]
pub struct ArtifactUploader {
    endpoint: String,
    client: reqwest::Client,
}

impl ArtifactUploader {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::builder()
                .timeout(UPLOAD_TIMEOUT)
                .build()
                .expect("reqwest client construction"),
        }
    }

    /// Read the upload endpoint from the `AGENT_BOOTSTRAP` JSON env var.
    pub fn from_env() -> Option<Self> {
        let raw = std::env::var("AGENT_BOOTSTRAP").ok()?;
        let config: serde_json::Value = serde_json::from_str(&raw).ok()?;
        config
            .get("artifactUploadEndpoint")
            .and_then(|v| v.as_str())
            .map(Self::new)
    }

    async fn upload(
        &self,
        agent_id: &str,
        artifact_id: &str,
        mime_type: Option<&str>,
    ) -> Option<String> {
        let request = UploadRequest {
            agent_id,
            artifact_id,
            content: "",
            mime_type,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .ok()?;
        if response.status() != StatusCode::CREATED {
            debug!(status = %response.status(), "artifact upload rejected");
            return None;
        }
        response
            .json::<UploadResponse>()
            .await
            .ok()
            .and_then(|r| r.backend_uri)
    }

    /// Rewrite the artifact URI inside an envelope, when it carries one.
    /// Failures of any kind return the envelope unchanged.
    pub async fn rewrite(&self, mut envelope: AdapterEvent) -> AdapterEvent {
        let AgentEvent::Artifact(artifact) = &mut envelope.event else {
            return envelope;
        };
        let agent_id = artifact.agent_id.clone();
        let artifact_id = artifact.artifact_id.clone();
        let mime_type = artifact.mime_type.clone();
        if let Some(backend_uri) = self
            .upload(&agent_id, &artifact_id, mime_type.as_deref())
            .await
        {
            artifact.uri = Some(backend_uri);
        }
        envelope
    }
}
