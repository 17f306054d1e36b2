// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

/// Error taxonomy shared by the runner protocol, credential service, and the
/// HTTP surface that fronts them.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Operation invalid in the current state (e.g. spawn while running).
    #[error("{0}")]
    Conflict(String),

    /// No active runner, or an unknown decision id.
    #[error("{0}")]
    NotFound(String),

    /// Token invalid, expired, wrong signature, or malformed.
    #[error("{0}")]
    Unauthorized(String),

    /// Capability not available on this backend.
    #[error("{0}")]
    Unsupported(String),

    /// Artifact upload or agent-SDK call exceeded its bound.
    #[error("{0}")]
    UpstreamTimeout(String),

    /// Unparseable request body or token structure.
    #[error("{0}")]
    Malformed(String),
}

impl SupervisorError {
    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::Conflict(detail.into())
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::NotFound(detail.into())
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::Unauthorized(detail.into())
    }

    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self::Unsupported(detail.into())
    }
}
