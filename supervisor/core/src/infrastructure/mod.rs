// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod artifact_upload;
pub mod audit_store;
pub mod event_stream;
pub mod tick_service;
pub mod token_service;
