// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! AEGIS Supervisor core
//!
//! Control plane for supervising long-running autonomous coding agents:
//! runner lifecycle, ordered event streaming, credential issuance for
//! sandboxed tool hooks, logical time, and audit-log analyzers.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain types, runner protocol, transports, analyzers

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
