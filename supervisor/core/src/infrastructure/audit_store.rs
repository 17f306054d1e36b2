// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory append-only audit log.
//!
//! The durable audit store lives in the backend; this process-local log
//! captures what this supervisor instance writes (trust outcomes, constraint
//! feedback) and is what the analyzers read in tests and embedded setups.
//! Entries are never mutated or deleted; total order is append order.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::domain::audit::AuditLogEntry;

#[derive(Clone)]
pub struct InMemoryAuditLog {
    entries: Arc<RwLock<Vec<AuditLogEntry>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn append(&self, entry: AuditLogEntry) {
        self.entries.write().push(entry);
    }

    pub fn snapshot(&self) -> Vec<AuditLogEntry> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for InMemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audit::AuditEntityType;
    use serde_json::json;

    #[test]
    fn append_preserves_order() {
        let log = InMemoryAuditLog::new();
        for i in 0..5 {
            log.append(AuditLogEntry::new(
                AuditEntityType::Artifact,
                format!("art-{i}"),
                "create",
                json!({"tick": i}),
            ));
        }
        let entries = log.snapshot();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].entity_id, "art-0");
        assert_eq!(entries[4].entity_id, "art-4");
    }

    #[test]
    fn snapshot_is_a_copy() {
        let log = InMemoryAuditLog::new();
        log.append(AuditLogEntry::new(
            AuditEntityType::Artifact,
            "art-1",
            "create",
            json!({}),
        ));
        let snapshot = log.snapshot();
        log.append(AuditLogEntry::new(
            AuditEntityType::Artifact,
            "art-2",
            "create",
            json!({}),
        ));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len(), 2);
    }
}
