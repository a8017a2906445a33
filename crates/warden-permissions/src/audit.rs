//! Bounded, in-memory audit trail of permission decisions.

use crate::types::{OperationKind, PermissionDecision};
use std::collections::VecDeque;

/// Maximum number of decisions retained. Oldest entries are evicted first.
pub const AUDIT_LOG_CAPACITY: usize = 100;

/// Chronological record of decisions, capped at [`AUDIT_LOG_CAPACITY`].
///
/// Nothing is persisted; entries are lost with the process.
#[derive(Debug, Clone)]
pub struct AuditLog {
    entries: VecDeque<PermissionDecision>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(AUDIT_LOG_CAPACITY),
        }
    }

    /// Append to the tail, evicting from the head once over capacity.
    pub fn append(&mut self, decision: PermissionDecision) {
        while self.entries.len() >= AUDIT_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(decision);
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Vec<PermissionDecision> {
        self.entries.iter().cloned().collect()
    }

    /// Entries of one kind, oldest first.
    pub fn query_by_kind(&self, kind: OperationKind) -> Vec<PermissionDecision> {
        self.entries
            .iter()
            .filter(|d| d.kind == kind)
            .cloned()
            .collect()
    }

    pub fn last(&self) -> Option<&PermissionDecision> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
