// src/result.rs

//! Run results
//!
//! A [`PipelineResult`] is returned on every run path, error or not; it
//! carries partial success information, synthesized reverse operations,
//! and the final budget state. Per-operation outcomes live in
//! [`OpResult`].

use crate::backup::{BackupBudget, BackupData};
use crate::error::Error;
use crate::operation::Operation;
use std::time::Duration;
use strum_macros::Display;

/// Outcome of one operation in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OpStatus {
    #[strum(serialize = "success")]
    Success,
    #[strum(serialize = "failure")]
    Failure,
    /// Pre-flight validation rejected the operation; nothing executed
    #[strum(serialize = "validation")]
    Validation,
    #[strum(serialize = "skipped")]
    Skipped,
}

/// Per-operation result
#[derive(Debug)]
pub struct OpResult {
    pub operation_id: String,
    pub status: OpStatus,
    pub error: Option<String>,
    /// Captured backup content (restorable runs)
    pub backup: Option<BackupData>,
    /// Reverse operations synthesized for this operation, in the order
    /// they must execute to undo it
    pub restore_ops: Vec<Operation>,
}

impl OpResult {
    pub fn new(operation_id: impl Into<String>, status: OpStatus) -> Self {
        Self {
            operation_id: operation_id.into(),
            status,
            error: None,
            backup: None,
            restore_ops: Vec::new(),
        }
    }

    pub fn failed(operation_id: impl Into<String>, status: OpStatus, error: &Error) -> Self {
        let mut result = Self::new(operation_id, status);
        result.error = Some(error.to_string());
        result
    }
}

/// Outcome of the rollback pass, reported separately from the run
#[derive(Debug, Default)]
pub struct RollbackReport {
    /// Operations a rollback was attempted for
    pub attempted: usize,
    /// Collected rollback errors; never masks the original failure
    pub errors: Vec<String>,
}

impl RollbackReport {
    pub fn clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Result of one pipeline run
#[derive(Debug)]
pub struct PipelineResult {
    pub success: bool,
    pub operations: Vec<OpResult>,
    /// Final budget state for restorable runs
    pub budget: Option<BackupBudget>,
    pub duration: Duration,
    /// Human-readable error log for the run (failures, skipped backups,
    /// rollback problems)
    pub errors: Vec<String>,
    /// The first failure, wrapped with pipeline context
    pub error: Option<Error>,
    /// Rollback outcome when rollback-on-error ran
    pub rollback: Option<RollbackReport>,
}

impl PipelineResult {
    pub(crate) fn new() -> Self {
        Self {
            success: true,
            operations: Vec::new(),
            budget: None,
            duration: Duration::ZERO,
            errors: Vec::new(),
            error: None,
            rollback: None,
        }
    }

    /// All synthesized reverse operations, in execution order of their
    /// originals
    pub fn restore_ops(&self) -> Vec<&Operation> {
        self.operations
            .iter()
            .flat_map(|result| result.restore_ops.iter())
            .collect()
    }

    /// Result for a specific operation id
    pub fn operation(&self, id: &str) -> Option<&OpResult> {
        self.operations.iter().find(|r| r.operation_id == id)
    }

    /// Ids of operations that executed successfully
    pub fn succeeded_ids(&self) -> Vec<String> {
        self.operations
            .iter()
            .filter(|r| r.status == OpStatus::Success)
            .map(|r| r.operation_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names() {
        assert_eq!(OpStatus::Success.to_string(), "success");
        assert_eq!(OpStatus::Validation.to_string(), "validation");
    }

    #[test]
    fn test_restore_ops_flatten_in_order() {
        let mut result = PipelineResult::new();
        let mut first = OpResult::new("op-1", OpStatus::Success);
        first.restore_ops.push(Operation::delete("reverse_op-1", "a"));
        let mut second = OpResult::new("op-2", OpStatus::Success);
        second.restore_ops.push(Operation::delete("reverse_op-2", "b"));
        result.operations.push(first);
        result.operations.push(second);

        let ids: Vec<&str> = result.restore_ops().iter().map(|op| op.id()).collect();
        assert_eq!(ids, vec!["reverse_op-1", "reverse_op-2"]);
    }

    #[test]
    fn test_succeeded_ids_filters() {
        let mut result = PipelineResult::new();
        result.operations.push(OpResult::new("a", OpStatus::Success));
        result.operations.push(OpResult::new("b", OpStatus::Skipped));
        assert_eq!(result.succeeded_ids(), vec!["a"]);
    }
}
