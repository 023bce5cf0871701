// src/executor.rs

//! Pipeline executor
//!
//! Drives resolve → validate → execute for one pipeline run. Validation
//! failures surface before any filesystem mutation. Execution is
//! strictly sequential; each operation observes the on-disk effects of
//! its predecessors. Restorable runs capture reverse operations after
//! every successful execute; with rollback-on-error the executor undoes
//! successful operations in reverse order when a later one fails.
//!
//! A [`PipelineResult`] comes back on every path, error or not.

use crate::backup::{BackupBudget, BackupType};
use crate::context::ExecutionContext;
use crate::error::Error;
use crate::event::{EventBus, EventKind};
use crate::fs::{FullFs, ProjectedFs};
use crate::operation::{OpKind, Operation};
use crate::pipeline::Pipeline;
use crate::prereq::ParentDirResolver;
use crate::result::{OpResult, OpStatus, PipelineResult, RollbackReport};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Capture reverse operations and backups during execution
    pub restorable: bool,
    /// Megabyte cap on backup content captured in one run
    pub max_backup_mb: f64,
    /// Run the prerequisite resolver before dependency resolution
    pub resolve_prerequisites: bool,
    /// Undo successful operations when a later one fails
    pub rollback_on_error: bool,
    /// Keep executing after a failure instead of short-circuiting
    pub continue_on_error: bool,
    /// Validate and report without executing
    pub dry_run: bool,
    /// Cooperative cancellation token, checked between operations
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            restorable: false,
            max_backup_mb: 100.0,
            resolve_prerequisites: false,
            rollback_on_error: false,
            continue_on_error: false,
            dry_run: false,
            cancel: None,
        }
    }
}

impl PipelineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restorable(mut self, max_backup_mb: f64) -> Self {
        self.restorable = true;
        self.max_backup_mb = max_backup_mb;
        self
    }

    pub fn with_prerequisite_resolution(mut self) -> Self {
        self.resolve_prerequisites = true;
        self
    }

    pub fn with_rollback_on_error(mut self) -> Self {
        self.rollback_on_error = true;
        self
    }

    pub fn with_continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    pub fn with_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Drives pipeline runs and emits execution events
#[derive(Debug, Default)]
pub struct Executor {
    events: EventBus,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event bus for the next run; subscriptions last one execution
    pub fn events(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Run a pipeline against a filesystem
    pub fn run(
        &mut self,
        pipeline: &mut Pipeline,
        fs: &dyn FullFs,
        options: PipelineOptions,
    ) -> PipelineResult {
        let start = Instant::now();
        let mut ctx = ExecutionContext::new();
        ctx.events = std::mem::take(&mut self.events);
        ctx.dry_run = options.dry_run;
        if let Some(cancel) = options.cancel.clone() {
            ctx = ctx.with_cancel(cancel);
        }
        if options.restorable {
            ctx.budget = Some(BackupBudget::new(options.max_backup_mb));
        }

        let mut result = self.run_inner(pipeline, fs, &options, &mut ctx);
        result.budget = ctx.budget.take();
        result.duration = start.elapsed();
        // Subscriptions are scoped to this execution
        ctx.events.clear();
        result
    }

    /// Run a single operation as a one-element pipeline
    ///
    /// Any failure comes back wrapped with the operation's action and id.
    pub fn run_one(
        &mut self,
        op: Operation,
        fs: &dyn FullFs,
        options: PipelineOptions,
    ) -> PipelineResult {
        let action = op.kind().to_string();
        let id = op.id().to_string();

        let mut pipeline = Pipeline::new();
        if let Err(err) = pipeline.add(op) {
            let mut result = PipelineResult::new();
            result.success = false;
            result.errors.push(err.to_string());
            result.error = Some(Error::operation(action, id, err));
            return result;
        }

        let mut result = self.run(&mut pipeline, fs, options);
        if let Some(err) = result.error.take() {
            result.error = Some(Error::operation(action, id, err));
        }
        result
    }

    fn run_inner(
        &mut self,
        pipeline: &mut Pipeline,
        fs: &dyn FullFs,
        options: &PipelineOptions,
        ctx: &mut ExecutionContext,
    ) -> PipelineResult {
        let mut result = PipelineResult::new();

        // Phase 1: prerequisites and dependency order
        if options.resolve_prerequisites
            && let Err(err) = pipeline.resolve_prerequisites(&ParentDirResolver, fs)
        {
            return Self::abort_unresolved(pipeline, result, err);
        }
        if let Err(err) = pipeline.resolve() {
            return Self::abort_unresolved(pipeline, result, err);
        }

        // Phase 2: pre-flight validation against the projected filesystem
        let total = pipeline.len();
        {
            let mut projection = ProjectedFs::new(fs);
            for idx in 0..total {
                let op = &pipeline.operations()[idx];
                ctx.emit(EventKind::ValidatePre, op, None);
                let checked = op.validate(&projection);
                ctx.emit(
                    EventKind::ValidatePost,
                    op,
                    checked.as_ref().err().map(|e| e.to_string()),
                );
                match checked {
                    Ok(()) => projection.update_state(op),
                    Err(err) => {
                        debug!(operation = op.id(), error = %err, "validation failed");
                        for (j, other) in pipeline.operations().iter().enumerate() {
                            if j == idx {
                                result
                                    .operations
                                    .push(OpResult::failed(other.id(), OpStatus::Validation, &err));
                            } else {
                                result.operations.push(OpResult::new(other.id(), OpStatus::Skipped));
                            }
                        }
                        result.success = false;
                        result.errors.push(err.to_string());
                        result.error = Some(err);
                        return result;
                    }
                }
            }
        }

        // Phase 3: sequenced execution
        for idx in 0..total {
            if let Err(cancelled) = ctx.check_cancelled("execute") {
                warn!(remaining = total - idx, "run cancelled");
                for j in idx..total {
                    let mut skipped =
                        OpResult::new(pipeline.operations()[j].id(), OpStatus::Skipped);
                    skipped.error = Some(cancelled.to_string());
                    result.operations.push(skipped);
                }
                result.success = false;
                result.errors.push(cancelled.to_string());
                result.error = Some(cancelled);
                if options.rollback_on_error {
                    self.rollback(pipeline, fs, options, ctx, &mut result);
                }
                return result;
            }

            {
                let op = &pipeline.operations()[idx];
                ctx.emit(EventKind::OperationPre, op, None);
            }

            if options.dry_run {
                let op = &pipeline.operations()[idx];
                result.operations.push(OpResult::new(op.id(), OpStatus::Success));
                ctx.emit(EventKind::OperationPost, op, None);
                continue;
            }

            let executed = pipeline.op_mut(idx).execute(fs);
            match executed {
                Ok(()) => {
                    let op = &pipeline.operations()[idx];
                    let mut op_result = OpResult::new(op.id(), OpStatus::Success);

                    if options.restorable
                        && let Some(budget) = ctx.budget.as_mut()
                    {
                        match op.reverse_ops(fs, budget) {
                            Ok((reverse, backup)) => {
                                if let Some(backup) = &backup
                                    && backup.skipped_files > 0
                                {
                                    result.errors.push(format!(
                                        "backup for '{}' skipped {} file(s): budget exhausted",
                                        op.id(),
                                        backup.skipped_files
                                    ));
                                }
                                op_result.restore_ops = reverse;
                                op_result.backup = backup;
                            }
                            Err(err) => {
                                // The operation itself succeeded; reverse
                                // synthesis trouble is reported, not fatal
                                result
                                    .errors
                                    .push(format!("reverse synthesis for '{}': {}", op.id(), err));
                            }
                        }
                    }

                    ctx.emit(EventKind::OperationPost, op, None);
                    result.operations.push(op_result);
                }
                Err(err) => {
                    let op = &pipeline.operations()[idx];
                    warn!(operation = op.id(), error = %err, "operation failed");
                    ctx.emit(EventKind::OperationPost, op, Some(err.to_string()));
                    result
                        .operations
                        .push(OpResult::failed(op.id(), OpStatus::Failure, &err));
                    result.success = false;
                    result.errors.push(err.to_string());
                    if result.error.is_none() {
                        result.error = Some(Error::Pipeline {
                            failed_index: idx + 1,
                            total,
                            succeeded: result.succeeded_ids(),
                            source: Box::new(err),
                        });
                    }

                    if options.rollback_on_error {
                        for j in idx + 1..total {
                            result
                                .operations
                                .push(OpResult::new(pipeline.operations()[j].id(), OpStatus::Skipped));
                        }
                        self.rollback(pipeline, fs, options, ctx, &mut result);
                        return result;
                    }
                    if !options.continue_on_error {
                        for j in idx + 1..total {
                            result
                                .operations
                                .push(OpResult::new(pipeline.operations()[j].id(), OpStatus::Skipped));
                        }
                        return result;
                    }
                }
            }
        }

        if result.success {
            info!(operations = total, "pipeline run complete");
        }
        result
    }

    /// Undo successful operations in reverse order
    ///
    /// Captured restore ops run through execute; operations without
    /// captured reverses fall back to their trivial rollback. Errors are
    /// collected, never retried, and never mask the original failure.
    fn rollback(
        &mut self,
        pipeline: &Pipeline,
        fs: &dyn FullFs,
        options: &PipelineOptions,
        ctx: &mut ExecutionContext,
        result: &mut PipelineResult,
    ) {
        let mut report = RollbackReport::default();

        let successful: Vec<usize> = result
            .operations
            .iter()
            .enumerate()
            .filter(|(_, r)| r.status == OpStatus::Success)
            .map(|(i, _)| i)
            .collect();

        for &res_idx in successful.iter().rev() {
            let op_id = result.operations[res_idx].operation_id.clone();
            let Some(op) = pipeline.get(&op_id) else {
                continue;
            };
            report.attempted += 1;
            ctx.emit(EventKind::RollbackPre, op, None);

            let outcome = if options.restorable {
                Self::rollback_restorable(&result.operations[res_idx], op, fs)
            } else {
                op.rollback(fs)
            };

            let error_text = outcome.as_ref().err().map(|e| e.to_string());
            ctx.emit(EventKind::RollbackPost, op, error_text.clone());
            if let Some(text) = error_text {
                warn!(operation = %op_id, error = %text, "rollback failed");
                report.errors.push(format!("{}: {}", op_id, text));
            }
        }

        for err in &report.errors {
            result.errors.push(format!("rollback: {}", err));
        }
        result.rollback = Some(report);
    }

    fn rollback_restorable(
        op_result: &OpResult,
        op: &Operation,
        fs: &dyn FullFs,
    ) -> crate::Result<()> {
        if !op_result.restore_ops.is_empty() {
            for restore in &op_result.restore_ops {
                let mut restore = restore.clone();
                restore.execute(fs)?;
            }
            return Ok(());
        }
        // A delete that captured nothing (path was absent) needs no undo
        if op.kind() == OpKind::Delete
            && let Some(backup) = &op_result.backup
            && backup.backup_type == BackupType::None
            && backup.skipped_files == 0
        {
            return Ok(());
        }
        op.rollback(fs)
    }

    fn abort_unresolved(
        pipeline: &Pipeline,
        mut result: PipelineResult,
        err: Error,
    ) -> PipelineResult {
        for op in pipeline.operations() {
            result.operations.push(OpResult::new(op.id(), OpStatus::Skipped));
        }
        result.success = false;
        result.errors.push(err.to_string());
        result.error = Some(err);
        result
    }
}
