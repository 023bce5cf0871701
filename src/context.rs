// src/context.rs

//! Per-run execution context
//!
//! Carries the event sink, the optional backup budget, and the
//! cancellation token for one pipeline run. Cancellation is cooperative:
//! the executor checks between operations, so an operation already in
//! progress runs to completion.

use crate::backup::BackupBudget;
use crate::error::{Error, Result};
use crate::event::{Event, EventBus, EventKind};
use crate::operation::Operation;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-run object carrying budget, events, and cancellation
#[derive(Debug, Default)]
pub struct ExecutionContext {
    pub events: EventBus,
    pub budget: Option<BackupBudget>,
    cancel: Option<Arc<AtomicBool>>,
    pub dry_run: bool,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a megabyte-capped backup budget
    pub fn with_budget(mut self, budget: BackupBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Attach a cancellation token
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// Return a Cancelled error if cancellation was requested
    pub fn check_cancelled(&self, step: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled(step.to_string()))
        } else {
            Ok(())
        }
    }

    /// Emit an event for `op` with an optional error message
    pub fn emit(&self, kind: EventKind, op: &Operation, error: Option<String>) {
        self.events.emit(&Event {
            kind,
            operation_id: op.id().to_string(),
            desc: op.describe(),
            error,
        });
    }
}
