// src/operation/custom.rs

//! User-defined operations
//!
//! A custom operation holds an execute callback plus optional validate
//! and rollback callbacks. Output returned by execute is stored into the
//! operation's details under `output`. When a rollback callback exists
//! it becomes the body of the synthesized reverse operation.

use crate::error::Result;
use crate::fs::{FullFs, ProjectedFs};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::Operation;

const OUTPUT_DETAIL: &str = "output";

type ExecFn = dyn Fn(&dyn FullFs) -> Result<Option<Value>> + Send + Sync;
type ValidateFn = dyn for<'a> Fn(&ProjectedFs<'a>) -> Result<()> + Send + Sync;
type RollbackFn = dyn Fn(&dyn FullFs) -> Result<()> + Send + Sync;

/// Callbacks backing a custom operation
#[derive(Clone)]
pub struct CustomCallbacks {
    execute: Arc<ExecFn>,
    validate: Option<Arc<ValidateFn>>,
    rollback: Option<Arc<RollbackFn>>,
}

impl CustomCallbacks {
    pub fn new(
        execute: impl Fn(&dyn FullFs) -> Result<Option<Value>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            execute: Arc::new(execute),
            validate: None,
            rollback: None,
        }
    }

    pub fn with_validate(
        mut self,
        validate: impl for<'a> Fn(&ProjectedFs<'a>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Some(Arc::new(validate));
        self
    }

    pub fn with_rollback(
        mut self,
        rollback: impl Fn(&dyn FullFs) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.rollback = Some(Arc::new(rollback));
        self
    }

    pub fn has_rollback(&self) -> bool {
        self.rollback.is_some()
    }
}

impl fmt::Debug for CustomCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomCallbacks")
            .field("validate", &self.validate.is_some())
            .field("rollback", &self.rollback.is_some())
            .finish()
    }
}

pub(super) fn validate(op: &Operation, projection: &ProjectedFs<'_>) -> Result<()> {
    match op.custom_callbacks().and_then(|c| c.validate.as_ref()) {
        Some(callback) => (callback.as_ref())(projection),
        None => Ok(()),
    }
}

pub(super) fn execute(op: &mut Operation, fs: &dyn FullFs) -> Result<()> {
    let Some(callbacks) = op.custom_callbacks().cloned() else {
        return Err(op.invalid("custom operation without callbacks"));
    };
    if let Some(output) = (callbacks.execute.as_ref())(fs)? {
        op.set_detail(OUTPUT_DETAIL, output);
    }
    Ok(())
}

pub(super) fn rollback(op: &Operation, fs: &dyn FullFs) -> Result<()> {
    match op.custom_callbacks().and_then(|c| c.rollback.as_ref()) {
        Some(callback) => (callback.as_ref())(fs),
        None => Ok(()),
    }
}

/// When a rollback callback exists, the reverse is a custom operation
/// that runs it
pub(super) fn reverse(op: &Operation) -> Vec<Operation> {
    let Some(rollback) = op
        .custom_callbacks()
        .and_then(|c| c.rollback.as_ref())
        .cloned()
    else {
        return Vec::new();
    };

    let body = CustomCallbacks::new(move |fs| {
        (rollback.as_ref())(fs)?;
        Ok(None)
    });
    vec![Operation::custom(
        format!("reverse_{}", op.id()),
        op.path(),
        body,
    )]
}
