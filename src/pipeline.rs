// src/pipeline.rs

//! Operation pipeline
//!
//! An ordered, deduplicated collection of operations with topological
//! resolution. Declared dependencies and prerequisite-injected
//! dependencies both become edges; resolution is a stable Kahn sort, so
//! ties within a layer keep insertion order. Validation runs against a
//! projected filesystem so each operation sees the state its
//! predecessors will produce.

use crate::error::{Error, Result};
use crate::fs::{FullFs, ProjectedFs};
use crate::operation::Operation;
use crate::prereq::PrereqResolver;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Ordered, resolvable set of operations to execute as a unit
#[derive(Debug, Default)]
pub struct Pipeline {
    ops: Vec<Operation>,
    index: HashMap<String, usize>,
    resolved: bool,
    prereqs_resolved: bool,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation; rejects empty and duplicate ids and
    /// structurally invalid operations
    pub fn add(&mut self, op: Operation) -> Result<()> {
        if op.id().is_empty() {
            return Err(Error::validation("", op.kind().to_string(), "empty operation id"));
        }
        if self.index.contains_key(op.id()) {
            return Err(Error::validation(
                op.id(),
                op.kind().to_string(),
                "duplicate operation id",
            ));
        }
        if matches!(op.kind(), crate::operation::OpKind::Copy | crate::operation::OpKind::Move)
            && (op.src_path().is_none() || op.dst_path().is_none())
        {
            return Err(Error::validation(
                op.id(),
                op.kind().to_string(),
                "copy/move requires source and destination",
            ));
        }

        self.index.insert(op.id().to_string(), self.ops.len());
        self.ops.push(op);
        self.resolved = false;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Operations in current (resolved, if `resolve` ran) order
    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    pub fn get(&self, id: &str) -> Option<&Operation> {
        self.index.get(id).map(|&idx| &self.ops[idx])
    }

    pub(crate) fn op_mut(&mut self, idx: usize) -> &mut Operation {
        &mut self.ops[idx]
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Topologically order operations by their dependency edges
    ///
    /// Detects cycles and references to operations not in the pipeline.
    /// Ties within a layer preserve insertion order.
    pub fn resolve(&mut self) -> Result<()> {
        let n = self.ops.len();

        // Conflict declarations are checked against pipeline membership
        for op in &self.ops {
            for conflict in op.conflicts() {
                if self.index.contains_key(conflict) {
                    return Err(Error::Conflict {
                        operation_id: op.id().to_string(),
                        with: conflict.clone(),
                    });
                }
            }
        }

        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (i, op) in self.ops.iter().enumerate() {
            let missing: Vec<String> = op
                .dependencies()
                .iter()
                .filter(|dep| !self.index.contains_key(*dep))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(Error::Dependency {
                    operation_id: op.id().to_string(),
                    missing,
                });
            }
            for dep in op.dependencies() {
                let j = self.index[dep];
                indegree[i] += 1;
                dependents[j].push(i);
            }
        }

        let mut emitted = vec![false; n];
        let mut order = Vec::with_capacity(n);
        loop {
            let ready: Vec<usize> = (0..n)
                .filter(|&i| !emitted[i] && indegree[i] == 0)
                .collect();
            if ready.is_empty() {
                break;
            }
            for i in ready {
                emitted[i] = true;
                order.push(i);
                for &dependent in &dependents[i] {
                    indegree[dependent] -= 1;
                }
            }
        }

        if order.len() < n {
            let ids = (0..n)
                .filter(|&i| !emitted[i])
                .map(|i| self.ops[i].id().to_string())
                .collect();
            return Err(Error::DependencyCycle { ids });
        }

        let mut reordered = Vec::with_capacity(n);
        for &i in &order {
            reordered.push(self.ops[i].clone());
        }
        self.ops = reordered;
        self.index = self
            .ops
            .iter()
            .enumerate()
            .map(|(i, op)| (op.id().to_string(), i))
            .collect();
        self.resolved = true;
        Ok(())
    }

    /// Satisfy unsatisfied prerequisites by inserting synthesized
    /// operations
    ///
    /// Each synthesized operation gets a dependency edge from its
    /// original and is deduplicated by target path, so two operations
    /// needing the same parent share one mkdir.
    pub fn resolve_prerequisites(
        &mut self,
        resolver: &dyn PrereqResolver,
        fs: &dyn FullFs,
    ) -> Result<()> {
        if self.prereqs_resolved {
            return Ok(());
        }

        let mut synthesized_by_path: HashMap<PathBuf, String> = HashMap::new();
        let mut additions: Vec<Operation> = Vec::new();
        let mut edges: Vec<(usize, String)> = Vec::new();

        for (i, op) in self.ops.iter().enumerate() {
            for prereq in op.prerequisites() {
                if prereq.is_satisfied(fs) {
                    continue;
                }
                for synth in resolver.resolve(&prereq)? {
                    let target = synth.path().to_path_buf();
                    let id = if let Some(existing) = synthesized_by_path.get(&target) {
                        existing.clone()
                    } else if self.index.contains_key(synth.id()) {
                        synth.id().to_string()
                    } else {
                        let id = synth.id().to_string();
                        debug!(
                            target = %target.display(),
                            id = %id,
                            "synthesized prerequisite operation"
                        );
                        synthesized_by_path.insert(target, id.clone());
                        additions.push(synth);
                        id
                    };
                    edges.push((i, id));
                }
            }
        }

        for (i, dep_id) in edges {
            self.ops[i].add_dependency(dep_id);
        }
        for synth in additions {
            self.add(synth)?;
        }

        self.prereqs_resolved = true;
        self.resolved = false;
        Ok(())
    }

    /// Pre-flight validation against a projection of `fs`
    ///
    /// Resolves first if needed. Each operation validates against the
    /// accumulated projected state, then applies its own intended effect
    /// for the operations after it.
    pub fn validate(&mut self, fs: &dyn FullFs) -> Result<()> {
        if !self.resolved {
            self.resolve()?;
        }
        let mut projection = ProjectedFs::new(fs);
        for op in &self.ops {
            op.validate(&projection)?;
            projection.update_state(op);
        }
        Ok(())
    }
}
