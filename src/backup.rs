// src/backup.rs

//! Backup budget and reverse-operation synthesis
//!
//! When a run is restorable, every executed operation yields the
//! operations that would undo it. For deletes that means copying the
//! affected bytes into memory first, accounted against a megabyte budget
//! shared across the run. Files that individually exceed the remaining
//! budget are skipped and counted; the partial backup still ships.
//!
//! Budget discipline is transactional: a consume that is followed by a
//! failed read is restored before the error propagates.

use crate::error::{Error, Result};
use crate::fs::{walk, FileKind, FullFs};
use crate::operation::Operation;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Bytes expressed as fractional megabytes
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Megabyte cap on captured backup content for one run
#[derive(Debug, Clone)]
pub struct BackupBudget {
    total_mb: f64,
    used_mb: f64,
}

impl BackupBudget {
    pub fn new(total_mb: f64) -> Self {
        Self {
            total_mb,
            used_mb: 0.0,
        }
    }

    pub fn total_mb(&self) -> f64 {
        self.total_mb
    }

    pub fn used_mb(&self) -> f64 {
        self.used_mb
    }

    pub fn remaining_mb(&self) -> f64 {
        (self.total_mb - self.used_mb).max(0.0)
    }

    /// Account `mb` of captured content; fails without mutating when the
    /// remaining budget is too small
    pub fn consume(&mut self, mb: f64) -> Result<()> {
        if mb > self.remaining_mb() {
            return Err(Error::BudgetExceeded {
                requested_mb: mb,
                remaining_mb: self.remaining_mb(),
            });
        }
        self.used_mb += mb;
        Ok(())
    }

    /// Return `mb` to the budget (failed read after consume)
    pub fn restore(&mut self, mb: f64) {
        self.used_mb = (self.used_mb - mb).max(0.0);
    }
}

/// What a backup captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupType {
    File,
    DirectoryTree,
    None,
}

/// One entry of a captured directory tree
#[derive(Debug, Clone)]
pub struct BackupItem {
    pub rel_path: PathBuf,
    pub kind: FileKind,
    pub mode: u32,
    pub content: Option<Vec<u8>>,
    pub size: u64,
    pub mod_time: Option<DateTime<Utc>>,
}

/// Captured content backing an operation's reverse
#[derive(Debug, Clone)]
pub struct BackupData {
    pub operation_id: String,
    pub backup_type: BackupType,
    pub original_path: PathBuf,
    pub content: Option<Vec<u8>>,
    pub mode: u32,
    pub captured_at: DateTime<Utc>,
    pub size_mb: f64,
    /// Directory-tree entries, directories before files
    pub items: Vec<BackupItem>,
    /// Files left out because they exceeded the remaining budget
    pub skipped_files: usize,
    /// Target of a captured symlink
    pub symlink_target: Option<PathBuf>,
}

impl BackupData {
    fn empty(operation_id: &str, path: &Path) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            backup_type: BackupType::None,
            original_path: path.to_path_buf(),
            content: None,
            mode: 0,
            captured_at: Utc::now(),
            size_mb: 0.0,
            items: Vec::new(),
            skipped_files: 0,
            symlink_target: None,
        }
    }
}

fn reverse_item_id(operation_id: &str, n: usize) -> String {
    format!("reverse_{}_item_{}", operation_id, n)
}

/// Capture the content a delete would destroy and synthesize the
/// operations that would recreate it
///
/// Directories come back first (depth ascending), then files, so the
/// reverse ops recreate the tree with the captured modes intact.
pub(crate) fn synthesize_delete_reverse(
    operation_id: &str,
    path: &Path,
    fs: &dyn FullFs,
    budget: &mut BackupBudget,
) -> Result<(Vec<Operation>, BackupData)> {
    let Ok(meta) = fs.stat(path) else {
        // Deleting an absent path has nothing to reverse
        return Ok((Vec::new(), BackupData::empty(operation_id, path)));
    };

    match meta.kind {
        FileKind::File => {
            let mb = bytes_to_mb(meta.size);
            let mut backup = BackupData::empty(operation_id, path);
            if let Err(err) = budget.consume(mb) {
                warn!(
                    path = %path.display(),
                    size_mb = mb,
                    "file exceeds remaining backup budget, skipping"
                );
                backup.skipped_files = 1;
                debug!(error = %err, "backup skipped");
                return Ok((Vec::new(), backup));
            }
            let content = match fs.read(path) {
                Ok(content) => content,
                Err(err) => {
                    budget.restore(mb);
                    return Err(err);
                }
            };

            backup.backup_type = BackupType::File;
            backup.content = Some(content.clone());
            backup.mode = meta.mode;
            backup.size_mb = mb;

            let reverse = Operation::create_file(
                format!("reverse_{}", operation_id),
                path,
                content,
                meta.mode,
            );
            Ok((vec![reverse], backup))
        }

        FileKind::Symlink => {
            let target = fs.read_link(path)?;
            let mut backup = BackupData::empty(operation_id, path);
            backup.backup_type = BackupType::File;
            backup.mode = meta.mode;
            backup.symlink_target = Some(target.clone());

            let reverse =
                Operation::create_symlink(format!("reverse_{}", operation_id), path, target);
            Ok((vec![reverse], backup))
        }

        FileKind::Directory => synthesize_tree_reverse(operation_id, path, meta.mode, fs, budget),
    }
}

fn synthesize_tree_reverse(
    operation_id: &str,
    root: &Path,
    root_mode: u32,
    fs: &dyn FullFs,
    budget: &mut BackupBudget,
) -> Result<(Vec<Operation>, BackupData)> {
    let entries = walk(fs, root)?;

    let mut dirs: Vec<_> = entries
        .iter()
        .filter(|e| e.metadata.kind == FileKind::Directory)
        .collect();
    dirs.sort_by_key(|e| e.rel_path.components().count());
    let files: Vec<_> = entries
        .iter()
        .filter(|e| e.metadata.kind != FileKind::Directory)
        .collect();

    let mut backup = BackupData::empty(operation_id, root);
    backup.backup_type = BackupType::DirectoryTree;
    backup.mode = root_mode;

    let mut ops = Vec::new();
    let mut n = 0usize;

    // Root first, then subdirectories by depth
    ops.push(Operation::create_directory(
        reverse_item_id(operation_id, n),
        root,
        root_mode,
    ));
    n += 1;

    for dir in dirs {
        ops.push(Operation::create_directory(
            reverse_item_id(operation_id, n),
            root.join(&dir.rel_path),
            dir.metadata.mode,
        ));
        backup.items.push(BackupItem {
            rel_path: dir.rel_path.clone(),
            kind: FileKind::Directory,
            mode: dir.metadata.mode,
            content: None,
            size: 0,
            mod_time: dir.metadata.modified,
        });
        n += 1;
    }

    for file in files {
        let full = root.join(&file.rel_path);

        if file.metadata.kind == FileKind::Symlink {
            let target = fs.read_link(&full)?;
            ops.push(Operation::create_symlink(
                reverse_item_id(operation_id, n),
                &full,
                &target,
            ));
            backup.items.push(BackupItem {
                rel_path: file.rel_path.clone(),
                kind: FileKind::Symlink,
                mode: file.metadata.mode,
                content: None,
                size: 0,
                mod_time: file.metadata.modified,
            });
            n += 1;
            continue;
        }

        let mb = bytes_to_mb(file.metadata.size);
        if budget.consume(mb).is_err() {
            warn!(
                path = %full.display(),
                size_mb = mb,
                "file exceeds remaining backup budget, skipping"
            );
            backup.skipped_files += 1;
            continue;
        }
        let content = match fs.read(&full) {
            Ok(content) => content,
            Err(err) => {
                budget.restore(mb);
                return Err(err);
            }
        };
        backup.size_mb += mb;
        ops.push(Operation::create_file(
            reverse_item_id(operation_id, n),
            &full,
            content.clone(),
            file.metadata.mode,
        ));
        backup.items.push(BackupItem {
            rel_path: file.rel_path.clone(),
            kind: FileKind::File,
            mode: file.metadata.mode,
            content: Some(content),
            size: file.metadata.size,
            mod_time: file.metadata.modified,
        });
        n += 1;
    }

    Ok((ops, backup))
}
