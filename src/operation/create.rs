// src/operation/create.rs

//! create_file / create_directory / create_symlink semantics

use crate::checksum::ChecksumRecord;
use crate::error::{Error, Result};
use crate::fs::{FileKind, FullFs, ProjectedFs};
use crate::item::{FsItem, DEFAULT_DIR_MODE};
use crate::path::resolve_store_symlink_target;
use std::path::Path;
use tracing::debug;

use super::{OpKind, Operation};

pub(super) fn validate(op: &Operation, projection: &ProjectedFs<'_>) -> Result<()> {
    if op.path().as_os_str().is_empty() {
        return Err(op.invalid("empty path"));
    }

    match op.kind() {
        OpKind::CreateFile => {
            let Some(FsItem::File { .. }) = op.item() else {
                return Err(op.invalid("item is not a file"));
            };
            // An existing directory is tolerated here; anything else is a
            // conflict the caller must delete first
            if let Some(kind) = projection.kind(op.path())
                && kind != FileKind::Directory
            {
                return Err(op.invalid(format!(
                    "a {} already exists at {}",
                    kind.name(),
                    op.path().display()
                )));
            }
            Ok(())
        }

        OpKind::CreateDirectory => {
            let Some(FsItem::Directory { .. }) = op.item() else {
                return Err(op.invalid("item is not a directory"));
            };
            // Creation is idempotent; a file in the way surfaces when
            // mkdir runs
            Ok(())
        }

        OpKind::CreateSymlink => {
            let Some(FsItem::Symlink { target, .. }) = op.item() else {
                return Err(op.invalid("item is not a symlink"));
            };
            if target.as_os_str().is_empty() {
                return Err(op.invalid("empty symlink target"));
            }
            if projection.exists(op.path()) {
                return Err(op.invalid(format!(
                    "link path already exists: {}",
                    op.path().display()
                )));
            }
            // Dangling targets are legal, but escaping ones are not
            resolve_store_symlink_target(op.path(), target)
                .map_err(|err| op.invalid(err.to_string()))?;
            Ok(())
        }

        _ => unreachable!("create dispatch"),
    }
}

pub(super) fn execute(op: &mut Operation, fs: &dyn FullFs) -> Result<()> {
    match op.item().cloned() {
        Some(FsItem::File { content, mode, .. }) => {
            ensure_parent(fs, op.path())?;
            fs.write_file(op.path(), &content, mode)?;
            let record = ChecksumRecord::capture(fs, op.path())?;
            debug!(path = %op.path().display(), md5 = %record.md5, "created file");
            op.record_checksum(record);
            Ok(())
        }
        Some(FsItem::Directory { mode, .. }) => fs.mkdir_all(op.path(), mode),
        Some(FsItem::Symlink { target, .. }) => {
            ensure_parent(fs, op.path())?;
            resolve_store_symlink_target(op.path(), &target)?;
            fs.symlink(&target, op.path())
        }
        _ => Err(op.invalid("missing item payload")),
    }
}

pub(super) fn rollback(op: &Operation, fs: &dyn FullFs) -> Result<()> {
    match fs.remove(op.path()) {
        Ok(()) | Err(Error::NotFound(_)) => Ok(()),
        Err(err) => Err(err),
    }
}

/// Auto-create missing ancestors with the default directory mode
pub(super) fn ensure_parent(fs: &dyn FullFs, path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && parent != Path::new("/") => {
            fs.mkdir_all(parent, DEFAULT_DIR_MODE)
        }
        _ => Ok(()),
    }
}
