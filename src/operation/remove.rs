// src/operation/remove.rs

//! delete semantics
//!
//! Delete is idempotent: validation always accepts and a missing path at
//! execute time is not an error. There is no trivial inverse; only a
//! captured backup yields a real reverse.

use crate::error::Result;
use crate::fs::{FileKind, FullFs};
use tracing::debug;

use super::Operation;

pub(super) fn validate(_op: &Operation) -> Result<()> {
    Ok(())
}

pub(super) fn execute(op: &mut Operation, fs: &dyn FullFs) -> Result<()> {
    let path = op.path().to_path_buf();
    match fs.stat(&path) {
        Err(_) => {
            debug!(path = %path.display(), "delete of absent path is a no-op");
            Ok(())
        }
        Ok(meta) if meta.kind == FileKind::Directory => fs.remove_all(&path),
        Ok(_) => fs.remove(&path),
    }
}

pub(super) fn rollback(op: &Operation) -> Result<()> {
    Err(op.invalid("delete cannot be rolled back without a captured backup"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{MemoryFs, StatFs, WriteFs};
    use std::path::Path;

    #[test]
    fn test_delete_file() {
        let fs = MemoryFs::new();
        fs.write_file(Path::new("f"), b"x", 0o644).unwrap();
        let mut op = Operation::delete("op-1", "f");
        op.execute(&fs).unwrap();
        assert!(!fs.exists(Path::new("f")));
    }

    #[test]
    fn test_delete_directory_recursive() {
        let fs = MemoryFs::new();
        fs.mkdir_all(Path::new("d/sub"), 0o755).unwrap();
        fs.write_file(Path::new("d/sub/f"), b"x", 0o644).unwrap();
        let mut op = Operation::delete("op-1", "d");
        op.execute(&fs).unwrap();
        assert!(fs.is_empty());
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let fs = MemoryFs::new();
        let mut op = Operation::delete("op-1", "missing");
        op.execute(&fs).unwrap();
        op.execute(&fs).unwrap();
    }

    #[test]
    fn test_delete_rollback_requires_backup() {
        let fs = MemoryFs::new();
        let op = Operation::delete("op-1", "f");
        assert!(op.rollback(&fs).is_err());
    }
}
