// src/operation/transfer.rs

//! copy / move semantics
//!
//! Move tries a rename first and falls back to copy-then-remove when the
//! store refuses (cross-device on real filesystems). A failed
//! remove-source after the copy cleans up the destination so the
//! operation fails without leaving both ends behind.

use crate::checksum::ChecksumRecord;
use crate::error::Result;
use crate::fs::{walk, FileKind, FullFs, ProjectedFs};
use crate::path::store_key;
use std::path::Path;
use tracing::{debug, warn};

use super::create::ensure_parent;
use super::Operation;

pub(super) fn validate(op: &Operation, projection: &ProjectedFs<'_>) -> Result<()> {
    let src = op.require_src()?;
    let dst = op.require_dst()?;

    if !projection.exists(src) {
        return Err(op.invalid(format!("source does not exist: {}", src.display())));
    }
    if projection.exists(dst) {
        return Err(op.invalid(format!(
            "destination already exists: {}",
            dst.display()
        )));
    }

    // Parent may be absent (auto-created at execute); a non-directory in
    // the way is only worth a warning here
    if let Some(parent) = dst.parent()
        && !parent.as_os_str().is_empty()
        && let Some(kind) = projection.kind(parent)
        && kind != FileKind::Directory
    {
        warn!(
            destination = %dst.display(),
            parent = %parent.display(),
            "destination parent is not a directory"
        );
    }

    if projection.kind(src) == Some(FileKind::Directory)
        && let (Ok(src_key), Ok(dst_key)) = (store_key(src), store_key(dst))
        && dst_key.starts_with(&src_key)
    {
        return Err(op.invalid(format!(
            "cannot copy a directory into its own subtree: {} -> {}",
            src.display(),
            dst.display()
        )));
    }

    Ok(())
}

pub(super) fn execute_copy(op: &mut Operation, fs: &dyn FullFs) -> Result<()> {
    let src = op.require_src()?.to_path_buf();
    let dst = op.require_dst()?.to_path_buf();

    if let Some(record) = op.checksum_for(&src) {
        record.verify(fs)?;
    }

    let meta = fs.stat(&src)?;
    match meta.kind {
        FileKind::Directory => copy_tree(fs, &src, &dst),
        FileKind::Symlink => {
            let target = fs.read_link(&src)?;
            ensure_parent(fs, &dst)?;
            fs.symlink(&target, &dst)
        }
        FileKind::File => {
            let content = fs.read(&src)?;
            ensure_parent(fs, &dst)?;
            fs.write_file(&dst, &content, meta.mode)?;
            let record = ChecksumRecord::capture(fs, &dst)?;
            op.record_checksum(record);
            Ok(())
        }
    }
}

pub(super) fn execute_move(op: &mut Operation, fs: &dyn FullFs) -> Result<()> {
    let src = op.require_src()?.to_path_buf();
    let dst = op.require_dst()?.to_path_buf();

    if let Some(record) = op.checksum_for(&src) {
        record.verify(fs)?;
    }

    ensure_parent(fs, &dst)?;
    match fs.rename(&src, &dst) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(
                src = %src.display(),
                dst = %dst.display(),
                error = %rename_err,
                "rename failed, falling back to copy"
            );
            transfer_by_copy(fs, &src, &dst)?;
            if let Err(remove_err) = fs.remove_all(&src) {
                // Keep the source authoritative: drop the half-made copy
                let _ = fs.remove_all(&dst);
                return Err(remove_err);
            }
            Ok(())
        }
    }
}

pub(super) fn rollback_copy(op: &Operation, fs: &dyn FullFs) -> Result<()> {
    let dst = op.require_dst()?;
    fs.remove_all(dst)
}

pub(super) fn rollback_move(op: &Operation, fs: &dyn FullFs) -> Result<()> {
    let src = op.require_src()?.to_path_buf();
    let dst = op.require_dst()?.to_path_buf();

    if !fs.exists(&dst) {
        return Ok(());
    }
    ensure_parent(fs, &src)?;
    match fs.rename(&dst, &src) {
        Ok(()) => Ok(()),
        Err(_) => {
            transfer_by_copy(fs, &dst, &src)?;
            fs.remove_all(&dst)
        }
    }
}

fn transfer_by_copy(fs: &dyn FullFs, src: &Path, dst: &Path) -> Result<()> {
    let meta = fs.stat(src)?;
    match meta.kind {
        FileKind::Directory => copy_tree(fs, src, dst),
        FileKind::Symlink => {
            let target = fs.read_link(src)?;
            fs.symlink(&target, dst)
        }
        FileKind::File => {
            let content = fs.read(src)?;
            fs.write_file(dst, &content, meta.mode)
        }
    }
}

/// Recursive copy preserving modes
fn copy_tree(fs: &dyn FullFs, src: &Path, dst: &Path) -> Result<()> {
    let root_meta = fs.stat(src)?;
    fs.mkdir_all(dst, root_meta.mode)?;

    for entry in walk(fs, src)? {
        let from = src.join(&entry.rel_path);
        let to = dst.join(&entry.rel_path);
        match entry.metadata.kind {
            FileKind::Directory => fs.mkdir_all(&to, entry.metadata.mode)?,
            FileKind::File => {
                let content = fs.read(&from)?;
                fs.write_file(&to, &content, entry.metadata.mode)?;
            }
            FileKind::Symlink => {
                let target = fs.read_link(&from)?;
                fs.symlink(&target, &to)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{MemoryFs, ReadFs, StatFs, WriteFs};

    fn seeded() -> MemoryFs {
        let fs = MemoryFs::new();
        fs.write_file(Path::new("src.txt"), b"DATA", 0o640).unwrap();
        fs
    }

    #[test]
    fn test_validate_source_must_exist() {
        let fs = MemoryFs::new();
        let projection = ProjectedFs::new(&fs);
        let op = Operation::copy("op-1", "missing", "dst");
        assert!(op.validate(&projection).is_err());
    }

    #[test]
    fn test_validate_destination_must_be_absent() {
        let fs = seeded();
        fs.write_file(Path::new("dst.txt"), b"old", 0o644).unwrap();
        let projection = ProjectedFs::new(&fs);
        let op = Operation::copy("op-1", "src.txt", "dst.txt");
        assert!(op.validate(&projection).is_err());
    }

    #[test]
    fn test_validate_rejects_copy_into_own_subtree() {
        let fs = MemoryFs::new();
        fs.mkdir_all(Path::new("d"), 0o755).unwrap();
        let projection = ProjectedFs::new(&fs);
        let op = Operation::copy("op-1", "d", "d/inner");
        assert!(op.validate(&projection).is_err());
    }

    #[test]
    fn test_copy_file_preserves_mode_and_checksums() {
        let fs = seeded();
        let mut op = Operation::copy("op-1", "src.txt", "out/dst.txt");
        op.execute(&fs).unwrap();

        assert_eq!(fs.read(Path::new("out/dst.txt")).unwrap(), b"DATA");
        assert_eq!(fs.stat(Path::new("out/dst.txt")).unwrap().mode, 0o640);
        assert!(op.checksum_for(Path::new("out/dst.txt")).is_some());
        // Source untouched
        assert_eq!(fs.read(Path::new("src.txt")).unwrap(), b"DATA");
    }

    #[test]
    fn test_copy_verifies_stored_checksum() {
        let fs = seeded();
        let record = ChecksumRecord::capture(&fs, Path::new("src.txt")).unwrap();
        let mut op = Operation::copy("op-1", "src.txt", "dst.txt").with_checksum(record);

        fs.write_file(Path::new("src.txt"), b"DRIFTED", 0o640).unwrap();
        assert!(op.execute(&fs).is_err());
        assert!(!fs.exists(Path::new("dst.txt")));
    }

    #[test]
    fn test_copy_directory_recursive() {
        let fs = MemoryFs::new();
        fs.mkdir_all(Path::new("tree/sub"), 0o750).unwrap();
        fs.write_file(Path::new("tree/a"), b"a", 0o600).unwrap();
        fs.write_file(Path::new("tree/sub/b"), b"b", 0o644).unwrap();

        let mut op = Operation::copy("op-1", "tree", "copy");
        op.execute(&fs).unwrap();

        assert_eq!(fs.read(Path::new("copy/a")).unwrap(), b"a");
        assert_eq!(fs.read(Path::new("copy/sub/b")).unwrap(), b"b");
        assert_eq!(fs.stat(Path::new("copy/sub")).unwrap().mode, 0o750);
        assert_eq!(fs.stat(Path::new("copy/a")).unwrap().mode, 0o600);
    }

    #[test]
    fn test_move_file() {
        let fs = seeded();
        let mut op = Operation::move_op("op-1", "src.txt", "out/moved.txt");
        op.execute(&fs).unwrap();

        assert!(!fs.exists(Path::new("src.txt")));
        assert_eq!(fs.read(Path::new("out/moved.txt")).unwrap(), b"DATA");
    }

    #[test]
    fn test_move_rollback_moves_back() {
        let fs = seeded();
        let mut op = Operation::move_op("op-1", "src.txt", "out/moved.txt");
        op.execute(&fs).unwrap();
        op.rollback(&fs).unwrap();

        assert_eq!(fs.read(Path::new("src.txt")).unwrap(), b"DATA");
        assert!(!fs.exists(Path::new("out/moved.txt")));
    }

    #[test]
    fn test_copy_rollback_removes_destination() {
        let fs = seeded();
        let mut op = Operation::copy("op-1", "src.txt", "dst.txt");
        op.execute(&fs).unwrap();
        op.rollback(&fs).unwrap();

        assert!(!fs.exists(Path::new("dst.txt")));
        assert_eq!(fs.read(Path::new("src.txt")).unwrap(), b"DATA");
    }
}
