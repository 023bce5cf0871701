// src/operation/archive_ops.rs

//! create_archive / unarchive semantics
//!
//! Format handling is delegated to the archive codecs; these operations
//! validate sources, place the produced bytes, and record what an
//! extraction wrote so it can be reversed.

use crate::archive;
use crate::checksum::ChecksumRecord;
use crate::error::{Error, Result};
use crate::fs::{FileKind, FullFs, ProjectedFs};
use crate::item::{FsItem, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};
use serde_json::Value;
use std::path::PathBuf;
use tracing::warn;

use super::create::ensure_parent;
use super::Operation;

const EXTRACTED_DETAIL: &str = "extracted_paths";

pub(super) fn validate(op: &Operation, projection: &ProjectedFs<'_>) -> Result<()> {
    match op.item() {
        Some(FsItem::Archive { sources, .. }) => {
            if sources.is_empty() {
                return Err(op.invalid("archive has no sources"));
            }
            for source in sources {
                if !projection.exists(source) {
                    return Err(op.invalid(format!(
                        "archive source does not exist: {}",
                        source.display()
                    )));
                }
            }
            if let Some(parent) = op.path().parent()
                && !parent.as_os_str().is_empty()
                && let Some(kind) = projection.kind(parent)
                && kind != FileKind::Directory
            {
                warn!(
                    archive = %op.path().display(),
                    parent = %parent.display(),
                    "archive parent is not a directory"
                );
            }
            Ok(())
        }

        Some(FsItem::Unarchive {
            archive_path,
            extract_path,
            ..
        }) => {
            if extract_path.as_os_str().is_empty() {
                return Err(op.invalid("empty extract path"));
            }
            if !projection.exists(archive_path) {
                return Err(op.invalid(format!(
                    "archive does not exist: {}",
                    archive_path.display()
                )));
            }
            archive::detect_format(archive_path).map_err(|err| op.invalid(err.to_string()))?;
            Ok(())
        }

        _ => Err(op.invalid("missing archive item payload")),
    }
}

pub(super) fn execute_create(op: &mut Operation, fs: &dyn FullFs) -> Result<()> {
    let Some(FsItem::Archive {
        format, sources, ..
    }) = op.item().cloned()
    else {
        return Err(op.invalid("missing archive item payload"));
    };

    let data = archive::create(fs, format, &sources)?;
    ensure_parent(fs, op.path())?;
    fs.write_file(op.path(), &data, DEFAULT_FILE_MODE)?;

    let record = ChecksumRecord::capture(fs, op.path())?;
    op.record_checksum(record);
    Ok(())
}

pub(super) fn execute_unarchive(op: &mut Operation, fs: &dyn FullFs) -> Result<()> {
    let Some(FsItem::Unarchive {
        archive_path,
        extract_path,
        patterns,
        overwrite,
    }) = op.item().cloned()
    else {
        return Err(op.invalid("missing unarchive item payload"));
    };

    let format = archive::detect_format(&archive_path)?;
    let data = fs.read(&archive_path)?;
    fs.mkdir_all(&extract_path, DEFAULT_DIR_MODE)?;

    let extracted = archive::extract(fs, format, &data, &extract_path, &patterns, overwrite)?;
    op.set_detail(
        EXTRACTED_DETAIL,
        Value::from(
            extracted
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>(),
        ),
    );
    Ok(())
}

pub(super) fn rollback_create(op: &Operation, fs: &dyn FullFs) -> Result<()> {
    match fs.remove(op.path()) {
        Ok(()) | Err(Error::NotFound(_)) => Ok(()),
        Err(err) => Err(err),
    }
}

pub(super) fn rollback_unarchive(op: &Operation, fs: &dyn FullFs) -> Result<()> {
    for path in extracted_paths(op).iter().rev() {
        fs.remove_all(path)?;
    }
    Ok(())
}

/// Reverse of an extraction: delete what it wrote, files before their
/// directories
pub(super) fn reverse_unarchive(op: &Operation) -> Vec<Operation> {
    extracted_paths(op)
        .iter()
        .rev()
        .enumerate()
        .map(|(n, path)| Operation::delete(format!("reverse_{}_item_{}", op.id(), n), path))
        .collect()
}

fn extracted_paths(op: &Operation) -> Vec<PathBuf> {
    op.detail(EXTRACTED_DETAIL)
        .and_then(|value| value.as_array())
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.as_str().map(PathBuf::from))
                .collect()
        })
        .unwrap_or_default()
}
