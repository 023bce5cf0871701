// src/fs/mod.rs

//! Filesystem capability interfaces
//!
//! Four small capability sets compose into larger ones so strict-read-only
//! and full-write implementations satisfy the operation contracts without
//! one fat interface of optional methods:
//!
//! - [`ReadFs`]: read file bytes, list directories
//! - [`StatFs`]: metadata lookup
//! - [`WriteFs`]: mutate entries
//! - [`FullFs`]: the union, provided by a blanket impl
//!
//! Two implementations ship: [`OsFs`] (rooted on a real directory, every
//! path validated against the sandbox) and [`MemoryFs`] (a map-backed
//! store for tests and dry planning). Both accept paths with or without a
//! leading separator and normalize them to the same key.
//!
//! # Semantic rules
//!
//! - `mkdir_all` is idempotent on existing directories and fails on an
//!   existing non-directory.
//! - `write_file` creates or overwrites.
//! - `remove` fails on non-empty directories; `remove_all` is recursive
//!   and does not error on absent paths.
//! - `symlink` fails if the link path exists; the target need not exist
//!   (dangling links are legal in both implementations).
//! - `rename` overwrites an existing regular file at the destination but
//!   never a directory.

mod memory;
mod os;
mod projected;

pub use memory::MemoryFs;
pub use os::OsFs;
pub use projected::{PathState, ProjectedFs};

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Kind of filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    File,
    Directory,
    Symlink,
}

impl FileKind {
    /// Short name used in messages and backup metadata
    pub fn name(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Symlink => "symlink",
        }
    }
}

/// Metadata for a filesystem entry
///
/// `stat` does not follow symlinks; a symlink reports its own kind and the
/// target length as its size.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub kind: FileKind,
    pub size: u64,
    pub mode: u32,
    pub modified: Option<DateTime<Utc>>,
}

impl Metadata {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}

/// A single directory listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: FileKind,
}

/// Read capability: file bytes and directory listings
pub trait ReadFs {
    /// Read the full contents of a file
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// List a directory, sorted by name
    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;
}

/// Stat capability: metadata lookup without following symlinks
pub trait StatFs {
    /// Look up metadata for a path
    fn stat(&self, path: &Path) -> Result<Metadata>;

    /// Whether any entry exists at the path
    fn exists(&self, path: &Path) -> bool {
        self.stat(path).is_ok()
    }
}

/// Write capability: all mutating calls
pub trait WriteFs {
    /// Create or overwrite a file with the given bytes and mode
    fn write_file(&self, path: &Path, data: &[u8], mode: u32) -> Result<()>;

    /// Create a directory and any missing ancestors
    fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()>;

    /// Remove a file, symlink, or empty directory
    fn remove(&self, path: &Path) -> Result<()>;

    /// Remove a path recursively; absent paths are not an error
    fn remove_all(&self, path: &Path) -> Result<()>;

    /// Create a symlink at `link` pointing at `target`
    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;

    /// Read the target of a symlink
    fn read_link(&self, path: &Path) -> Result<PathBuf>;

    /// Rename an entry, overwriting a regular file at the destination
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}

/// Full capability set
pub trait FullFs: ReadFs + StatFs + WriteFs {}

impl<T: ReadFs + StatFs + WriteFs + ?Sized> FullFs for T {}

/// One entry produced by [`walk`]
#[derive(Debug, Clone)]
pub struct WalkEntry {
    /// Path relative to the walk root
    pub rel_path: PathBuf,
    pub metadata: Metadata,
}

/// Recursively walk a directory through the capability traits
///
/// Entries come back in pre-order: each directory before its contents,
/// children sorted by name. The root itself is not included.
pub fn walk(fs: &dyn FullFs, root: &Path) -> Result<Vec<WalkEntry>> {
    let mut entries = Vec::new();
    walk_into(fs, root, Path::new(""), &mut entries)?;
    Ok(entries)
}

fn walk_into(
    fs: &dyn FullFs,
    root: &Path,
    rel: &Path,
    out: &mut Vec<WalkEntry>,
) -> Result<()> {
    let dir = root.join(rel);
    for entry in fs.read_dir(&dir)? {
        let child_rel = rel.join(&entry.name);
        let metadata = fs.stat(&root.join(&child_rel))?;
        let is_dir = metadata.is_dir();
        out.push(WalkEntry {
            rel_path: child_rel.clone(),
            metadata,
        });
        if is_dir {
            walk_into(fs, root, &child_rel, out)?;
        }
    }
    Ok(())
}
