// src/prereq.rs

//! Prerequisite declarations and resolution
//!
//! Each operation declares the runtime conditions it needs. A resolver
//! can synthesize operations to satisfy prerequisites it knows about;
//! the shipped resolver handles parent-directory creation. Everything
//! else is check-only and enforced by validation.

use crate::error::Result;
use crate::fs::{FileKind, StatFs};
use crate::item::DEFAULT_DIR_MODE;
use crate::operation::Operation;
use std::path::{Path, PathBuf};

/// A runtime condition an operation declares as required
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite {
    /// The parent of `path` must be an existing directory at execute time
    ParentDir { path: PathBuf },
    /// No conflicting entry may exist at `path` at execute time
    ///
    /// With `allow_directory` set, an existing directory satisfies the
    /// prerequisite (idempotent creation); otherwise any entry conflicts.
    NoConflict { path: PathBuf, allow_directory: bool },
    /// A filesystem entry must exist at `path`
    SourceExists { path: PathBuf },
}

impl Prerequisite {
    pub fn parent_dir(path: impl Into<PathBuf>) -> Self {
        Self::ParentDir { path: path.into() }
    }

    pub fn no_conflict(path: impl Into<PathBuf>, allow_directory: bool) -> Self {
        Self::NoConflict {
            path: path.into(),
            allow_directory,
        }
    }

    pub fn source_exists(path: impl Into<PathBuf>) -> Self {
        Self::SourceExists { path: path.into() }
    }

    /// The path this prerequisite is about
    pub fn path(&self) -> &Path {
        match self {
            Self::ParentDir { path }
            | Self::NoConflict { path, .. }
            | Self::SourceExists { path } => path,
        }
    }

    /// Whether the prerequisite is satisfied in the given view
    pub fn is_satisfied(&self, fs: &dyn StatFs) -> bool {
        match self {
            Self::ParentDir { path } => match parent_of(path) {
                None => true,
                Some(parent) => fs
                    .stat(&parent)
                    .map(|meta| meta.kind == FileKind::Directory)
                    .unwrap_or(false),
            },
            Self::NoConflict {
                path,
                allow_directory,
            } => match fs.stat(path) {
                Err(_) => true,
                Ok(meta) => *allow_directory && meta.kind == FileKind::Directory,
            },
            Self::SourceExists { path } => fs.exists(path),
        }
    }
}

/// Parent of `path`, or None when there is nothing to create
fn parent_of(path: &Path) -> Option<PathBuf> {
    let parent = path.parent()?;
    if parent.as_os_str().is_empty() || parent == Path::new("/") || parent == Path::new(".") {
        return None;
    }
    Some(parent.to_path_buf())
}

/// Maps a prerequisite to the operations that would satisfy it
pub trait PrereqResolver {
    /// Synthesize operations for a prerequisite this resolver handles;
    /// empty means check-only
    fn resolve(&self, prereq: &Prerequisite) -> Result<Vec<Operation>>;
}

/// Deterministic id for an operation synthesized for `path`
pub(crate) fn synthesized_id(path: &Path) -> String {
    let flat = path.to_string_lossy().replace(['/', '\\'], "_");
    format!("prereq_mkdir_{}", flat)
}

/// The shipped resolver: satisfies `parent_dir` with directory creation
#[derive(Debug, Default)]
pub struct ParentDirResolver;

impl PrereqResolver for ParentDirResolver {
    fn resolve(&self, prereq: &Prerequisite) -> Result<Vec<Operation>> {
        let Prerequisite::ParentDir { path } = prereq else {
            return Ok(Vec::new());
        };
        let Some(parent) = parent_of(path) else {
            return Ok(Vec::new());
        };
        let op = Operation::create_directory(synthesized_id(&parent), &parent, DEFAULT_DIR_MODE);
        Ok(vec![op])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{MemoryFs, WriteFs};

    #[test]
    fn test_parent_dir_satisfied() {
        let fs = MemoryFs::new();
        fs.mkdir_all(Path::new("a"), 0o755).unwrap();

        assert!(Prerequisite::parent_dir("a/f.txt").is_satisfied(&fs));
        assert!(!Prerequisite::parent_dir("b/f.txt").is_satisfied(&fs));
        // Top-level entries have nothing to create
        assert!(Prerequisite::parent_dir("f.txt").is_satisfied(&fs));
    }

    #[test]
    fn test_parent_dir_file_in_the_way() {
        let fs = MemoryFs::new();
        fs.write_file(Path::new("a"), b"x", 0o644).unwrap();
        assert!(!Prerequisite::parent_dir("a/f.txt").is_satisfied(&fs));
    }

    #[test]
    fn test_no_conflict() {
        let fs = MemoryFs::new();
        fs.mkdir_all(Path::new("d"), 0o755).unwrap();
        fs.write_file(Path::new("f"), b"x", 0o644).unwrap();

        assert!(Prerequisite::no_conflict("absent", false).is_satisfied(&fs));
        assert!(Prerequisite::no_conflict("d", true).is_satisfied(&fs));
        assert!(!Prerequisite::no_conflict("d", false).is_satisfied(&fs));
        assert!(!Prerequisite::no_conflict("f", true).is_satisfied(&fs));
    }

    #[test]
    fn test_source_exists() {
        let fs = MemoryFs::new();
        fs.write_file(Path::new("src"), b"x", 0o644).unwrap();
        assert!(Prerequisite::source_exists("src").is_satisfied(&fs));
        assert!(!Prerequisite::source_exists("missing").is_satisfied(&fs));
    }

    #[test]
    fn test_resolver_synthesizes_parent_mkdir() {
        let resolver = ParentDirResolver;
        let ops = resolver
            .resolve(&Prerequisite::parent_dir("a/b/f.txt"))
            .unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].id(), "prereq_mkdir_a_b");
        assert_eq!(ops[0].path(), Path::new("a/b"));
    }

    #[test]
    fn test_resolver_skips_rootish_parents() {
        let resolver = ParentDirResolver;
        assert!(resolver
            .resolve(&Prerequisite::parent_dir("f.txt"))
            .unwrap()
            .is_empty());
        assert!(resolver
            .resolve(&Prerequisite::parent_dir("/f.txt"))
            .unwrap()
            .is_empty());
        assert!(resolver
            .resolve(&Prerequisite::no_conflict("x", false))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_synthesized_ids_deterministic() {
        assert_eq!(
            synthesized_id(Path::new("a/b")),
            synthesized_id(Path::new("a/b"))
        );
    }
}
