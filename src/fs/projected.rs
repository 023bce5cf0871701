// src/fs/projected.rs

//! Projected filesystem overlay
//!
//! Wraps an underlying filesystem and layers a mutable projection of the
//! effects pending operations will have. Lookups consult the projection
//! first and fall through on miss, so the i-th operation in a batch
//! validates against the state operations 0..i-1 will leave behind,
//! including the ancestor directories execute auto-creates.
//!
//! A deleted directory leaves a tombstone: paths below it read as absent
//! even when the underlying filesystem still has them.

use crate::error::{Error, Result};
use crate::item::FsItem;
use crate::operation::{OpKind, Operation};
use crate::path::store_key;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{FileKind, FullFs, Metadata, StatFs};

/// Projected state of one path
#[derive(Debug, Clone, PartialEq)]
pub enum PathState {
    Absent,
    File { mode: u32, size: u64 },
    Directory { mode: u32 },
    Symlink,
}

impl PathState {
    /// Kind of entry this state projects, if present
    pub fn kind(&self) -> Option<FileKind> {
        match self {
            Self::Absent => None,
            Self::File { .. } => Some(FileKind::File),
            Self::Directory { .. } => Some(FileKind::Directory),
            Self::Symlink => Some(FileKind::Symlink),
        }
    }
}

/// Read-through overlay applying pending operations' intended effects
pub struct ProjectedFs<'a> {
    inner: &'a dyn FullFs,
    states: HashMap<PathBuf, PathState>,
}

impl<'a> ProjectedFs<'a> {
    pub fn new(inner: &'a dyn FullFs) -> Self {
        Self {
            inner,
            states: HashMap::new(),
        }
    }

    /// The wrapped filesystem
    pub fn inner(&self) -> &'a dyn FullFs {
        self.inner
    }

    /// Number of paths the projection has touched
    pub fn touched(&self) -> usize {
        self.states.len()
    }

    /// Kind of entry at `path`, consulting the projection first
    pub fn kind(&self, path: &Path) -> Option<FileKind> {
        let key = store_key(path).ok()?;
        if let Some(state) = self.states.get(&key) {
            return state.kind();
        }
        if self.tombstoned(&key) {
            return None;
        }
        self.inner.stat(&key).ok().map(|meta| meta.kind)
    }

    /// Whether any entry exists at `path` in the projected view
    pub fn exists(&self, path: &Path) -> bool {
        self.kind(path).is_some()
    }

    /// True when some ancestor of `key` was projected absent
    fn tombstoned(&self, key: &Path) -> bool {
        let mut current = key.parent();
        while let Some(ancestor) = current {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            if matches!(self.states.get(ancestor), Some(PathState::Absent)) {
                return true;
            }
            current = ancestor.parent();
        }
        false
    }

    fn mark(&mut self, path: &Path, state: PathState) {
        if let Ok(key) = store_key(path) {
            self.states.insert(key, state);
        }
    }

    /// Project every missing ancestor of `path` as a 0755 directory
    fn mark_ancestors(&mut self, path: &Path) {
        let Ok(key) = store_key(path) else { return };
        let mut current = key.parent();
        while let Some(ancestor) = current {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.states
                .entry(ancestor.to_path_buf())
                .or_insert(PathState::Directory { mode: 0o755 });
            current = ancestor.parent();
        }
    }

    fn mark_absent_with_descendants(&mut self, path: &Path) {
        let Ok(key) = store_key(path) else { return };
        let descendants: Vec<PathBuf> = self
            .states
            .keys()
            .filter(|candidate| candidate.starts_with(&key) && *candidate != &key)
            .cloned()
            .collect();
        for descendant in descendants {
            self.states.insert(descendant, PathState::Absent);
        }
        self.states.insert(key, PathState::Absent);
    }

    /// Apply an operation's intended effect to the projection
    pub fn update_state(&mut self, op: &Operation) {
        match op.kind() {
            OpKind::CreateFile => {
                let (mode, size) = match op.item() {
                    Some(FsItem::File { content, mode, .. }) => (*mode, content.len() as u64),
                    _ => (0o644, 0),
                };
                self.mark_ancestors(op.path());
                self.mark(op.path(), PathState::File { mode, size });
            }
            OpKind::CreateDirectory => {
                let mode = match op.item() {
                    Some(FsItem::Directory { mode, .. }) => *mode,
                    _ => 0o755,
                };
                self.mark_ancestors(op.path());
                self.mark(op.path(), PathState::Directory { mode });
            }
            OpKind::CreateSymlink => {
                self.mark_ancestors(op.path());
                self.mark(op.path(), PathState::Symlink);
            }
            OpKind::Delete => {
                self.mark_absent_with_descendants(op.path());
            }
            OpKind::Copy => {
                if let (Some(src), Some(dst)) = (op.src_path(), op.dst_path()) {
                    let state = self.state_of(src);
                    self.mark_ancestors(dst);
                    self.mark(dst, state);
                }
            }
            OpKind::Move => {
                if let (Some(src), Some(dst)) = (op.src_path(), op.dst_path()) {
                    let state = self.state_of(src);
                    self.mark_ancestors(dst);
                    self.mark(dst, state);
                    self.mark_absent_with_descendants(src);
                }
            }
            OpKind::CreateArchive => {
                self.mark_ancestors(op.path());
                self.mark(op.path(), PathState::File { mode: 0o644, size: 0 });
            }
            OpKind::Unarchive => {
                if let Some(FsItem::Unarchive { extract_path, .. }) = op.item() {
                    self.mark_ancestors(extract_path);
                    self.mark(extract_path, PathState::Directory { mode: 0o755 });
                }
            }
            OpKind::Custom => {
                // Custom effects are opaque to the projection
            }
        }
    }

    /// Projected state of `path`, falling through to the underlying store
    fn state_of(&self, path: &Path) -> PathState {
        let Ok(key) = store_key(path) else {
            return PathState::Absent;
        };
        if let Some(state) = self.states.get(&key) {
            return state.clone();
        }
        if self.tombstoned(&key) {
            return PathState::Absent;
        }
        match self.inner.stat(&key) {
            Ok(meta) => match meta.kind {
                FileKind::File => PathState::File {
                    mode: meta.mode,
                    size: meta.size,
                },
                FileKind::Directory => PathState::Directory { mode: meta.mode },
                FileKind::Symlink => PathState::Symlink,
            },
            Err(_) => PathState::Absent,
        }
    }
}

impl StatFs for ProjectedFs<'_> {
    fn stat(&self, path: &Path) -> Result<Metadata> {
        match self.state_of(path) {
            PathState::Absent => Err(Error::NotFound(path.to_path_buf())),
            PathState::File { mode, size } => Ok(Metadata {
                kind: FileKind::File,
                size,
                mode,
                modified: None,
            }),
            PathState::Directory { mode } => Ok(Metadata {
                kind: FileKind::Directory,
                size: 0,
                mode,
                modified: None,
            }),
            PathState::Symlink => Ok(Metadata {
                kind: FileKind::Symlink,
                size: 0,
                mode: 0o777,
                modified: None,
            }),
        }
    }
}
