// src/operation/mod.rs

//! Operation model
//!
//! An [`Operation`] is a declarative description of one filesystem
//! mutation: common metadata (id, kind, path, free-form details,
//! source/destination, dependencies, checksums, payload) plus per-kind
//! validate/execute/rollback/reverse behavior.
//!
//! The kind set is closed, so dispatch is a plain `match` over
//! [`OpKind`]; no reflection, no adapter seams. Operations are mutated
//! only before they join a pipeline; execution may record results back
//! into the operation (captured checksums, custom-op output, extracted
//! entry lists).

mod archive_ops;
mod create;
mod custom;
mod remove;
mod transfer;

pub use custom::CustomCallbacks;

use crate::backup::{BackupBudget, BackupData};
use crate::checksum::ChecksumRecord;
use crate::error::{Error, Result};
use crate::fs::{FullFs, ProjectedFs};
use crate::item::{ArchiveFormat, FsItem};
use crate::prereq::Prerequisite;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumString};

/// The closed set of operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum OpKind {
    #[strum(serialize = "create_file")]
    CreateFile,
    #[strum(serialize = "create_directory")]
    CreateDirectory,
    #[strum(serialize = "create_symlink")]
    CreateSymlink,
    #[strum(serialize = "copy")]
    Copy,
    #[strum(serialize = "move")]
    Move,
    #[strum(serialize = "delete")]
    Delete,
    #[strum(serialize = "create_archive")]
    CreateArchive,
    #[strum(serialize = "unarchive")]
    Unarchive,
    #[strum(serialize = "custom")]
    Custom,
}

/// Kind + canonical path + free-form parameters
#[derive(Debug, Clone)]
pub struct OperationDesc {
    pub kind: OpKind,
    pub path: PathBuf,
    pub details: Map<String, Value>,
}

/// A declarative filesystem mutation
#[derive(Debug, Clone)]
pub struct Operation {
    id: String,
    desc: OperationDesc,
    item: Option<FsItem>,
    src_path: Option<PathBuf>,
    dst_path: Option<PathBuf>,
    dependencies: Vec<String>,
    conflicts: Vec<String>,
    checksums: HashMap<PathBuf, ChecksumRecord>,
    custom: Option<CustomCallbacks>,
}

impl Operation {
    /// Build a bare operation; prefer the kind-specific constructors
    pub fn new(id: impl Into<String>, kind: OpKind, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            desc: OperationDesc {
                kind,
                path: path.into(),
                details: Map::new(),
            },
            item: None,
            src_path: None,
            dst_path: None,
            dependencies: Vec::new(),
            conflicts: Vec::new(),
            checksums: HashMap::new(),
            custom: None,
        }
    }

    pub fn create_file(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        content: Vec<u8>,
        mode: u32,
    ) -> Self {
        let path = path.into();
        let item = FsItem::file(path.clone(), content, mode);
        let mut op = Self::new(id, OpKind::CreateFile, path);
        if let FsItem::File { content, mode, .. } = &item {
            op.set_detail("content_length", Value::from(content.len()));
            op.set_detail("mode", Value::from(format!("{:o}", mode)));
        }
        op.item = Some(item);
        op
    }

    pub fn create_directory(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        mode: u32,
    ) -> Self {
        let path = path.into();
        let item = FsItem::directory(path.clone(), mode);
        let mut op = Self::new(id, OpKind::CreateDirectory, path);
        if let FsItem::Directory { mode, .. } = &item {
            op.set_detail("mode", Value::from(format!("{:o}", mode)));
        }
        op.item = Some(item);
        op
    }

    pub fn create_symlink(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
    ) -> Self {
        let path = path.into();
        let target = target.into();
        let mut op = Self::new(id, OpKind::CreateSymlink, path.clone());
        op.set_detail("target", Value::from(target.display().to_string()));
        op.item = Some(FsItem::symlink(path, target));
        op
    }

    pub fn copy(
        id: impl Into<String>,
        src: impl Into<PathBuf>,
        dst: impl Into<PathBuf>,
    ) -> Self {
        let src = src.into();
        let dst = dst.into();
        let mut op = Self::new(id, OpKind::Copy, src.clone());
        op.set_detail("source", Value::from(src.display().to_string()));
        op.set_detail("destination", Value::from(dst.display().to_string()));
        op.src_path = Some(src);
        op.dst_path = Some(dst);
        op
    }

    pub fn move_op(
        id: impl Into<String>,
        src: impl Into<PathBuf>,
        dst: impl Into<PathBuf>,
    ) -> Self {
        let src = src.into();
        let dst = dst.into();
        let mut op = Self::new(id, OpKind::Move, src.clone());
        op.set_detail("source", Value::from(src.display().to_string()));
        op.set_detail("destination", Value::from(dst.display().to_string()));
        op.src_path = Some(src);
        op.dst_path = Some(dst);
        op
    }

    pub fn delete(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::new(id, OpKind::Delete, path)
    }

    pub fn create_archive(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        format: ArchiveFormat,
        sources: Vec<PathBuf>,
    ) -> Self {
        let path = path.into();
        let mut op = Self::new(id, OpKind::CreateArchive, path.clone());
        op.set_detail("format", Value::from(format.to_string()));
        op.set_detail(
            "sources",
            Value::from(
                sources
                    .iter()
                    .map(|s| s.display().to_string())
                    .collect::<Vec<_>>(),
            ),
        );
        op.item = Some(FsItem::archive(path, format, sources));
        op
    }

    /// Build an unarchive operation from an [`FsItem::Unarchive`] payload
    pub fn unarchive(id: impl Into<String>, item: FsItem) -> Self {
        let (archive_path, extract_path, patterns, overwrite) = match &item {
            FsItem::Unarchive {
                archive_path,
                extract_path,
                patterns,
                overwrite,
            } => (
                archive_path.clone(),
                extract_path.clone(),
                patterns.clone(),
                *overwrite,
            ),
            other => (
                other.path().to_path_buf(),
                PathBuf::new(),
                Vec::new(),
                false,
            ),
        };
        let mut op = Self::new(id, OpKind::Unarchive, archive_path);
        op.set_detail(
            "extract_path",
            Value::from(extract_path.display().to_string()),
        );
        if !patterns.is_empty() {
            op.set_detail("patterns", Value::from(patterns));
        }
        op.set_detail("overwrite", Value::from(overwrite));
        op.item = Some(item);
        op
    }

    /// Build a custom operation around caller-supplied callbacks
    pub fn custom(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        callbacks: CustomCallbacks,
    ) -> Self {
        let mut op = Self::new(id, OpKind::Custom, path);
        op.custom = Some(callbacks);
        op
    }

    /// Generate an id for `kind` and `path` with the process-wide
    /// generator
    pub fn generated_id(kind: OpKind, path: &Path) -> String {
        crate::id::generate_id(&kind.to_string(), path)
    }

    // --- accessors ---

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> OpKind {
        self.desc.kind
    }

    /// The canonical path for this operation
    pub fn path(&self) -> &Path {
        &self.desc.path
    }

    pub fn item(&self) -> Option<&FsItem> {
        self.item.as_ref()
    }

    pub fn src_path(&self) -> Option<&Path> {
        self.src_path.as_deref()
    }

    pub fn dst_path(&self) -> Option<&Path> {
        self.dst_path.as_deref()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn conflicts(&self) -> &[String] {
        &self.conflicts
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.desc.details
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.desc.details.get(key)
    }

    pub fn checksums(&self) -> &HashMap<PathBuf, ChecksumRecord> {
        &self.checksums
    }

    pub fn checksum_for(&self, path: &Path) -> Option<&ChecksumRecord> {
        self.checksums.get(path)
    }

    /// A clone of the description, as carried by events and plans
    pub fn describe(&self) -> OperationDesc {
        self.desc.clone()
    }

    // --- pre-pipeline mutation ---

    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.add_dependency(id);
        self
    }

    pub fn add_dependency(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.dependencies.contains(&id) {
            self.dependencies.push(id);
        }
    }

    pub fn with_conflict(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.conflicts.contains(&id) {
            self.conflicts.push(id);
        }
        self
    }

    pub fn with_checksum(mut self, record: ChecksumRecord) -> Self {
        self.checksums.insert(record.path.clone(), record);
        self
    }

    pub fn set_detail(&mut self, key: impl Into<String>, value: Value) {
        self.desc.details.insert(key.into(), value);
    }

    pub(crate) fn record_checksum(&mut self, record: ChecksumRecord) {
        self.checksums.insert(record.path.clone(), record);
    }

    pub(crate) fn custom_callbacks(&self) -> Option<&CustomCallbacks> {
        self.custom.as_ref()
    }

    // --- prerequisites ---

    /// The runtime conditions this operation requires
    ///
    /// Parent-directory creation is deliberately not declared for
    /// create_file/create_symlink: execute auto-creates ancestors, and
    /// the projected filesystem bridges validation.
    pub fn prerequisites(&self) -> Vec<Prerequisite> {
        match self.kind() {
            OpKind::CreateFile | OpKind::CreateDirectory => {
                vec![Prerequisite::no_conflict(self.path(), true)]
            }
            OpKind::CreateSymlink => vec![Prerequisite::no_conflict(self.path(), false)],
            OpKind::Copy | OpKind::Move => {
                let mut prereqs = Vec::new();
                if let Some(src) = self.src_path() {
                    prereqs.push(Prerequisite::source_exists(src));
                }
                if let Some(dst) = self.dst_path() {
                    prereqs.push(Prerequisite::parent_dir(dst));
                    prereqs.push(Prerequisite::no_conflict(dst, false));
                }
                prereqs
            }
            OpKind::Delete => Vec::new(),
            OpKind::CreateArchive => {
                let mut prereqs = Vec::new();
                if let Some(FsItem::Archive { sources, .. }) = self.item() {
                    for source in sources {
                        prereqs.push(Prerequisite::source_exists(source));
                    }
                }
                prereqs.push(Prerequisite::parent_dir(self.path()));
                prereqs
            }
            OpKind::Unarchive => {
                let mut prereqs = vec![Prerequisite::source_exists(self.path())];
                if let Some(FsItem::Unarchive { extract_path, .. }) = self.item() {
                    prereqs.push(Prerequisite::parent_dir(extract_path));
                }
                prereqs
            }
            OpKind::Custom => Vec::new(),
        }
    }

    // --- lifecycle dispatch ---

    /// Check preconditions against the projected filesystem
    pub fn validate(&self, projection: &ProjectedFs<'_>) -> Result<()> {
        self.validate_paths()?;
        match self.kind() {
            OpKind::CreateFile | OpKind::CreateDirectory | OpKind::CreateSymlink => {
                create::validate(self, projection)
            }
            OpKind::Copy | OpKind::Move => transfer::validate(self, projection),
            OpKind::Delete => remove::validate(self),
            OpKind::CreateArchive | OpKind::Unarchive => archive_ops::validate(self, projection),
            OpKind::Custom => custom::validate(self, projection),
        }
    }

    /// Apply the mutation to the filesystem
    pub fn execute(&mut self, fs: &dyn FullFs) -> Result<()> {
        match self.kind() {
            OpKind::CreateFile | OpKind::CreateDirectory | OpKind::CreateSymlink => {
                create::execute(self, fs)
            }
            OpKind::Copy => transfer::execute_copy(self, fs),
            OpKind::Move => transfer::execute_move(self, fs),
            OpKind::Delete => remove::execute(self, fs),
            OpKind::CreateArchive => archive_ops::execute_create(self, fs),
            OpKind::Unarchive => archive_ops::execute_unarchive(self, fs),
            OpKind::Custom => custom::execute(self, fs),
        }
    }

    /// Best-effort trivial inverse, used when no reverse ops were captured
    pub fn rollback(&self, fs: &dyn FullFs) -> Result<()> {
        match self.kind() {
            OpKind::CreateFile | OpKind::CreateDirectory | OpKind::CreateSymlink => {
                create::rollback(self, fs)
            }
            OpKind::Copy => transfer::rollback_copy(self, fs),
            OpKind::Move => transfer::rollback_move(self, fs),
            OpKind::Delete => remove::rollback(self),
            OpKind::CreateArchive => archive_ops::rollback_create(self, fs),
            OpKind::Unarchive => archive_ops::rollback_unarchive(self, fs),
            OpKind::Custom => custom::rollback(self, fs),
        }
    }

    /// Synthesize the operations that would undo this one
    ///
    /// Called after a successful execute in restorable runs. Deletes
    /// capture content against the budget; everything else has a trivial
    /// inverse and returns no backup data.
    pub fn reverse_ops(
        &self,
        fs: &dyn FullFs,
        budget: &mut BackupBudget,
    ) -> Result<(Vec<Operation>, Option<BackupData>)> {
        match self.kind() {
            OpKind::CreateFile | OpKind::CreateDirectory | OpKind::CreateSymlink => {
                Ok((vec![Self::delete(self.reverse_id(), self.path())], None))
            }
            OpKind::Copy => {
                let dst = self.require_dst()?;
                Ok((vec![Self::delete(self.reverse_id(), dst)], None))
            }
            OpKind::Move => {
                let src = self.require_src()?;
                let dst = self.require_dst()?;
                Ok((vec![Self::move_op(self.reverse_id(), dst, src)], None))
            }
            OpKind::Delete => {
                let (ops, backup) =
                    crate::backup::synthesize_delete_reverse(self.id(), self.path(), fs, budget)?;
                Ok((ops, Some(backup)))
            }
            OpKind::CreateArchive => {
                Ok((vec![Self::delete(self.reverse_id(), self.path())], None))
            }
            OpKind::Unarchive => Ok((archive_ops::reverse_unarchive(self), None)),
            OpKind::Custom => Ok((custom::reverse(self), None)),
        }
    }

    /// Every path this operation names must stay inside the store
    fn validate_paths(&self) -> Result<()> {
        crate::path::store_key(self.path())?;
        if let Some(src) = self.src_path() {
            crate::path::store_key(src)?;
        }
        if let Some(dst) = self.dst_path() {
            crate::path::store_key(dst)?;
        }
        if let Some(FsItem::Unarchive { extract_path, .. }) = self.item() {
            crate::path::store_key(extract_path)?;
        }
        Ok(())
    }

    fn reverse_id(&self) -> String {
        format!("reverse_{}", self.id)
    }

    pub(crate) fn require_src(&self) -> Result<&Path> {
        self.src_path()
            .ok_or_else(|| self.invalid("missing source path"))
    }

    pub(crate) fn require_dst(&self) -> Result<&Path> {
        self.dst_path()
            .ok_or_else(|| self.invalid("missing destination path"))
    }

    /// A validation error carrying this operation's context
    pub(crate) fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::validation(self.id(), self.kind().to_string(), reason)
    }
}
