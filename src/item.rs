// src/item.rs

//! Operation payloads
//!
//! An [`FsItem`] describes the thing an operation creates or acts on.
//! Defaults follow the usual filesystem conventions: 0644 for files,
//! 0755 for directories.

use std::path::{Path, PathBuf};
use strum_macros::{Display, EnumString};

/// Default mode for created files
pub const DEFAULT_FILE_MODE: u32 = 0o644;
/// Default mode for created directories
pub const DEFAULT_DIR_MODE: u32 = 0o755;

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum ArchiveFormat {
    #[strum(serialize = "tar.gz", serialize = "tgz")]
    TarGz,
    #[strum(serialize = "zip")]
    Zip,
}

/// The payload an operation creates or acts on
#[derive(Debug, Clone, PartialEq)]
pub enum FsItem {
    File {
        path: PathBuf,
        content: Vec<u8>,
        mode: u32,
    },
    Directory {
        path: PathBuf,
        mode: u32,
    },
    Symlink {
        path: PathBuf,
        target: PathBuf,
    },
    Archive {
        path: PathBuf,
        format: ArchiveFormat,
        sources: Vec<PathBuf>,
    },
    Unarchive {
        archive_path: PathBuf,
        extract_path: PathBuf,
        patterns: Vec<String>,
        overwrite: bool,
    },
}

impl FsItem {
    pub fn file(path: impl Into<PathBuf>, content: Vec<u8>, mode: u32) -> Self {
        Self::File {
            path: path.into(),
            content,
            mode: if mode == 0 { DEFAULT_FILE_MODE } else { mode },
        }
    }

    pub fn directory(path: impl Into<PathBuf>, mode: u32) -> Self {
        Self::Directory {
            path: path.into(),
            mode: if mode == 0 { DEFAULT_DIR_MODE } else { mode },
        }
    }

    pub fn symlink(path: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self::Symlink {
            path: path.into(),
            target: target.into(),
        }
    }

    pub fn archive(
        path: impl Into<PathBuf>,
        format: ArchiveFormat,
        sources: Vec<PathBuf>,
    ) -> Self {
        Self::Archive {
            path: path.into(),
            format,
            sources,
        }
    }

    pub fn unarchive(archive_path: impl Into<PathBuf>, extract_path: impl Into<PathBuf>) -> Self {
        Self::Unarchive {
            archive_path: archive_path.into(),
            extract_path: extract_path.into(),
            patterns: Vec::new(),
            overwrite: false,
        }
    }

    /// Restrict extraction to entries matching these glob patterns
    pub fn with_patterns(mut self, patterns: Vec<String>) -> Self {
        if let Self::Unarchive {
            patterns: slot, ..
        } = &mut self
        {
            *slot = patterns;
        }
        self
    }

    /// Allow extraction to overwrite existing entries
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        if let Self::Unarchive {
            overwrite: slot, ..
        } = &mut self
        {
            *slot = overwrite;
        }
        self
    }

    /// The canonical path this item is addressed by
    pub fn path(&self) -> &Path {
        match self {
            Self::File { path, .. }
            | Self::Directory { path, .. }
            | Self::Symlink { path, .. }
            | Self::Archive { path, .. } => path,
            Self::Unarchive { archive_path, .. } => archive_path,
        }
    }
}
