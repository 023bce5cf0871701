// src/fs/os.rs

//! OS-backed rooted filesystem
//!
//! Every path is normalized and joined onto the store root before any
//! syscall, so the store can never touch entries outside its root. The
//! root directory is created on construction if missing.

use crate::error::{Error, Result};
use crate::path::store_key;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{DirEntry, FileKind, Metadata, ReadFs, StatFs, WriteFs};

/// Filesystem rooted on a real directory
#[derive(Debug, Clone)]
pub struct OsFs {
    root: PathBuf,
}

impl OsFs {
    /// Create a store rooted at `root`, creating the directory if needed
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            fs::create_dir_all(&root)?;
            debug!(root = %root.display(), "created store root");
        }
        Ok(Self { root })
    }

    /// The root directory all paths resolve under
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a store path onto the real filesystem
    fn real(&self, path: &Path) -> Result<PathBuf> {
        Ok(self.root.join(store_key(path)?))
    }

    fn metadata_from(meta: &fs::Metadata) -> Metadata {
        let kind = if meta.is_symlink() {
            FileKind::Symlink
        } else if meta.is_dir() {
            FileKind::Directory
        } else {
            FileKind::File
        };

        #[cfg(unix)]
        let mode = {
            use std::os::unix::fs::PermissionsExt;
            meta.permissions().mode() & 0o7777
        };
        #[cfg(not(unix))]
        let mode = if meta.is_dir() { 0o755 } else { 0o644 };

        Metadata {
            kind,
            size: meta.len(),
            mode,
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        }
    }

    #[cfg(unix)]
    fn set_mode(path: &Path, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
        Ok(())
    }
}

impl ReadFs for OsFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let real = self.real(path)?;
        if !real.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        Ok(fs::read(real)?)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let real = self.real(path)?;
        if !real.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(real)? {
            let entry = entry?;
            let meta = entry.path().symlink_metadata()?;
            let kind = if meta.is_symlink() {
                FileKind::Symlink
            } else if meta.is_dir() {
                FileKind::Directory
            } else {
                FileKind::File
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

impl StatFs for OsFs {
    fn stat(&self, path: &Path) -> Result<Metadata> {
        let real = self.real(path)?;
        let meta = real
            .symlink_metadata()
            .map_err(|_| Error::NotFound(path.to_path_buf()))?;
        Ok(Self::metadata_from(&meta))
    }
}

impl WriteFs for OsFs {
    fn write_file(&self, path: &Path, data: &[u8], mode: u32) -> Result<()> {
        let real = self.real(path)?;
        fs::write(&real, data)?;
        Self::set_mode(&real, mode)
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()> {
        let real = self.real(path)?;
        match real.symlink_metadata() {
            Ok(meta) if meta.is_dir() => return Ok(()),
            Ok(_) => {
                return Err(Error::WrongKind {
                    path: path.to_path_buf(),
                    reason: "mkdir over existing non-directory".to_string(),
                });
            }
            Err(_) => {}
        }
        fs::create_dir_all(&real)?;
        Self::set_mode(&real, mode)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let real = self.real(path)?;
        let meta = real
            .symlink_metadata()
            .map_err(|_| Error::NotFound(path.to_path_buf()))?;
        if meta.is_dir() {
            fs::remove_dir(&real)?;
        } else {
            fs::remove_file(&real)?;
        }
        Ok(())
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        let real = self.real(path)?;
        match real.symlink_metadata() {
            Ok(meta) if meta.is_dir() => Ok(fs::remove_dir_all(&real)?),
            Ok(_) => Ok(fs::remove_file(&real)?),
            Err(_) => Ok(()),
        }
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        let real = self.real(link)?;
        if real.symlink_metadata().is_ok() {
            return Err(Error::AlreadyExists(link.to_path_buf()));
        }
        #[cfg(unix)]
        std::os::unix::fs::symlink(target, &real)?;
        #[cfg(windows)]
        std::os::windows::fs::symlink_file(target, &real)?;
        Ok(())
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        let real = self.real(path)?;
        Ok(fs::read_link(real)?)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let src = self.real(from)?;
        let dst = self.real(to)?;
        if src.symlink_metadata().is_err() {
            return Err(Error::NotFound(from.to_path_buf()));
        }
        if let Ok(meta) = dst.symlink_metadata()
            && meta.is_dir()
        {
            return Err(Error::WrongKind {
                path: to.to_path_buf(),
                reason: "rename would overwrite a directory".to_string(),
            });
        }
        fs::rename(&src, &dst)?;
        Ok(())
    }
}
