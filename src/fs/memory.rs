// src/fs/memory.rs

//! In-memory filesystem
//!
//! A map from normalized path to entry, guarded by a mutex so the store
//! satisfies the same `&self` capability contracts as [`super::OsFs`].
//! Symlink entries carry their target in the data bytes. Behavior matches
//! the OS store's semantic rules, including legal dangling symlinks.

use crate::error::{Error, Result};
use crate::path::store_key;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{DirEntry, FileKind, Metadata, ReadFs, StatFs, WriteFs};

#[derive(Debug, Clone)]
struct MemEntry {
    kind: FileKind,
    data: Vec<u8>,
    mode: u32,
    modified: chrono::DateTime<Utc>,
}

impl MemEntry {
    fn new(kind: FileKind, data: Vec<u8>, mode: u32) -> Self {
        Self {
            kind,
            data,
            mode,
            modified: Utc::now(),
        }
    }
}

/// Map-backed filesystem for tests and dry planning
#[derive(Debug, Default)]
pub struct MemoryFs {
    entries: Mutex<BTreeMap<PathBuf, MemEntry>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in the store
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// The parent of `key` must be an existing directory (single-component
    /// paths live directly under the implicit root)
    fn require_parent(map: &BTreeMap<PathBuf, MemEntry>, key: &Path) -> Result<()> {
        match key.parent() {
            None => Ok(()),
            Some(parent) if parent.as_os_str().is_empty() => Ok(()),
            Some(parent) => match map.get(parent) {
                Some(entry) if entry.kind == FileKind::Directory => Ok(()),
                Some(_) => Err(Error::WrongKind {
                    path: parent.to_path_buf(),
                    reason: "parent is not a directory".to_string(),
                }),
                None => Err(Error::NotFound(parent.to_path_buf())),
            },
        }
    }

    fn children_of<'m>(
        map: &'m BTreeMap<PathBuf, MemEntry>,
        key: &Path,
    ) -> impl Iterator<Item = (&'m PathBuf, &'m MemEntry)> {
        let key = key.to_path_buf();
        map.iter().filter(move |(path, _)| {
            path.parent()
                .map(|p| p == key.as_path())
                .unwrap_or(false)
        })
    }

    fn read_resolved(&self, path: &Path, depth: u8) -> Result<Vec<u8>> {
        if depth == 0 {
            return Err(Error::InvalidPath(format!(
                "too many levels of symbolic links: {}",
                path.display()
            )));
        }
        let key = store_key(path)?;
        let (kind, data) = {
            let map = self.entries.lock().unwrap();
            let entry = map.get(&key).ok_or_else(|| Error::NotFound(key.clone()))?;
            (entry.kind, entry.data.clone())
        };
        match kind {
            FileKind::File => Ok(data),
            FileKind::Directory => Err(Error::WrongKind {
                path: key,
                reason: "is a directory".to_string(),
            }),
            FileKind::Symlink => {
                let target = PathBuf::from(String::from_utf8_lossy(&data).to_string());
                let resolved = if target.is_absolute() {
                    target
                } else {
                    key.parent().unwrap_or(Path::new("")).join(target)
                };
                self.read_resolved(&resolved, depth - 1)
            }
        }
    }
}

impl ReadFs for MemoryFs {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.read_resolved(path, 8)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let key = store_key(path)?;
        let map = self.entries.lock().unwrap();
        let entry = map.get(&key).ok_or_else(|| Error::NotFound(key.clone()))?;
        if entry.kind != FileKind::Directory {
            return Err(Error::WrongKind {
                path: key,
                reason: "not a directory".to_string(),
            });
        }
        let mut out: Vec<DirEntry> = Self::children_of(&map, &key)
            .map(|(path, entry)| DirEntry {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                kind: entry.kind,
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}

impl StatFs for MemoryFs {
    fn stat(&self, path: &Path) -> Result<Metadata> {
        let key = store_key(path)?;
        let map = self.entries.lock().unwrap();
        let entry = map.get(&key).ok_or(Error::NotFound(key))?;
        Ok(Metadata {
            kind: entry.kind,
            size: entry.data.len() as u64,
            mode: entry.mode,
            modified: Some(entry.modified),
        })
    }
}

impl WriteFs for MemoryFs {
    fn write_file(&self, path: &Path, data: &[u8], mode: u32) -> Result<()> {
        let key = store_key(path)?;
        let mut map = self.entries.lock().unwrap();
        Self::require_parent(&map, &key)?;
        if let Some(existing) = map.get(&key)
            && existing.kind == FileKind::Directory
        {
            return Err(Error::WrongKind {
                path: key,
                reason: "write over existing directory".to_string(),
            });
        }
        map.insert(key, MemEntry::new(FileKind::File, data.to_vec(), mode));
        Ok(())
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> Result<()> {
        let key = store_key(path)?;
        let mut map = self.entries.lock().unwrap();

        let mut ancestors: Vec<PathBuf> = key.ancestors().map(Path::to_path_buf).collect();
        ancestors.retain(|p| !p.as_os_str().is_empty());
        ancestors.reverse();

        for ancestor in ancestors {
            match map.get(&ancestor) {
                Some(entry) if entry.kind == FileKind::Directory => {}
                Some(_) => {
                    return Err(Error::WrongKind {
                        path: ancestor,
                        reason: "mkdir over existing non-directory".to_string(),
                    });
                }
                None => {
                    let dir_mode = if ancestor == key { mode } else { 0o755 };
                    map.insert(ancestor, MemEntry::new(FileKind::Directory, Vec::new(), dir_mode));
                }
            }
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let key = store_key(path)?;
        let mut map = self.entries.lock().unwrap();
        let entry = map.get(&key).ok_or_else(|| Error::NotFound(key.clone()))?;
        if entry.kind == FileKind::Directory && Self::children_of(&map, &key).next().is_some() {
            return Err(Error::WrongKind {
                path: key,
                reason: "directory not empty".to_string(),
            });
        }
        map.remove(&key);
        Ok(())
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        let key = store_key(path)?;
        let mut map = self.entries.lock().unwrap();
        map.retain(|candidate, _| candidate != &key && !candidate.starts_with(&key));
        Ok(())
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<()> {
        let key = store_key(link)?;
        let mut map = self.entries.lock().unwrap();
        Self::require_parent(&map, &key)?;
        if map.contains_key(&key) {
            return Err(Error::AlreadyExists(key));
        }
        // Dangling targets are legal; no target lookup here
        let data = target.to_string_lossy().as_bytes().to_vec();
        map.insert(key, MemEntry::new(FileKind::Symlink, data, 0o777));
        Ok(())
    }

    fn read_link(&self, path: &Path) -> Result<PathBuf> {
        let key = store_key(path)?;
        let map = self.entries.lock().unwrap();
        let entry = map.get(&key).ok_or_else(|| Error::NotFound(key.clone()))?;
        if entry.kind != FileKind::Symlink {
            return Err(Error::WrongKind {
                path: key,
                reason: "not a symlink".to_string(),
            });
        }
        Ok(PathBuf::from(String::from_utf8_lossy(&entry.data).to_string()))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let src = store_key(from)?;
        let dst = store_key(to)?;
        let mut map = self.entries.lock().unwrap();

        if !map.contains_key(&src) {
            return Err(Error::NotFound(src));
        }
        Self::require_parent(&map, &dst)?;
        if let Some(existing) = map.get(&dst)
            && existing.kind == FileKind::Directory
        {
            return Err(Error::WrongKind {
                path: dst,
                reason: "rename would overwrite a directory".to_string(),
            });
        }

        // Move the entry and, for directories, every key under it
        let moved: Vec<(PathBuf, MemEntry)> = map
            .iter()
            .filter(|(path, _)| *path == &src || path.starts_with(&src))
            .map(|(path, entry)| (path.clone(), entry.clone()))
            .collect();
        for (path, _) in &moved {
            map.remove(path);
        }
        for (path, entry) in moved {
            let rel = path.strip_prefix(&src).unwrap_or(Path::new(""));
            let new_key = if rel.as_os_str().is_empty() {
                dst.clone()
            } else {
                dst.join(rel)
            };
            map.insert(new_key, entry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_requires_parent() {
        let fs = MemoryFs::new();
        assert!(fs.write_file(Path::new("a/f.txt"), b"x", 0o644).is_err());
        fs.mkdir_all(Path::new("a"), 0o755).unwrap();
        fs.write_file(Path::new("a/f.txt"), b"x", 0o644).unwrap();
        assert_eq!(fs.read(Path::new("a/f.txt")).unwrap(), b"x");
    }

    #[test]
    fn test_leading_slash_is_same_path() {
        let fs = MemoryFs::new();
        fs.write_file(Path::new("/f"), b"x", 0o644).unwrap();
        assert!(fs.exists(Path::new("f")));
        assert_eq!(fs.read(Path::new("f")).unwrap(), b"x");
    }

    #[test]
    fn test_mkdir_all_creates_ancestors() {
        let fs = MemoryFs::new();
        fs.mkdir_all(Path::new("a/b/c"), 0o700).unwrap();
        assert!(fs.stat(Path::new("a")).unwrap().is_dir());
        assert_eq!(fs.stat(Path::new("a")).unwrap().mode, 0o755);
        assert_eq!(fs.stat(Path::new("a/b/c")).unwrap().mode, 0o700);
    }

    #[test]
    fn test_mkdir_over_file_fails() {
        let fs = MemoryFs::new();
        fs.write_file(Path::new("x"), b"data", 0o644).unwrap();
        assert!(fs.mkdir_all(Path::new("x"), 0o755).is_err());
        assert!(fs.mkdir_all(Path::new("x/y"), 0o755).is_err());
    }

    #[test]
    fn test_remove_rules() {
        let fs = MemoryFs::new();
        fs.mkdir_all(Path::new("d"), 0o755).unwrap();
        fs.write_file(Path::new("d/f"), b"x", 0o644).unwrap();

        assert!(fs.remove(Path::new("d")).is_err());
        fs.remove(Path::new("d/f")).unwrap();
        fs.remove(Path::new("d")).unwrap();
        assert!(fs.is_empty());
    }

    #[test]
    fn test_remove_all_recursive_and_absent() {
        let fs = MemoryFs::new();
        fs.mkdir_all(Path::new("d/sub"), 0o755).unwrap();
        fs.write_file(Path::new("d/sub/f"), b"x", 0o644).unwrap();
        fs.remove_all(Path::new("d")).unwrap();
        assert!(fs.is_empty());
        fs.remove_all(Path::new("missing")).unwrap();
    }

    #[test]
    fn test_symlink_dangling_allowed() {
        let fs = MemoryFs::new();
        fs.symlink(Path::new("no/such/target"), Path::new("lnk"))
            .unwrap();
        assert!(fs.stat(Path::new("lnk")).unwrap().is_symlink());
        assert_eq!(
            fs.read_link(Path::new("lnk")).unwrap(),
            PathBuf::from("no/such/target")
        );
    }

    #[test]
    fn test_read_through_symlink() {
        let fs = MemoryFs::new();
        fs.mkdir_all(Path::new("data"), 0o755).unwrap();
        fs.write_file(Path::new("data/real.txt"), b"content", 0o644)
            .unwrap();
        fs.symlink(Path::new("data/real.txt"), Path::new("lnk"))
            .unwrap();
        assert_eq!(fs.read(Path::new("lnk")).unwrap(), b"content");
    }

    #[test]
    fn test_rename_moves_subtree() {
        let fs = MemoryFs::new();
        fs.mkdir_all(Path::new("src/sub"), 0o755).unwrap();
        fs.write_file(Path::new("src/sub/f"), b"x", 0o644).unwrap();
        fs.rename(Path::new("src"), Path::new("dst")).unwrap();

        assert!(!fs.exists(Path::new("src")));
        assert_eq!(fs.read(Path::new("dst/sub/f")).unwrap(), b"x");
    }

    #[test]
    fn test_rename_overwrites_file_not_dir() {
        let fs = MemoryFs::new();
        fs.write_file(Path::new("a"), b"new", 0o644).unwrap();
        fs.write_file(Path::new("b"), b"old", 0o644).unwrap();
        fs.rename(Path::new("a"), Path::new("b")).unwrap();
        assert_eq!(fs.read(Path::new("b")).unwrap(), b"new");

        fs.write_file(Path::new("c"), b"x", 0o644).unwrap();
        fs.mkdir_all(Path::new("d"), 0o755).unwrap();
        assert!(fs.rename(Path::new("c"), Path::new("d")).is_err());
    }

    #[test]
    fn test_traversal_rejected() {
        let fs = MemoryFs::new();
        assert!(fs.write_file(Path::new("../escape"), b"x", 0o644).is_err());
    }
}
