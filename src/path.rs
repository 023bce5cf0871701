// src/path.rs

//! Sandbox-rooted path resolution
//!
//! All user-supplied paths are resolved against a base path treated as a
//! sandbox root. Resolution is purely lexical: duplicate separators are
//! removed and `.`/`..` segments collapsed *before* the containment check,
//! so a path can never name storage outside the base regardless of what
//! exists on disk.
//!
//! # Security
//!
//! This is a critical security boundary. Operation paths may come from
//! untrusted plans and could attempt traversal with inputs like
//! `../../etc/passwd` or `/etc/passwd`. Every resolved output must satisfy
//! `resolved == base` or `resolved` begins with `base + separator`;
//! anything else is rejected with [`Error::PathEscape`].
//!
//! [`PathHandler::resolve_symlink_target`] is the sole sanctioned place to
//! compute symlink targets; callers must not bypass it.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// How user-supplied paths are interpreted against the base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathMode {
    /// Absolute inputs accepted iff they lie under base; relative inputs
    /// joined with base
    #[default]
    Auto,
    /// Inputs lacking a leading separator are promoted by prepending one,
    /// then required to lie under base
    Absolute,
    /// Inputs stripped of any leading separator, then joined with base
    Relative,
}

/// Resolves user-supplied paths against a sandbox root
#[derive(Debug, Clone)]
pub struct PathHandler {
    base: PathBuf,
    mode: PathMode,
}

impl PathHandler {
    /// Create a handler rooted at `base`
    pub fn new(base: impl AsRef<Path>, mode: PathMode) -> Self {
        Self {
            base: lexical_clean(base.as_ref()),
            mode,
        }
    }

    /// The sandbox root all resolved paths must lie under
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The active resolution mode
    pub fn mode(&self) -> PathMode {
        self.mode
    }

    /// Resolve a user-supplied path to an absolute path under the base
    pub fn resolve(&self, input: impl AsRef<Path>) -> Result<PathBuf> {
        let input = input.as_ref();
        if input.as_os_str().is_empty() {
            return Err(Error::InvalidPath("empty path".to_string()));
        }

        let candidate = match self.mode {
            PathMode::Auto => {
                if input.is_absolute() {
                    input.to_path_buf()
                } else {
                    self.base.join(input)
                }
            }
            PathMode::Absolute => {
                if input.is_absolute() {
                    input.to_path_buf()
                } else {
                    Path::new("/").join(input)
                }
            }
            PathMode::Relative => {
                let stripped = strip_leading_separator(input);
                self.base.join(stripped)
            }
        };

        let resolved = lexical_clean(&candidate);
        self.check_contained(&resolved, input)?;
        Ok(resolved)
    }

    /// Resolve a symlink target against its link path
    ///
    /// Absolute targets are validated as lying in the root. Relative
    /// targets are resolved against the link's directory. Either way the
    /// final target must not escape the sandbox.
    pub fn resolve_symlink_target(
        &self,
        link_path: impl AsRef<Path>,
        target: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let target = target.as_ref();
        if target.as_os_str().is_empty() {
            return Err(Error::InvalidPath("empty symlink target".to_string()));
        }

        let resolved = if target.is_absolute() {
            lexical_clean(target)
        } else {
            let link = self.resolve(link_path.as_ref())?;
            let dir = link.parent().unwrap_or(&self.base);
            lexical_clean(&dir.join(target))
        };

        self.check_contained(&resolved, target)?;
        Ok(resolved)
    }

    fn check_contained(&self, resolved: &Path, original: &Path) -> Result<()> {
        if resolved == self.base || resolved.starts_with(&self.base) {
            return Ok(());
        }
        warn!(
            path = %original.display(),
            resolved = %resolved.display(),
            base = %self.base.display(),
            "path traversal attempt rejected"
        );
        Err(Error::PathEscape(original.display().to_string()))
    }
}

/// Lexically normalize a path: collapse duplicate separators, drop `.`
/// segments, resolve `..` against preceding components
///
/// `..` at the root of an absolute path is clamped at the root; `..` at
/// the start of a relative path is preserved so the containment check in
/// [`PathHandler::resolve`] can reject it.
pub(crate) fn lexical_clean(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {
                    // "/.." stays at the root
                }
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    let mut cleaned = PathBuf::new();
    for component in out {
        cleaned.push(component.as_os_str());
    }
    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }
    cleaned
}

/// Strip leading separators, turning an absolute path into a relative one
pub(crate) fn strip_leading_separator(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Normalize a path into the relative key form used by rooted stores
///
/// Leading separators are stripped, `.`/`..` collapsed, and traversal that
/// would climb above the store root is rejected.
pub(crate) fn store_key(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidPath("empty path".to_string()));
    }

    let cleaned = lexical_clean(&strip_leading_separator(path));
    for component in cleaned.components() {
        if matches!(component, Component::ParentDir) {
            return Err(Error::PathEscape(path.display().to_string()));
        }
    }
    if cleaned == Path::new(".") {
        return Err(Error::InvalidPath(format!(
            "path resolves to the store root: {}",
            path.display()
        )));
    }
    Ok(cleaned)
}

/// Resolve a symlink target in store space
///
/// The store-relative counterpart of
/// [`PathHandler::resolve_symlink_target`]: absolute targets are
/// normalized into the store root, relative targets resolve against the
/// link's directory, and a target that would climb out of the store is
/// rejected.
pub(crate) fn resolve_store_symlink_target(link: &Path, target: &Path) -> Result<PathBuf> {
    if target.as_os_str().is_empty() {
        return Err(Error::InvalidPath("empty symlink target".to_string()));
    }
    if target.is_absolute() {
        return store_key(target);
    }

    let link_key = store_key(link)?;
    let dir = link_key.parent().unwrap_or(Path::new(""));
    let cleaned = lexical_clean(&dir.join(target));
    for component in cleaned.components() {
        if matches!(component, Component::ParentDir) {
            return Err(Error::PathEscape(target.display().to_string()));
        }
    }
    Ok(cleaned)
}
