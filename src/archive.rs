// src/archive.rs

//! Archive codecs
//!
//! Codecs work entirely in memory against the capability traits: create
//! produces the archive bytes from store entries, extract writes store
//! entries from archive bytes. That keeps both codecs usable over the
//! OS-backed and in-memory stores alike.
//!
//! Extraction sanitizes every entry name before writing, so a hostile
//! archive cannot place entries outside the extraction root. Optional
//! glob patterns select entries; existing entries are skipped unless
//! overwrite is set.

use crate::error::{Error, Result};
use crate::fs::{walk, FileKind, FullFs};
use crate::item::{ArchiveFormat, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};
use crate::path::store_key;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use glob::Pattern;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Infer the archive format from a path's extension
pub fn detect_format(path: &Path) -> Result<ArchiveFormat> {
    let name = path.to_string_lossy().to_ascii_lowercase();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Ok(ArchiveFormat::TarGz)
    } else if name.ends_with(".zip") {
        Ok(ArchiveFormat::Zip)
    } else {
        Err(Error::Archive(format!(
            "cannot infer archive format from: {}",
            path.display()
        )))
    }
}

/// Encode `sources` into archive bytes
///
/// Directory sources are recursed into; entry names are the source's
/// final component plus the relative path below it.
pub fn create(fs: &dyn FullFs, format: ArchiveFormat, sources: &[PathBuf]) -> Result<Vec<u8>> {
    let entries = collect_entries(fs, sources)?;
    match format {
        ArchiveFormat::TarGz => create_tar_gz(&entries),
        ArchiveFormat::Zip => create_zip(&entries),
    }
}

/// Decode archive bytes into the store under `extract_root`
///
/// Returns the store paths actually written, files and directories both.
pub fn extract(
    fs: &dyn FullFs,
    format: ArchiveFormat,
    data: &[u8],
    extract_root: &Path,
    patterns: &[String],
    overwrite: bool,
) -> Result<Vec<PathBuf>> {
    let matchers = compile_patterns(patterns)?;
    match format {
        ArchiveFormat::TarGz => extract_tar_gz(fs, data, extract_root, &matchers, overwrite),
        ArchiveFormat::Zip => extract_zip(fs, data, extract_root, &matchers, overwrite),
    }
}

enum ArchiveEntry {
    Dir {
        name: PathBuf,
        mode: u32,
    },
    File {
        name: PathBuf,
        mode: u32,
        content: Vec<u8>,
    },
    Symlink {
        name: PathBuf,
        target: PathBuf,
    },
}

fn collect_entries(fs: &dyn FullFs, sources: &[PathBuf]) -> Result<Vec<ArchiveEntry>> {
    let mut entries = Vec::new();
    for source in sources {
        let meta = fs.stat(source)?;
        let base = source
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| Error::InvalidPath(format!("bad archive source: {}", source.display())))?;

        match meta.kind {
            FileKind::File => entries.push(ArchiveEntry::File {
                name: base,
                mode: meta.mode,
                content: fs.read(source)?,
            }),
            FileKind::Symlink => entries.push(ArchiveEntry::Symlink {
                name: base,
                target: fs.read_link(source)?,
            }),
            FileKind::Directory => {
                entries.push(ArchiveEntry::Dir {
                    name: base.clone(),
                    mode: meta.mode,
                });
                for walked in walk(fs, source)? {
                    let name = base.join(&walked.rel_path);
                    let full = source.join(&walked.rel_path);
                    match walked.metadata.kind {
                        FileKind::Directory => entries.push(ArchiveEntry::Dir {
                            name,
                            mode: walked.metadata.mode,
                        }),
                        FileKind::File => entries.push(ArchiveEntry::File {
                            name,
                            mode: walked.metadata.mode,
                            content: fs.read(&full)?,
                        }),
                        FileKind::Symlink => entries.push(ArchiveEntry::Symlink {
                            name,
                            target: fs.read_link(&full)?,
                        }),
                    }
                }
            }
        }
    }
    Ok(entries)
}

fn create_tar_gz(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in entries {
        match entry {
            ArchiveEntry::Dir { name, mode } => {
                let mut header = tar::Header::new_gnu();
                header.set_entry_type(tar::EntryType::Directory);
                header.set_mode(*mode);
                header.set_size(0);
                builder.append_data(&mut header, name, std::io::empty())?;
            }
            ArchiveEntry::File {
                name,
                mode,
                content,
            } => {
                let mut header = tar::Header::new_gnu();
                header.set_entry_type(tar::EntryType::Regular);
                header.set_mode(*mode);
                header.set_size(content.len() as u64);
                builder.append_data(&mut header, name, content.as_slice())?;
            }
            ArchiveEntry::Symlink { name, target } => {
                let mut header = tar::Header::new_gnu();
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_mode(0o777);
                header.set_size(0);
                builder.append_link(&mut header, name, target)?;
            }
        }
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

fn create_zip(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in entries {
        match entry {
            ArchiveEntry::Dir { name, mode } => {
                let options = SimpleFileOptions::default().unix_permissions(*mode);
                writer
                    .add_directory(name.to_string_lossy(), options)
                    .map_err(zip_error)?;
            }
            ArchiveEntry::File {
                name,
                mode,
                content,
            } => {
                let options = SimpleFileOptions::default().unix_permissions(*mode);
                writer
                    .start_file(name.to_string_lossy(), options)
                    .map_err(zip_error)?;
                writer.write_all(content)?;
            }
            ArchiveEntry::Symlink { name, target } => {
                let options = SimpleFileOptions::default().unix_permissions(0o777);
                writer
                    .add_symlink(name.to_string_lossy(), target.to_string_lossy(), options)
                    .map_err(zip_error)?;
            }
        }
    }

    let cursor = writer.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

fn extract_tar_gz(
    fs: &dyn FullFs,
    data: &[u8],
    extract_root: &Path,
    matchers: &[Pattern],
    overwrite: bool,
) -> Result<Vec<PathBuf>> {
    let decoder = GzDecoder::new(data);
    let mut archive = tar::Archive::new(decoder);
    let mut extracted = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let raw_name = entry.path()?.to_path_buf();
        let Some(dest) = entry_destination(extract_root, &raw_name, matchers)? else {
            continue;
        };

        let kind = entry.header().entry_type();
        let mode = entry.header().mode().unwrap_or(DEFAULT_FILE_MODE);

        if kind.is_dir() {
            fs.mkdir_all(&dest, mode)?;
            extracted.push(dest);
            continue;
        }
        if !overwrite && fs.exists(&dest) {
            warn!(path = %dest.display(), "entry exists, skipping (overwrite off)");
            continue;
        }
        ensure_entry_parent(fs, &dest)?;

        if kind.is_symlink() {
            let target = entry
                .link_name()?
                .ok_or_else(|| Error::Archive(format!("symlink entry without target: {}", raw_name.display())))?
                .to_path_buf();
            if fs.exists(&dest) {
                fs.remove(&dest)?;
            }
            fs.symlink(&target, &dest)?;
        } else {
            let mut content = Vec::new();
            entry.read_to_end(&mut content)?;
            fs.write_file(&dest, &content, mode)?;
        }
        extracted.push(dest);
    }

    debug!(count = extracted.len(), "tar.gz extraction complete");
    Ok(extracted)
}

fn extract_zip(
    fs: &dyn FullFs,
    data: &[u8],
    extract_root: &Path,
    matchers: &[Pattern],
    overwrite: bool,
) -> Result<Vec<PathBuf>> {
    let mut archive = ZipArchive::new(Cursor::new(data)).map_err(zip_error)?;
    let mut extracted = Vec::new();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).map_err(zip_error)?;
        let raw_name = PathBuf::from(file.name());
        let Some(dest) = entry_destination(extract_root, &raw_name, matchers)? else {
            continue;
        };

        if file.is_dir() {
            let mode = file.unix_mode().unwrap_or(DEFAULT_DIR_MODE) & 0o7777;
            fs.mkdir_all(&dest, mode)?;
            extracted.push(dest);
            continue;
        }
        if !overwrite && fs.exists(&dest) {
            warn!(path = %dest.display(), "entry exists, skipping (overwrite off)");
            continue;
        }
        ensure_entry_parent(fs, &dest)?;

        let unix_mode = file.unix_mode().unwrap_or(DEFAULT_FILE_MODE);
        let mut content = Vec::new();
        file.read_to_end(&mut content)?;

        // Symlinks are stored as files whose type bits say S_IFLNK and
        // whose content is the target
        if unix_mode & 0o170000 == 0o120000 {
            let target = PathBuf::from(String::from_utf8_lossy(&content).to_string());
            if fs.exists(&dest) {
                fs.remove(&dest)?;
            }
            fs.symlink(&target, &dest)?;
        } else {
            fs.write_file(&dest, &content, unix_mode & 0o7777)?;
        }
        extracted.push(dest);
    }

    debug!(count = extracted.len(), "zip extraction complete");
    Ok(extracted)
}

/// Sanitize an entry name and apply pattern filtering
///
/// Returns None when the entry is filtered out; errors when the name
/// would escape the extraction root.
fn entry_destination(
    extract_root: &Path,
    raw_name: &Path,
    matchers: &[Pattern],
) -> Result<Option<PathBuf>> {
    let sanitized = store_key(raw_name)
        .map_err(|_| Error::Archive(format!("unsafe entry name: {}", raw_name.display())))?;

    if !matchers.is_empty()
        && !matchers.iter().any(|pattern| pattern.matches_path(&sanitized))
    {
        return Ok(None);
    }
    Ok(Some(extract_root.join(sanitized)))
}

fn ensure_entry_parent(fs: &dyn FullFs, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        fs.mkdir_all(parent, DEFAULT_DIR_MODE)?;
    }
    Ok(())
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(|err| Error::Archive(format!("bad pattern '{}': {}", p, err))))
        .collect()
}

fn zip_error(err: zip::result::ZipError) -> Error {
    Error::Archive(err.to_string())
}
