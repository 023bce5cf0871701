// src/checksum.rs

//! Checksum records for source-integrity verification
//!
//! Records are captured after create/copy and before copy/move so the
//! engine can verify a source has not drifted between planning and
//! execution, and so reverse synthesis can describe what was there.

use crate::error::{Error, Result};
use crate::fs::FullFs;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Captured hash + size + modtime for a path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecksumRecord {
    pub path: PathBuf,
    pub md5: String,
    pub size: u64,
    pub mod_time: Option<DateTime<Utc>>,
    pub captured_at: DateTime<Utc>,
}

/// MD5 of a byte slice as lowercase hex
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

impl ChecksumRecord {
    /// Capture a record for the file at `path`
    pub fn capture(fs: &dyn FullFs, path: &Path) -> Result<Self> {
        let meta = fs.stat(path)?;
        let data = fs.read(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            md5: md5_hex(&data),
            size: data.len() as u64,
            mod_time: meta.modified,
            captured_at: Utc::now(),
        })
    }

    /// Verify the file at the recorded path still matches this record
    pub fn verify(&self, fs: &dyn FullFs) -> Result<()> {
        let data = fs.read(&self.path)?;
        let actual = md5_hex(&data);
        if actual != self.md5 {
            return Err(Error::ChecksumMismatch {
                path: self.path.clone(),
                expected: self.md5.clone(),
                actual,
            });
        }
        Ok(())
    }
}
