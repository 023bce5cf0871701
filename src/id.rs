// src/id.rs

//! Operation id generation
//!
//! Ids are opaque strings, unique within a pipeline. The generator is
//! process-wide state with a pluggable setter so embedders (and tests)
//! can control id shape. Three built-ins ship:
//!
//! - [`HashIdGenerator`]: xxh3 of kind + path + nanotime, 8 hex digits
//!   (the default)
//! - [`SequenceIdGenerator`]: monotonic counter, resettable for tests
//! - [`TimestampIdGenerator`]: nanosecond timestamp suffix

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use xxhash_rust::xxh3::xxh3_64;

/// Produces an operation id from a kind tag and a path
pub trait IdGenerator: Send + Sync {
    fn generate(&self, kind: &str, path: &Path) -> String;
}

fn nanotime() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

/// Hash-based ids: `<kind>_<8 hex digits>`
#[derive(Debug, Default)]
pub struct HashIdGenerator;

impl IdGenerator for HashIdGenerator {
    fn generate(&self, kind: &str, path: &Path) -> String {
        let seed = format!("{}:{}:{}", kind, path.display(), nanotime());
        let digest = xxh3_64(seed.as_bytes()) as u32;
        format!("{}_{:08x}", kind, digest)
    }
}

/// Monotonic sequence ids: `<kind>_<n>`
///
/// Reset support exists so tests get stable ids.
#[derive(Debug, Default)]
pub struct SequenceIdGenerator {
    counter: AtomicU64,
}

impl SequenceIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.counter.store(0, Ordering::SeqCst);
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn generate(&self, kind: &str, _path: &Path) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}_{}", kind, n)
    }
}

/// Timestamp ids: `<kind>_<unix nanos>`
#[derive(Debug, Default)]
pub struct TimestampIdGenerator;

impl IdGenerator for TimestampIdGenerator {
    fn generate(&self, kind: &str, _path: &Path) -> String {
        format!("{}_{}", kind, nanotime())
    }
}

fn current() -> &'static RwLock<Arc<dyn IdGenerator>> {
    static CURRENT: OnceLock<RwLock<Arc<dyn IdGenerator>>> = OnceLock::new();
    CURRENT.get_or_init(|| RwLock::new(Arc::new(HashIdGenerator)))
}

/// Replace the process-wide id generator
pub fn set_id_generator(generator: Arc<dyn IdGenerator>) {
    *current().write().unwrap() = generator;
}

/// Generate an id with the process-wide generator
pub fn generate_id(kind: &str, path: &Path) -> String {
    current().read().unwrap().generate(kind, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_hash_id_shape() {
        let id = HashIdGenerator.generate("create_file", &PathBuf::from("a/b.txt"));
        let suffix = id.strip_prefix("create_file_").unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_sequence_ids_monotonic_and_resettable() {
        let generator = SequenceIdGenerator::new();
        assert_eq!(generator.generate("delete", Path::new("x")), "delete_1");
        assert_eq!(generator.generate("delete", Path::new("y")), "delete_2");
        generator.reset();
        assert_eq!(generator.generate("delete", Path::new("z")), "delete_1");
    }

    #[test]
    fn test_timestamp_id_has_kind_prefix() {
        let id = TimestampIdGenerator.generate("copy", Path::new("p"));
        assert!(id.starts_with("copy_"));
    }
}
