// src/lib.rs

//! forgefs: declarative filesystem mutation engine
//!
//! Callers assemble a batch of filesystem operations (create file,
//! create directory, create symlink, copy, move, delete, archive,
//! unarchive, custom) and submit them for atomic-ish execution with
//! validation, dependency ordering, prerequisite auto-resolution,
//! checksum capture, and restorable rollback.
//!
//! # Architecture
//!
//! - Capability-split filesystem traits: OS-backed and in-memory stores
//!   satisfy the same contracts
//! - Projected validation: each operation validates against the state
//!   its predecessors will produce, before anything touches disk
//! - Sequenced execution with per-operation events
//! - Restorable runs: budget-limited backups and synthesized reverse
//!   operations make a batch undoable
//!
//! # Example
//!
//! ```
//! use forgefs::{Executor, MemoryFs, Operation, Pipeline, PipelineOptions};
//!
//! let fs = MemoryFs::new();
//! let mut pipeline = Pipeline::new();
//! pipeline.add(Operation::create_file(
//!     "hello",
//!     "greetings/hello.txt",
//!     b"hi there".to_vec(),
//!     0o644,
//! ))?;
//!
//! let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::default());
//! assert!(result.success);
//! # Ok::<(), forgefs::Error>(())
//! ```

pub mod archive;
pub mod backup;
pub mod checksum;
mod context;
mod error;
pub mod event;
pub mod fs;
pub mod id;
pub mod item;
pub mod path;
pub mod pipeline;
pub mod plan;
pub mod prereq;
pub mod result;

mod executor;
mod operation;

pub use backup::{BackupBudget, BackupData, BackupItem, BackupType};
pub use checksum::ChecksumRecord;
pub use context::ExecutionContext;
pub use error::{Error, Result};
pub use event::{Event, EventBus, EventKind};
pub use executor::{Executor, PipelineOptions};
pub use fs::{
    DirEntry, FileKind, FullFs, MemoryFs, Metadata, OsFs, PathState, ProjectedFs, ReadFs, StatFs,
    WriteFs,
};
pub use id::{
    generate_id, set_id_generator, HashIdGenerator, IdGenerator, SequenceIdGenerator,
    TimestampIdGenerator,
};
pub use item::{ArchiveFormat, FsItem, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};
pub use operation::{CustomCallbacks, OpKind, Operation, OperationDesc};
pub use path::{PathHandler, PathMode};
pub use pipeline::Pipeline;
pub use plan::{from_document, to_document, PlanDocument, PlanMetadata, PlanOperation};
pub use prereq::{ParentDirResolver, PrereqResolver, Prerequisite};
pub use result::{OpResult, OpStatus, PipelineResult, RollbackReport};
