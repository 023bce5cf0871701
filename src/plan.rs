// src/plan.rs

//! Operation plan documents
//!
//! A pipeline of concrete operations round-trips through a structured
//! document: metadata plus one entry per operation with its kind tag,
//! id, dependencies, and parameters. The core never touches files for
//! this; the document lives in memory and callers decide where it goes.
//!
//! Custom operations do not serialize (callbacks have no document form)
//! and are rejected.

use crate::error::{Error, Result};
use crate::item::{ArchiveFormat, FsItem};
use crate::operation::{OpKind, Operation};
use crate::pipeline::Pipeline;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::str::FromStr;

/// Current plan document version
pub const PLAN_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub version: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanOperation {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// In-memory plan document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDocument {
    pub metadata: PlanMetadata,
    pub operations: Vec<PlanOperation>,
}

impl PlanDocument {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

/// Serialize a pipeline's operations into a plan document
pub fn to_document(pipeline: &Pipeline, description: &str) -> Result<PlanDocument> {
    let mut operations = Vec::with_capacity(pipeline.len());
    for op in pipeline.operations() {
        operations.push(serialize_op(op)?);
    }
    Ok(PlanDocument {
        metadata: PlanMetadata {
            version: PLAN_VERSION.to_string(),
            description: description.to_string(),
        },
        operations,
    })
}

/// Rebuild a pipeline from a plan document
pub fn from_document(doc: &PlanDocument) -> Result<Pipeline> {
    let mut pipeline = Pipeline::new();
    for entry in &doc.operations {
        let mut op = deserialize_op(entry)?;
        for dep in &entry.dependencies {
            op.add_dependency(dep);
        }
        pipeline.add(op)?;
    }
    Ok(pipeline)
}

fn serialize_op(op: &Operation) -> Result<PlanOperation> {
    let mut parameters = Map::new();
    parameters.insert("path".into(), Value::from(op.path().display().to_string()));

    match op.kind() {
        OpKind::CreateFile => {
            let Some(FsItem::File { content, mode, .. }) = op.item() else {
                return Err(op_error(op, "create_file without file item"));
            };
            parameters.insert("content".into(), Value::from(content.clone()));
            parameters.insert("mode".into(), Value::from(*mode));
        }
        OpKind::CreateDirectory => {
            let Some(FsItem::Directory { mode, .. }) = op.item() else {
                return Err(op_error(op, "create_directory without directory item"));
            };
            parameters.insert("mode".into(), Value::from(*mode));
        }
        OpKind::CreateSymlink => {
            let Some(FsItem::Symlink { target, .. }) = op.item() else {
                return Err(op_error(op, "create_symlink without symlink item"));
            };
            parameters.insert("target".into(), Value::from(target.display().to_string()));
        }
        OpKind::Copy | OpKind::Move => {
            let src = op.require_src()?;
            let dst = op.require_dst()?;
            parameters.insert("source".into(), Value::from(src.display().to_string()));
            parameters.insert("destination".into(), Value::from(dst.display().to_string()));
        }
        OpKind::Delete => {}
        OpKind::CreateArchive => {
            let Some(FsItem::Archive {
                format, sources, ..
            }) = op.item()
            else {
                return Err(op_error(op, "create_archive without archive item"));
            };
            parameters.insert("format".into(), Value::from(format.to_string()));
            parameters.insert(
                "sources".into(),
                Value::from(
                    sources
                        .iter()
                        .map(|s| s.display().to_string())
                        .collect::<Vec<_>>(),
                ),
            );
        }
        OpKind::Unarchive => {
            let Some(FsItem::Unarchive {
                extract_path,
                patterns,
                overwrite,
                ..
            }) = op.item()
            else {
                return Err(op_error(op, "unarchive without unarchive item"));
            };
            parameters.insert(
                "extract_path".into(),
                Value::from(extract_path.display().to_string()),
            );
            if !patterns.is_empty() {
                parameters.insert("patterns".into(), Value::from(patterns.clone()));
            }
            parameters.insert("overwrite".into(), Value::from(*overwrite));
        }
        OpKind::Custom => {
            return Err(op_error(op, "custom operations do not serialize"));
        }
    }

    Ok(PlanOperation {
        kind: op.kind().to_string(),
        id: op.id().to_string(),
        dependencies: op.dependencies().to_vec(),
        parameters,
    })
}

fn deserialize_op(entry: &PlanOperation) -> Result<Operation> {
    let kind = OpKind::from_str(&entry.kind)
        .map_err(|_| plan_error(&entry.id, format!("unknown operation type: {}", entry.kind)))?;
    let path = param_str(entry, "path")?;

    let op = match kind {
        OpKind::CreateFile => {
            let content = entry
                .parameters
                .get("content")
                .and_then(Value::as_array)
                .map(|bytes| {
                    bytes
                        .iter()
                        .filter_map(Value::as_u64)
                        .map(|b| b as u8)
                        .collect()
                })
                .unwrap_or_default();
            Operation::create_file(&entry.id, path, content, param_mode(entry))
        }
        OpKind::CreateDirectory => Operation::create_directory(&entry.id, path, param_mode(entry)),
        OpKind::CreateSymlink => {
            Operation::create_symlink(&entry.id, path, param_str(entry, "target")?)
        }
        OpKind::Copy => Operation::copy(
            &entry.id,
            param_str(entry, "source")?,
            param_str(entry, "destination")?,
        ),
        OpKind::Move => Operation::move_op(
            &entry.id,
            param_str(entry, "source")?,
            param_str(entry, "destination")?,
        ),
        OpKind::Delete => Operation::delete(&entry.id, path),
        OpKind::CreateArchive => {
            let format = ArchiveFormat::from_str(&param_str(entry, "format")?)
                .map_err(|err| plan_error(&entry.id, err.to_string()))?;
            let sources = entry
                .parameters
                .get("sources")
                .and_then(Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(PathBuf::from)
                        .collect()
                })
                .unwrap_or_default();
            Operation::create_archive(&entry.id, path, format, sources)
        }
        OpKind::Unarchive => {
            let patterns = entry
                .parameters
                .get("patterns")
                .and_then(Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();
            let overwrite = entry
                .parameters
                .get("overwrite")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let item = FsItem::unarchive(path, param_str(entry, "extract_path")?)
                .with_patterns(patterns)
                .with_overwrite(overwrite);
            Operation::unarchive(&entry.id, item)
        }
        OpKind::Custom => {
            return Err(plan_error(&entry.id, "custom operations do not deserialize"));
        }
    };
    Ok(op)
}

fn param_str(entry: &PlanOperation, key: &str) -> Result<String> {
    entry
        .parameters
        .get(key)
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| plan_error(&entry.id, format!("missing parameter: {}", key)))
}

fn param_mode(entry: &PlanOperation) -> u32 {
    entry
        .parameters
        .get("mode")
        .and_then(Value::as_u64)
        .map(|m| m as u32)
        .unwrap_or(0)
}

fn op_error(op: &Operation, reason: impl Into<String>) -> Error {
    Error::validation(op.id(), op.kind().to_string(), reason)
}

fn plan_error(id: &str, reason: impl Into<String>) -> Error {
    Error::validation(id, "plan", reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::CustomCallbacks;
    use std::path::Path;

    fn sample_pipeline() -> Pipeline {
        let mut pipeline = Pipeline::new();
        pipeline
            .add(Operation::create_directory("dir", "d", 0o750))
            .unwrap();
        pipeline
            .add(
                Operation::create_file("file", "d/f.bin", vec![0, 159, 146, 150], 0o600)
                    .with_dependency("dir"),
            )
            .unwrap();
        pipeline
            .add(Operation::create_symlink("link", "d/lnk", "f.bin"))
            .unwrap();
        pipeline.add(Operation::copy("cp", "d/f.bin", "d/f2.bin")).unwrap();
        pipeline.add(Operation::delete("rm", "d/f2.bin")).unwrap();
        pipeline
            .add(Operation::create_archive(
                "pack",
                "out.tar.gz",
                ArchiveFormat::TarGz,
                vec![PathBuf::from("d")],
            ))
            .unwrap();
        pipeline
            .add(Operation::unarchive(
                "unpack",
                FsItem::unarchive("out.tar.gz", "restored")
                    .with_patterns(vec!["**/*.bin".to_string()])
                    .with_overwrite(true),
            ))
            .unwrap();
        pipeline
    }

    #[test]
    fn test_round_trip_preserves_operations() {
        let pipeline = sample_pipeline();
        let doc = to_document(&pipeline, "sample plan").unwrap();
        assert_eq!(doc.metadata.version, PLAN_VERSION);
        assert_eq!(doc.operations.len(), 7);

        let rebuilt = from_document(&doc).unwrap();
        assert_eq!(rebuilt.len(), pipeline.len());

        let file = rebuilt.get("file").unwrap();
        assert_eq!(file.kind(), OpKind::CreateFile);
        assert_eq!(file.dependencies(), &["dir"]);
        match file.item().unwrap() {
            FsItem::File { content, mode, .. } => {
                assert_eq!(content, &vec![0u8, 159, 146, 150]);
                assert_eq!(*mode, 0o600);
            }
            other => panic!("expected file item, got {:?}", other),
        }

        let unpack = rebuilt.get("unpack").unwrap();
        match unpack.item().unwrap() {
            FsItem::Unarchive {
                extract_path,
                patterns,
                overwrite,
                ..
            } => {
                assert_eq!(extract_path, Path::new("restored"));
                assert_eq!(patterns, &["**/*.bin"]);
                assert!(overwrite);
            }
            other => panic!("expected unarchive item, got {:?}", other),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let pipeline = sample_pipeline();
        let doc = to_document(&pipeline, "json plan").unwrap();
        let json = doc.to_json().unwrap();
        let parsed = PlanDocument::from_json(&json).unwrap();
        assert_eq!(parsed.operations.len(), doc.operations.len());
        assert_eq!(parsed.metadata.description, "json plan");
    }

    #[test]
    fn test_custom_operations_rejected() {
        let mut pipeline = Pipeline::new();
        pipeline
            .add(Operation::custom(
                "cb",
                "x",
                CustomCallbacks::new(|_| Ok(None)),
            ))
            .unwrap();
        assert!(to_document(&pipeline, "nope").is_err());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let doc = PlanDocument {
            metadata: PlanMetadata {
                version: PLAN_VERSION.to_string(),
                description: String::new(),
            },
            operations: vec![PlanOperation {
                kind: "teleport".to_string(),
                id: "bad".to_string(),
                dependencies: vec![],
                parameters: Map::new(),
            }],
        };
        assert!(from_document(&doc).is_err());
    }
}
