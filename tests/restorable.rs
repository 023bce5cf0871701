// tests/restorable.rs

//! Restorable-run behavior: backup capture, budget accounting, and
//! rollback that restores deleted content.

mod common;

use common::setup;
use forgefs::{
    ArchiveFormat, BackupType, Error, Executor, FsItem, OpStatus, Operation, Pipeline,
    PipelineOptions, ReadFs, StatFs, WriteFs,
};
use std::path::{Path, PathBuf};

#[test]
fn test_directory_tree_delete_and_restore() {
    let (temp, fs) = setup();
    std::fs::create_dir_all(temp.path().join("proj/src")).unwrap();
    std::fs::write(temp.path().join("proj/readme.md"), b"# proj").unwrap();
    std::fs::write(temp.path().join("proj/src/main.rs"), b"fn main() {}").unwrap();

    let mut pipeline = Pipeline::new();
    pipeline.add(Operation::delete("rm", "proj")).unwrap();

    let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::new().restorable(10.0));
    assert!(result.success, "errors: {:?}", result.errors);
    assert!(!fs.exists(Path::new("proj")));

    let backup = result.operation("rm").unwrap().backup.as_ref().unwrap();
    assert_eq!(backup.backup_type, BackupType::DirectoryTree);
    assert_eq!(backup.skipped_files, 0);

    // Reverse ops recreate the whole tree: directories first
    for op in result.restore_ops() {
        let mut op = op.clone();
        op.execute(&fs).unwrap();
    }
    assert_eq!(fs.read(Path::new("proj/readme.md")).unwrap(), b"# proj");
    assert_eq!(
        fs.read(Path::new("proj/src/main.rs")).unwrap(),
        b"fn main() {}"
    );
}

#[test]
fn test_rollback_restores_deleted_file() {
    let (temp, fs) = setup();
    std::fs::write(temp.path().join("precious.txt"), b"keep me").unwrap();
    std::fs::write(temp.path().join("blocker"), b"file").unwrap();

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Operation::delete("rm", "precious.txt"))
        .unwrap();
    // Fails: a file sits where the directory should go
    pipeline
        .add(Operation::create_directory("clash", "blocker", 0o755).with_dependency("rm"))
        .unwrap();

    let result = Executor::new().run(
        &mut pipeline,
        &fs,
        PipelineOptions::new().restorable(10.0).with_rollback_on_error(),
    );

    assert!(!result.success);
    let rollback = result.rollback.as_ref().unwrap();
    assert!(rollback.clean(), "rollback errors: {:?}", rollback.errors);

    // The restorable rollback brought the deleted file back
    assert_eq!(fs.read(Path::new("precious.txt")).unwrap(), b"keep me");
}

#[test]
fn test_oversized_file_skipped_but_run_succeeds() {
    let (temp, fs) = setup();
    let big = vec![7u8; 2 * 1024 * 1024];
    std::fs::write(temp.path().join("big.bin"), &big).unwrap();

    let mut pipeline = Pipeline::new();
    pipeline.add(Operation::delete("rm", "big.bin")).unwrap();

    let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::new().restorable(1.0));

    // The delete itself succeeds; the missing backup surfaces as an error
    assert!(result.success, "errors: {:?}", result.errors);
    assert!(!fs.exists(Path::new("big.bin")));
    assert_eq!(result.operation("rm").unwrap().status, OpStatus::Success);
    assert!(result.errors.iter().any(|e| e.contains("skipped")));

    let backup = result.operation("rm").unwrap().backup.as_ref().unwrap();
    assert_eq!(backup.skipped_files, 1);
    assert!(result.restore_ops().is_empty());
}

#[test]
fn test_budget_is_shared_across_operations() {
    let (temp, fs) = setup();
    std::fs::write(temp.path().join("a.bin"), vec![1u8; 700 * 1024]).unwrap();
    std::fs::write(temp.path().join("b.bin"), vec![2u8; 700 * 1024]).unwrap();

    let mut pipeline = Pipeline::new();
    pipeline.add(Operation::delete("rm-a", "a.bin")).unwrap();
    pipeline
        .add(Operation::delete("rm-b", "b.bin").with_dependency("rm-a"))
        .unwrap();

    let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::new().restorable(1.0));
    assert!(result.success, "errors: {:?}", result.errors);

    // First delete fits, second exceeds what is left of the shared budget
    assert_eq!(result.operation("rm-a").unwrap().backup.as_ref().unwrap().skipped_files, 0);
    assert_eq!(result.operation("rm-b").unwrap().backup.as_ref().unwrap().skipped_files, 1);

    let budget = result.budget.as_ref().unwrap();
    assert!(budget.used_mb() > 0.6);
    assert!(budget.used_mb() <= budget.total_mb());
}

#[test]
fn test_move_reverse_moves_back() {
    let (temp, fs) = setup();
    std::fs::write(temp.path().join("src.txt"), b"DATA").unwrap();

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Operation::move_op("mv", "src.txt", "out/dst.txt"))
        .unwrap();

    let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::new().restorable(1.0));
    assert!(result.success, "errors: {:?}", result.errors);

    let restore_ops = result.restore_ops();
    assert_eq!(restore_ops.len(), 1);

    let mut back = restore_ops[0].clone();
    back.execute(&fs).unwrap();
    assert_eq!(fs.read(Path::new("src.txt")).unwrap(), b"DATA");
    assert!(!fs.exists(Path::new("out/dst.txt")));
}

#[test]
fn test_archive_workflow_with_reverse() {
    let (temp, fs) = setup();
    std::fs::create_dir_all(temp.path().join("src")).unwrap();
    std::fs::write(temp.path().join("src/a.txt"), b"alpha").unwrap();
    std::fs::write(temp.path().join("src/b.txt"), b"beta").unwrap();

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Operation::create_archive(
            "pack",
            "bundle.tar.gz",
            ArchiveFormat::TarGz,
            vec![PathBuf::from("src")],
        ))
        .unwrap();
    pipeline
        .add(
            Operation::unarchive("unpack", FsItem::unarchive("bundle.tar.gz", "out"))
                .with_dependency("pack"),
        )
        .unwrap();

    let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::new().restorable(10.0));
    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(fs.read(Path::new("out/src/a.txt")).unwrap(), b"alpha");

    // Reverse of the unarchive deletes everything it extracted
    let unpack_reverse = &result.operation("unpack").unwrap().restore_ops;
    assert!(!unpack_reverse.is_empty());
    for op in unpack_reverse {
        let mut op = op.clone();
        op.execute(&fs).unwrap();
    }
    assert!(!fs.exists(Path::new("out/src/a.txt")));
    // The archive itself is untouched by the unarchive reverse
    assert!(fs.exists(Path::new("bundle.tar.gz")));
}

#[test]
fn test_custom_operation_with_rollback_callback() {
    let (_temp, fs) = setup();

    let callbacks = forgefs::CustomCallbacks::new(|fs| {
        fs.write_file(Path::new("flag"), b"on", 0o644)?;
        Ok(Some(serde_json::json!({"wrote": "flag"})))
    })
    .with_rollback(|fs| fs.remove_all(Path::new("flag")));

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Operation::custom("flag-on", "flag", callbacks))
        .unwrap();
    pipeline
        .add(Operation::create_directory("boom", "flag", 0o755).with_dependency("flag-on"))
        .unwrap();

    let result = Executor::new().run(
        &mut pipeline,
        &fs,
        PipelineOptions::new().restorable(1.0).with_rollback_on_error(),
    );

    assert!(!result.success);
    // The custom rollback callback ran as the reverse operation
    assert!(!fs.exists(Path::new("flag")));
}

#[test]
fn test_delete_of_absent_path_is_restorable_noop() {
    let (_temp, fs) = setup();

    let mut pipeline = Pipeline::new();
    pipeline.add(Operation::delete("rm", "ghost")).unwrap();

    let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::new().restorable(1.0));
    assert!(result.success, "errors: {:?}", result.errors);
    assert!(result.restore_ops().is_empty());
    assert_eq!(
        result.operation("rm").unwrap().backup.as_ref().unwrap().backup_type,
        BackupType::None
    );
}

#[test]
fn test_result_always_returned_with_partial_info() {
    let (temp, fs) = setup();
    std::fs::write(temp.path().join("wall"), b"x").unwrap();

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Operation::create_file("ok", "fine.txt", b"fine".to_vec(), 0o644))
        .unwrap();
    pipeline
        .add(Operation::create_directory("boom", "wall", 0o755).with_dependency("ok"))
        .unwrap();

    let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::default());

    // Even on failure the result carries per-operation outcomes
    assert!(!result.success);
    assert!(result.error.is_some());
    assert_eq!(result.operation("ok").unwrap().status, OpStatus::Success);
    assert_eq!(result.operation("boom").unwrap().status, OpStatus::Failure);
    assert!(!result.errors.is_empty());
    assert!(result.duration >= std::time::Duration::ZERO);
    let _: &Error = result.error.as_ref().unwrap();
}
