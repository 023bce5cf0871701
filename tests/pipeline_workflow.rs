// tests/pipeline_workflow.rs

//! End-to-end pipeline scenarios against a real (temp-rooted) filesystem.

mod common;

use common::setup;
use forgefs::{
    Error, Executor, OpStatus, Operation, PathHandler, PathMode, Pipeline, PipelineOptions,
    ReadFs, StatFs,
};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[test]
fn test_create_nested_file_in_new_dir() {
    let (_temp, fs) = setup();

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Operation::create_file("mk", "a/b/c.txt", b"hi".to_vec(), 0o644))
        .unwrap();

    let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::default());
    assert!(result.success, "errors: {:?}", result.errors);

    assert!(fs.stat(Path::new("a")).unwrap().is_dir());
    assert!(fs.stat(Path::new("a/b")).unwrap().is_dir());
    assert_eq!(fs.read(Path::new("a/b/c.txt")).unwrap(), b"hi");
    #[cfg(unix)]
    {
        assert_eq!(fs.stat(Path::new("a")).unwrap().mode, 0o755);
        assert_eq!(fs.stat(Path::new("a/b")).unwrap().mode, 0o755);
    }
}

#[test]
fn test_copy_then_delete() {
    let (_temp, fs) = setup();
    std::fs::write(_temp.path().join("src.txt"), b"DATA").unwrap();

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Operation::copy("cp", "src.txt", "dst.txt"))
        .unwrap();
    pipeline
        .add(Operation::delete("rm", "src.txt").with_dependency("cp"))
        .unwrap();

    let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::default());
    assert!(result.success, "errors: {:?}", result.errors);

    assert_eq!(fs.read(Path::new("dst.txt")).unwrap(), b"DATA");
    assert!(!fs.exists(Path::new("src.txt")));
}

#[test]
fn test_conflict_failure_with_rollback() {
    let (_temp, fs) = setup();
    std::fs::write(_temp.path().join("x"), b"old").unwrap();

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Operation::create_directory("mkdir-d", "d", 0o755))
        .unwrap();
    pipeline
        .add(Operation::create_file("mkfile", "d/f.txt", b"hi".to_vec(), 0o644))
        .unwrap();
    pipeline
        .add(Operation::create_directory("mkdir-x", "x", 0o755))
        .unwrap();

    let result = Executor::new().run(
        &mut pipeline,
        &fs,
        PipelineOptions::new().with_rollback_on_error(),
    );

    assert!(!result.success);
    match result.error.as_ref().unwrap() {
        Error::Pipeline {
            failed_index,
            total,
            ..
        } => {
            assert_eq!(*failed_index, 3);
            assert_eq!(*total, 3);
        }
        other => panic!("expected pipeline error, got {:?}", other),
    }

    // The created entries were removed again, the clashing file survives
    assert!(!fs.exists(Path::new("d/f.txt")));
    assert!(!fs.exists(Path::new("d")));
    assert_eq!(fs.read(Path::new("x")).unwrap(), b"old");
    let rollback = result.rollback.as_ref().unwrap();
    assert!(rollback.clean(), "rollback errors: {:?}", rollback.errors);
}

#[test]
fn test_restorable_delete_round_trip() {
    let (_temp, fs) = setup();
    std::fs::write(_temp.path().join("f.txt"), b"abc").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(
            _temp.path().join("f.txt"),
            std::fs::Permissions::from_mode(0o640),
        )
        .unwrap();
    }

    let mut pipeline = Pipeline::new();
    pipeline.add(Operation::delete("rm", "f.txt")).unwrap();

    let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::new().restorable(1.0));
    assert!(result.success, "errors: {:?}", result.errors);
    assert!(!fs.exists(Path::new("f.txt")));

    let restore_ops = result.restore_ops();
    assert_eq!(restore_ops.len(), 1);

    let mut restore = restore_ops[0].clone();
    restore.execute(&fs).unwrap();
    assert_eq!(fs.read(Path::new("f.txt")).unwrap(), b"abc");
    #[cfg(unix)]
    assert_eq!(fs.stat(Path::new("f.txt")).unwrap().mode, 0o640);
}

#[test]
fn test_path_escape_rejected() {
    let (_temp, fs) = setup();

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Operation::create_file(
            "evil",
            "../../etc/passwd",
            b"pwned".to_vec(),
            0o644,
        ))
        .unwrap();

    let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::default());
    assert!(!result.success);
    assert!(matches!(result.error, Some(Error::PathEscape(_))));
    assert_eq!(
        result.operation("evil").unwrap().status,
        OpStatus::Validation
    );

    // The path handler rejects the same input directly
    let handler = PathHandler::new("/safe", PathMode::Auto);
    assert!(matches!(
        handler.resolve("../../etc/passwd"),
        Err(Error::PathEscape(_))
    ));
}

#[test]
fn test_cycle_detection_executes_nothing() {
    let (_temp, fs) = setup();

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Operation::create_file("a", "a.txt", b"a".to_vec(), 0o644).with_dependency("b"))
        .unwrap();
    pipeline
        .add(Operation::create_file("b", "b.txt", b"b".to_vec(), 0o644).with_dependency("a"))
        .unwrap();

    let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::default());
    assert!(!result.success);
    assert!(matches!(result.error, Some(Error::DependencyCycle { .. })));
    assert!(!fs.exists(Path::new("a.txt")));
    assert!(!fs.exists(Path::new("b.txt")));
    assert!(result
        .operations
        .iter()
        .all(|r| r.status == OpStatus::Skipped));
}

#[test]
fn test_event_stream_has_monotone_order() {
    let (_temp, fs) = setup();

    let mut pipeline = Pipeline::new();
    for (i, name) in ["one", "two", "three"].iter().enumerate() {
        pipeline
            .add(Operation::create_file(
                *name,
                format!("f{}.txt", i),
                b"x".to_vec(),
                0o644,
            ))
            .unwrap();
    }

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let mut executor = Executor::new();
    executor.events().subscribe(move |event| {
        if event.kind == forgefs::EventKind::OperationPre {
            sink.lock().unwrap().push(event.operation_id.clone());
        }
    });
    let result = executor.run(&mut pipeline, &fs, PipelineOptions::default());
    assert!(result.success);

    let seen = seen.lock().unwrap();
    assert_eq!(*seen, vec!["one", "two", "three"]);
}

#[test]
fn test_idempotent_create_directory() {
    let (_temp, fs) = setup();

    for _ in 0..2 {
        let mut pipeline = Pipeline::new();
        pipeline
            .add(Operation::create_directory("mk", "some/dir", 0o755))
            .unwrap();
        let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::default());
        assert!(result.success, "errors: {:?}", result.errors);
    }
    assert!(fs.stat(Path::new("some/dir")).unwrap().is_dir());
}

#[test]
fn test_validation_ok_implies_execution_has_no_validation_error() {
    let (_temp, fs) = setup();
    std::fs::write(_temp.path().join("seed.txt"), b"seed").unwrap();

    // A batch whose later operations only make sense against the
    // projected effects of earlier ones
    let mut pipeline = Pipeline::new();
    pipeline
        .add(Operation::create_file("mk", "stage/a.txt", b"A".to_vec(), 0o644))
        .unwrap();
    pipeline
        .add(Operation::copy("cp", "stage/a.txt", "stage/b.txt").with_dependency("mk"))
        .unwrap();
    pipeline
        .add(Operation::move_op("mv", "seed.txt", "stage/seed.txt").with_dependency("cp"))
        .unwrap();
    pipeline
        .add(Operation::delete("rm", "stage/b.txt").with_dependency("mv"))
        .unwrap();

    pipeline.validate(&fs).unwrap();

    let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::default());
    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(fs.read(Path::new("stage/a.txt")).unwrap(), b"A");
    assert_eq!(fs.read(Path::new("stage/seed.txt")).unwrap(), b"seed");
    assert!(!fs.exists(Path::new("stage/b.txt")));
    assert!(!fs.exists(Path::new("seed.txt")));
}

#[test]
fn test_generated_ids_with_sequence_generator() {
    let (_temp, fs) = setup();
    forgefs::set_id_generator(Arc::new(forgefs::SequenceIdGenerator::new()));

    let id = Operation::generated_id(forgefs::OpKind::CreateFile, Path::new("gen.txt"));
    assert_eq!(id, "create_file_1");

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Operation::create_file(&id, "gen.txt", b"x".to_vec(), 0o644))
        .unwrap();
    let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::default());
    assert!(result.success);
    assert_eq!(result.operations[0].operation_id, "create_file_1");

    // Restore the default so other tests are unaffected
    forgefs::set_id_generator(Arc::new(forgefs::HashIdGenerator));
}

#[test]
fn test_symlink_workflow() {
    let (_temp, fs) = setup();

    let mut pipeline = Pipeline::new();
    pipeline
        .add(Operation::create_file(
            "data",
            "data/v1/config.toml",
            b"[x]\n".to_vec(),
            0o644,
        ))
        .unwrap();
    pipeline
        .add(Operation::create_symlink("link", "current", "data/v1").with_dependency("data"))
        .unwrap();

    let result = Executor::new().run(&mut pipeline, &fs, PipelineOptions::default());
    assert!(result.success, "errors: {:?}", result.errors);

    #[cfg(unix)]
    {
        assert!(fs.stat(Path::new("current")).unwrap().is_symlink());
        assert_eq!(
            std::fs::read_link(_temp.path().join("current")).unwrap(),
            std::path::PathBuf::from("data/v1")
        );
    }
}
