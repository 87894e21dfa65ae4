//! Preprocessing sweep tests
//!
//! The preprocessing and transfer collaborators are stubbed with closures;
//! each test gets its own runs root under a temp directory.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

use groove_sweep::grid::{combinations, AugmentationParameterSet};
use groove_sweep::run::{PipelineKind, RunContext, RunLayout};
use groove_sweep::{Error, ItemState, PreprocessingPipeline};

fn smoke_sweep() -> Vec<AugmentationParameterSet> {
    combinations(&[1], &[1, 2], &[0.5], 42, &serde_json::Value::Null).unwrap()
}

fn write_dataset(out_dir: &Path, params: &AugmentationParameterSet) -> anyhow::Result<()> {
    let dataset = out_dir.join(format!(
        "PreProcessed_t{}_r{}",
        params.num_transformations(),
        params.num_replacements()
    ));
    fs::create_dir_all(&dataset)?;
    fs::write(dataset.join("hvo.pkl"), b"hvo")?;
    Ok(())
}

fn failure_entries(log: &Path) -> Vec<String> {
    fs::read_to_string(log)
        .unwrap()
        .lines()
        .filter(|line| line.starts_with("Error "))
        .map(str::to_string)
        .collect()
}

fn preprocessing_run(root: &Path, run_id: &str) -> RunContext {
    let layout = RunLayout::new(PipelineKind::Preprocessing, "preprocessing_errors.log")
        .with_scratch_dir("pre_out");
    RunContext::create_with_id(root, run_id, &layout).unwrap()
}

#[test]
fn test_all_succeed() {
    let root = tempfile::tempdir().unwrap();
    let transferred = RefCell::new(Vec::new());
    let transfer = |dataset: &Path, run_id: &str| -> anyhow::Result<()> {
        let name = dataset.file_name().unwrap().to_string_lossy().into_owned();
        transferred.borrow_mut().push((name, run_id.to_string()));
        Ok(())
    };

    let pipeline = PreprocessingPipeline::new(write_dataset, transfer, root.path());
    let outcome = pipeline.run(&smoke_sweep()).unwrap();

    assert_eq!(outcome.attempted(), 2);
    assert_eq!(outcome.failed(), 0);
    assert_eq!(outcome.succeeded(), 2);

    let log = fs::read_to_string(outcome.error_log()).unwrap();
    assert_eq!(
        log,
        format!("Preprocessing error log for run {}\n", outcome.run_id())
    );

    let transferred = transferred.borrow();
    assert_eq!(transferred.len(), 2);
    assert_eq!(transferred[0].0, "PreProcessed_t1_r1");
    assert_eq!(transferred[1].0, "PreProcessed_t1_r2");
    assert!(transferred.iter().all(|(_, id)| id == outcome.run_id()));
}

#[test]
fn test_run_directory_layout() {
    let root = tempfile::tempdir().unwrap();
    let transfer = |_: &Path, _: &str| -> anyhow::Result<()> { Ok(()) };

    let pipeline = PreprocessingPipeline::new(write_dataset, transfer, root.path());
    let outcome = pipeline.run(&smoke_sweep()).unwrap();

    let run_dir = root.path().join(outcome.run_id());
    assert!(outcome.run_id().parse::<i64>().is_ok());
    assert!(run_dir.join("pre_out").is_dir());
    assert_eq!(outcome.error_log(), run_dir.join("preprocessing_errors.log"));
    assert!(run_dir.join("summary.json").is_file());
}

#[test]
fn test_second_transfer_fails() {
    let root = tempfile::tempdir().unwrap();
    let calls = Cell::new(0);
    let transfer = |_: &Path, _: &str| -> anyhow::Result<()> {
        calls.set(calls.get() + 1);
        if calls.get() == 2 {
            anyhow::bail!("rsync: connection refused");
        }
        Ok(())
    };

    let pipeline = PreprocessingPipeline::new(write_dataset, transfer, root.path());
    let outcome = pipeline.run(&smoke_sweep()).unwrap();

    assert_eq!(outcome.attempted(), 2);
    assert_eq!(outcome.failed(), 1);

    let entries = failure_entries(outcome.error_log());
    assert_eq!(entries.len(), 1);
    assert!(entries[0].starts_with("Error preprocessing with data aug params: "));
    assert!(entries[0].contains("num_replacements=2"));
    assert!(entries[0].contains("Stack trace: rsync: connection refused"));

    let items = outcome.items();
    assert!(items[0].succeeded());
    assert!(!items[1].succeeded());
    assert!(items.iter().all(|item| item.state() == ItemState::Cleaned));
}

#[test]
fn test_zero_outputs_is_item_failure() {
    let root = tempfile::tempdir().unwrap();
    let run = preprocessing_run(root.path(), "1");
    let preprocess = |_: &Path, _: &AugmentationParameterSet| -> anyhow::Result<()> { Ok(()) };
    let transfer = |_: &Path, _: &str| -> anyhow::Result<()> {
        panic!("transfer must not run without a dataset")
    };

    let pipeline = PreprocessingPipeline::new(preprocess, transfer, root.path());
    let outcome = pipeline.run_in(&run, &smoke_sweep()[..1]).unwrap();

    assert_eq!((outcome.attempted(), outcome.failed()), (1, 1));
    let entries = failure_entries(outcome.error_log());
    assert_eq!(entries.len(), 1);
    assert!(entries[0].contains("found 0"));
}

#[test]
fn test_two_outputs_is_item_failure_and_sweep_continues() {
    let root = tempfile::tempdir().unwrap();
    let run = preprocessing_run(root.path(), "2");
    let preprocess = |out: &Path, params: &AugmentationParameterSet| -> anyhow::Result<()> {
        write_dataset(out, params)?;
        if params.num_replacements() == 1 {
            fs::create_dir(out.join("PreProcessed_duplicate"))?;
        }
        Ok(())
    };
    let transferred = Cell::new(0);
    let transfer = |_: &Path, _: &str| -> anyhow::Result<()> {
        transferred.set(transferred.get() + 1);
        Ok(())
    };

    let pipeline = PreprocessingPipeline::new(preprocess, transfer, root.path());
    let outcome = pipeline.run_in(&run, &smoke_sweep()).unwrap();

    assert_eq!((outcome.attempted(), outcome.failed()), (2, 1));
    assert_eq!(transferred.get(), 1);
    let entries = failure_entries(outcome.error_log());
    assert_eq!(entries.len(), 1);
    assert!(entries[0].contains("num_replacements=1"));
    assert!(entries[0].contains("found 2"));
}

#[test]
fn test_preprocessor_error_is_logged() {
    let root = tempfile::tempdir().unwrap();
    let preprocess = |_: &Path, _: &AugmentationParameterSet| -> anyhow::Result<()> {
        Err(anyhow::anyhow!("seed examples missing").context("augmenting"))
    };
    let transfer = |_: &Path, _: &str| -> anyhow::Result<()> { Ok(()) };

    let pipeline = PreprocessingPipeline::new(preprocess, transfer, root.path());
    let outcome = pipeline.run(&smoke_sweep()).unwrap();

    assert_eq!(outcome.failed(), 2);
    let entries = failure_entries(outcome.error_log());
    assert_eq!(entries.len(), 2);
    assert!(entries
        .iter()
        .all(|e| e.contains("augmenting: seed examples missing")));
}

#[test]
fn test_scratch_cleared_after_every_item() {
    let root = tempfile::tempdir().unwrap();
    let run = preprocessing_run(root.path(), "3");
    let scratch = run.scratch_dir().unwrap().to_path_buf();
    let seen_empty = RefCell::new(Vec::new());

    let preprocess = |out: &Path, params: &AugmentationParameterSet| -> anyhow::Result<()> {
        seen_empty
            .borrow_mut()
            .push(fs::read_dir(out)?.next().is_none());
        write_dataset(out, params)?;
        fs::write(out.join("stray.log"), b"x")?;
        Ok(())
    };
    let transfer = |_: &Path, _: &str| -> anyhow::Result<()> {
        anyhow::bail!("exit status: 1: Permission denied (publickey)")
    };

    let pipeline = PreprocessingPipeline::new(preprocess, transfer, root.path());
    let outcome = pipeline.run_in(&run, &smoke_sweep()).unwrap();

    assert_eq!(outcome.failed(), 2);
    assert_eq!(*seen_empty.borrow(), vec![true, true]);
    assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
    assert!(failure_entries(outcome.error_log())
        .iter()
        .all(|e| e.contains("Permission denied (publickey)")));
}

#[cfg(unix)]
#[test]
fn test_transfer_script_exit_code_is_item_failure() {
    use groove_sweep::collaborator::{ExternalCommand, TransferScript};

    let root = tempfile::tempdir().unwrap();
    let script = ExternalCommand::new("sh")
        .arg("-c")
        .arg("echo \"no route to cluster for $2\" >&2; exit 1")
        .arg("sh");

    let pipeline =
        PreprocessingPipeline::new(write_dataset, TransferScript::new(script), root.path());
    let outcome = pipeline.run(&smoke_sweep()).unwrap();

    assert_eq!((outcome.attempted(), outcome.failed()), (2, 2));
    let entries = failure_entries(outcome.error_log());
    assert_eq!(entries.len(), 2);
    assert!(entries[0].contains(&format!("no route to cluster for {}", outcome.run_id())));
    let scratch: PathBuf = root.path().join(outcome.run_id()).join("pre_out");
    assert_eq!(fs::read_dir(scratch).unwrap().count(), 0);
}

#[test]
fn test_empty_sweep() {
    let root = tempfile::tempdir().unwrap();
    let transfer = |_: &Path, _: &str| -> anyhow::Result<()> { Ok(()) };
    let pipeline = PreprocessingPipeline::new(write_dataset, transfer, root.path());

    let outcome = pipeline.run(&[]).unwrap();
    assert_eq!((outcome.attempted(), outcome.failed()), (0, 0));
}

#[test]
fn test_run_without_scratch_dir_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(PipelineKind::Preprocessing, "errors.log");
    let run = RunContext::create_with_id(root.path(), "4", &layout).unwrap();
    let transfer = |_: &Path, _: &str| -> anyhow::Result<()> { Ok(()) };

    let pipeline = PreprocessingPipeline::new(write_dataset, transfer, root.path());
    assert!(matches!(
        pipeline.run_in(&run, &smoke_sweep()),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_unwritable_runs_root_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    let blocker = root.path().join("not-a-dir");
    fs::write(&blocker, b"file").unwrap();
    let transfer = |_: &Path, _: &str| -> anyhow::Result<()> { Ok(()) };

    let pipeline = PreprocessingPipeline::new(write_dataset, transfer, &blocker);
    assert!(matches!(
        pipeline.run(&smoke_sweep()),
        Err(Error::RunDirectory { .. })
    ));
}

#[test]
fn test_scratch_cleanup_failure_aborts_run() {
    let root = tempfile::tempdir().unwrap();
    let run = preprocessing_run(root.path(), "5");
    let scratch = run.scratch_dir().unwrap().to_path_buf();
    let calls = Cell::new(0);
    // Replacing the scratch directory with a file leaves nothing clear_dir can list.
    let preprocess = |out: &Path, _: &AugmentationParameterSet| -> anyhow::Result<()> {
        calls.set(calls.get() + 1);
        fs::remove_dir_all(out)?;
        fs::write(out, b"not a directory")?;
        Ok(())
    };
    let transfer = |_: &Path, _: &str| -> anyhow::Result<()> { Ok(()) };

    let pipeline = PreprocessingPipeline::new(preprocess, transfer, root.path());
    let result = pipeline.run_in(&run, &smoke_sweep());

    match result {
        Err(Error::Cleanup { path, .. }) => assert_eq!(path, scratch),
        other => panic!("expected cleanup error, got {other:?}"),
    }
    assert_eq!(calls.get(), 1);
    // The failure was logged before cleanup aborted the run
    assert_eq!(failure_entries(run.error_log().path()).len(), 1);
    assert!(!run.summary_path().exists());
}
