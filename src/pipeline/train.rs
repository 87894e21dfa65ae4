//! Training pipeline: materialize each preprocessed dataset, then train on it.

use std::fs;
use std::path::{Path, PathBuf};

use super::{ItemOutcome, ItemRecord, ItemState, SweepOutcome, Tally};
use crate::collaborator::{Materializer, Trainer};
use crate::config::TrainConfig;
use crate::run::{PipelineKind, RunContext, RunLayout};
use crate::{Error, Result};

/// Trains one model per preprocessed dataset.
///
/// Datasets are materialized into the run directory. After each item the
/// materialized dataset is deleted, if one was produced.
pub struct TrainingPipeline<M, T> {
    materializer: M,
    trainer: T,
    runs_root: PathBuf,
    layout: RunLayout,
}

impl<M: Materializer, T: Trainer> TrainingPipeline<M, T> {
    /// Create a pipeline writing runs under `runs_root`.
    #[must_use]
    pub fn new(materializer: M, trainer: T, runs_root: impl Into<PathBuf>) -> Self {
        Self {
            materializer,
            trainer,
            runs_root: runs_root.into(),
            layout: RunLayout::new(PipelineKind::Training, TrainConfig::default().error_log),
        }
    }

    /// Create a pipeline using the directory names from `config`.
    #[must_use]
    pub fn from_config(materializer: M, trainer: T, config: &TrainConfig) -> Self {
        Self {
            materializer,
            trainer,
            runs_root: config.runs_root.clone(),
            layout: RunLayout::new(PipelineKind::Training, config.error_log.clone()),
        }
    }

    /// Create a fresh run and train on every dataset, writing checkpoints to `models_dir`.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned: run directory creation, error log
    /// writes, deletion of a materialized dataset.
    pub fn run(&self, datasets: &[PathBuf], models_dir: &Path) -> Result<SweepOutcome> {
        let run = RunContext::create(&self.runs_root, &self.layout)?;
        self.run_in(&run, datasets, models_dir)
    }

    /// Train on every dataset inside an existing run.
    ///
    /// # Errors
    ///
    /// Same as [`TrainingPipeline::run`].
    pub fn run_in(
        &self,
        run: &RunContext,
        datasets: &[PathBuf],
        models_dir: &Path,
    ) -> Result<SweepOutcome> {
        tracing::info!(
            run_id = run.run_id(),
            datasets = datasets.len(),
            models_dir = %models_dir.display(),
            "starting training pipeline"
        );

        let mut tally = Tally::new(run, datasets.len());
        for (index, dataset) in datasets.iter().enumerate() {
            let mut record = ItemRecord::new(index, dataset.display().to_string());
            let mut materialized = None;
            let outcome = ItemOutcome::from(self.attempt(
                run,
                dataset,
                models_dir,
                &mut record,
                &mut materialized,
            ));
            tally.settle(record, &dataset.display(), outcome, || {
                remove_materialized(materialized.as_deref())
            })?;
        }
        tally.finish()
    }

    fn attempt(
        &self,
        run: &RunContext,
        dataset: &Path,
        models_dir: &Path,
        record: &mut ItemRecord,
        materialized: &mut Option<PathBuf>,
    ) -> anyhow::Result<PathBuf> {
        record.enter(ItemState::Materializing);
        let processed = self.materializer.materialize(dataset, run.run_dir())?;
        *materialized = Some(processed.clone());

        record.enter(ItemState::Training);
        self.trainer.train(&processed, models_dir)
    }
}

/// Delete a materialized dataset. `None` means materialization never finished.
fn remove_materialized(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let cleanup_err = |source: std::io::Error| Error::Cleanup {
        path: path.to_path_buf(),
        source,
    };
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).map_err(cleanup_err),
        Ok(_) => fs::remove_file(path).map_err(cleanup_err),
        // Already gone: the trainer may consume its input.
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(cleanup_err(err)),
    }
}
