//! Augmentation sweep: preprocess each parameter set, then transfer the result.

use std::path::{Path, PathBuf};

use super::{ItemOutcome, ItemRecord, ItemState, SweepOutcome, Tally};
use crate::collaborator::{DatasetTransfer, Preprocessor};
use crate::config::PreprocessConfig;
use crate::grid::AugmentationParameterSet;
use crate::run::{PipelineKind, RunContext, RunLayout};
use crate::scratch;
use crate::{Error, Result};

/// Runs a preprocessing sweep over augmentation parameter sets.
///
/// For each parameter set the preprocessor writes into the run's scratch
/// directory, which must then hold exactly one `PreProcessed_*` dataset.
/// That dataset is handed to the transfer step, and the scratch directory is
/// cleared before the next parameter set.
pub struct PreprocessingPipeline<P, T> {
    preprocessor: P,
    transfer: T,
    runs_root: PathBuf,
    layout: RunLayout,
}

impl<P: Preprocessor, T: DatasetTransfer> PreprocessingPipeline<P, T> {
    /// Create a pipeline writing runs under `runs_root` with the default
    /// scratch directory and error log names.
    #[must_use]
    pub fn new(preprocessor: P, transfer: T, runs_root: impl Into<PathBuf>) -> Self {
        let defaults = PreprocessConfig::default();
        Self {
            preprocessor,
            transfer,
            runs_root: runs_root.into(),
            layout: RunLayout::new(PipelineKind::Preprocessing, defaults.error_log)
                .with_scratch_dir(defaults.scratch_dir),
        }
    }

    /// Create a pipeline using the directory names from `config`.
    #[must_use]
    pub fn from_config(preprocessor: P, transfer: T, config: &PreprocessConfig) -> Self {
        Self {
            preprocessor,
            transfer,
            runs_root: config.runs_root.clone(),
            layout: RunLayout::new(PipelineKind::Preprocessing, config.error_log.clone())
                .with_scratch_dir(config.scratch_dir.clone()),
        }
    }

    /// Layout of the run directories this pipeline creates.
    #[must_use]
    pub const fn layout(&self) -> &RunLayout {
        &self.layout
    }

    /// Create a fresh run and sweep `combinations` in order.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned: run directory creation, error log
    /// writes, scratch cleanup. Per-item failures are counted in the outcome.
    pub fn run(&self, combinations: &[AugmentationParameterSet]) -> Result<SweepOutcome> {
        let run = RunContext::create(&self.runs_root, &self.layout)?;
        self.run_in(&run, combinations)
    }

    /// Sweep `combinations` inside an existing run.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the run has no scratch directory, otherwise
    /// the same fatal errors as [`PreprocessingPipeline::run`].
    pub fn run_in(
        &self,
        run: &RunContext,
        combinations: &[AugmentationParameterSet],
    ) -> Result<SweepOutcome> {
        let scratch_dir = run.scratch_dir().ok_or_else(|| {
            Error::Config(format!(
                "preprocessing run {} has no scratch directory",
                run.run_id()
            ))
        })?;

        tracing::info!(
            run_id = run.run_id(),
            combinations = combinations.len(),
            "starting preprocessing sweep"
        );

        let mut tally = Tally::new(run, combinations.len());
        for (index, params) in combinations.iter().enumerate() {
            let mut record = ItemRecord::new(index, params.to_string());
            let outcome =
                ItemOutcome::from(self.attempt(run, scratch_dir, params, &mut record));
            tally.settle(record, params, outcome, || scratch::clear_dir(scratch_dir))?;
        }
        tally.finish()
    }

    fn attempt(
        &self,
        run: &RunContext,
        scratch_dir: &Path,
        params: &AugmentationParameterSet,
        record: &mut ItemRecord,
    ) -> anyhow::Result<PathBuf> {
        record.enter(ItemState::Preprocessing);
        self.preprocessor.preprocess(scratch_dir, params)?;

        let mut datasets = scratch::find_preprocessed_datasets(scratch_dir)?;
        if datasets.len() != 1 {
            return Err(Error::PreprocessedOutputCount {
                dir: scratch_dir.to_path_buf(),
                found: datasets.len(),
            }
            .into());
        }
        let dataset = datasets.remove(0);

        record.enter(ItemState::Transferring);
        self.transfer.transfer(&dataset, run.run_id())?;
        Ok(dataset)
    }
}
