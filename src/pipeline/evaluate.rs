//! Evaluation pipeline: score each trained model against the validation set.

use std::path::{Path, PathBuf};

use super::{ItemOutcome, ItemRecord, ItemState, SweepOutcome, Tally};
use crate::collaborator::Evaluator;
use crate::config::EvaluateConfig;
use crate::run::{PipelineKind, RunContext, RunLayout};
use crate::Result;

/// Evaluates model checkpoints one by one.
///
/// Evaluation results are written into the run directory and kept, so
/// items have no cleanup step.
pub struct EvaluationPipeline<E> {
    evaluator: E,
    validation_dataset: PathBuf,
    runs_root: PathBuf,
    layout: RunLayout,
}

impl<E: Evaluator> EvaluationPipeline<E> {
    /// Create a pipeline writing runs under `runs_root`.
    #[must_use]
    pub fn new(
        evaluator: E,
        validation_dataset: impl Into<PathBuf>,
        runs_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            evaluator,
            validation_dataset: validation_dataset.into(),
            runs_root: runs_root.into(),
            layout: RunLayout::new(PipelineKind::Evaluation, EvaluateConfig::default().error_log),
        }
    }

    /// Create a pipeline from `config`.
    #[must_use]
    pub fn from_config(evaluator: E, config: &EvaluateConfig) -> Self {
        Self {
            evaluator,
            validation_dataset: config.validation_dataset.clone(),
            runs_root: config.runs_root.clone(),
            layout: RunLayout::new(PipelineKind::Evaluation, config.error_log.clone()),
        }
    }

    /// Validation dataset every model is scored against.
    #[must_use]
    pub fn validation_dataset(&self) -> &Path {
        &self.validation_dataset
    }

    /// Create a fresh run and evaluate every model.
    ///
    /// # Errors
    ///
    /// Only fatal errors are returned: run directory creation, error log writes.
    pub fn run(&self, models: &[PathBuf]) -> Result<SweepOutcome> {
        let run = RunContext::create(&self.runs_root, &self.layout)?;
        self.run_in(&run, models)
    }

    /// Evaluate every model inside an existing run.
    ///
    /// # Errors
    ///
    /// Same as [`EvaluationPipeline::run`].
    pub fn run_in(&self, run: &RunContext, models: &[PathBuf]) -> Result<SweepOutcome> {
        tracing::info!(
            run_id = run.run_id(),
            models = models.len(),
            validation = %self.validation_dataset.display(),
            "starting evaluation pipeline"
        );

        let mut tally = Tally::new(run, models.len());
        for (index, model) in models.iter().enumerate() {
            let mut record = ItemRecord::new(index, model.display().to_string());
            record.enter(ItemState::Evaluating);
            let outcome = ItemOutcome::from(self.evaluator.evaluate(
                model,
                &self.validation_dataset,
                run.run_dir(),
            ));
            tally.settle(record, &model.display(), outcome, || Ok(()))?;
        }
        tally.finish()
    }
}
