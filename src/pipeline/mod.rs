//! Fault-tolerant batch pipelines
//!
//! Every pipeline follows the same discipline for each item, in order:
//!
//! ```text
//! Pending ──> <step>... ──> Succeeded | Failed ──> Cleaned
//! ```
//!
//! - A failing step fails only its item: the error is appended to the run's
//!   error log and the loop moves on. Items are never retried.
//! - Cleanup runs after every item, successful or not. A cleanup error
//!   aborts the whole run, as do run-directory and error-log errors.
//! - Items run one at a time; each external step is waited on before the next.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use groove_sweep::grid::{AugmentationParameterSet, ParameterGrid};
//! use groove_sweep::pipeline::PreprocessingPipeline;
//!
//! let grid = ParameterGrid::new(vec![1], vec![1, 2], vec![0.5])?;
//! let params = grid.combinations(42, &serde_json::Value::Null);
//!
//! let preprocess = |out: &Path, p: &AugmentationParameterSet| -> anyhow::Result<()> {
//!     std::fs::create_dir(out.join(format!("PreProcessed_r{}", p.num_replacements())))?;
//!     Ok(())
//! };
//! let transfer = |_dataset: &Path, _run_id: &str| -> anyhow::Result<()> { Ok(()) };
//!
//! let pipeline = PreprocessingPipeline::new(preprocess, transfer, "preprocessing_runs");
//! let outcome = pipeline.run(&params)?;
//! println!("{outcome}");
//! # Ok::<(), groove_sweep::Error>(())
//! ```

mod evaluate;
mod item;
mod preprocess;
mod train;

pub use evaluate::EvaluationPipeline;
pub use item::{ItemOutcome, ItemRecord, ItemState};
pub use preprocess::PreprocessingPipeline;
pub use train::TrainingPipeline;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::run::{PipelineKind, RunContext};
use crate::Result;

/// Aggregate result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepOutcome {
    kind: PipelineKind,
    run_id: String,
    attempted: usize,
    failed: usize,
    error_log: PathBuf,
    items: Vec<ItemRecord>,
}

impl SweepOutcome {
    /// Pipeline that produced the outcome.
    #[must_use]
    pub const fn kind(&self) -> PipelineKind {
        self.kind
    }

    /// Id of the run.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Number of items attempted.
    #[must_use]
    pub const fn attempted(&self) -> usize {
        self.attempted
    }

    /// Number of items that failed.
    #[must_use]
    pub const fn failed(&self) -> usize {
        self.failed
    }

    /// Number of items that succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> usize {
        self.attempted - self.failed
    }

    /// Path of the run's error log.
    #[must_use]
    pub fn error_log(&self) -> &Path {
        &self.error_log
    }

    /// Per-item records, in processing order.
    #[must_use]
    pub fn items(&self) -> &[ItemRecord] {
        &self.items
    }
}

impl fmt::Display for SweepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (done, noun) = match self.kind {
            PipelineKind::Preprocessing => ("Preprocessed", "combinations"),
            PipelineKind::Training => ("Trained on", "datasets"),
            PipelineKind::Evaluation => ("Evaluated", "models"),
        };
        write!(
            f,
            "{done} {} out of {} {noun}. Errors written on {}.",
            self.succeeded(),
            self.attempted,
            self.error_log.display()
        )
    }
}

/// Running per-item bookkeeping shared by the pipelines.
struct Tally<'a> {
    run: &'a RunContext,
    total: usize,
    failed: usize,
    items: Vec<ItemRecord>,
}

impl<'a> Tally<'a> {
    fn new(run: &'a RunContext, total: usize) -> Self {
        Self {
            run,
            total,
            failed: 0,
            items: Vec::with_capacity(total),
        }
    }

    /// Settle an item: record its outcome, log a failure, run `cleanup`.
    ///
    /// Cleanup runs even when the error log cannot be written; the first
    /// fatal error is returned.
    fn settle<F>(
        &mut self,
        mut record: ItemRecord,
        subject: &dyn fmt::Display,
        outcome: ItemOutcome,
        cleanup: F,
    ) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        record.resolve(&outcome);

        let logged = match &outcome {
            ItemOutcome::Succeeded(_) => Ok(()),
            ItemOutcome::Failed(failure) => {
                self.failed += 1;
                tracing::debug!(
                    item = record.index(),
                    error = failure.trace(),
                    "item failed, continuing"
                );
                self.run.error_log().append(subject, failure)
            }
        };
        let cleaned = cleanup();
        logged?;
        cleaned?;

        record.clean();
        self.items.push(record);
        tracing::info!(
            processed = self.items.len(),
            total = self.total,
            kind = %self.run.error_log().kind(),
            "items processed"
        );
        Ok(())
    }

    /// Build the outcome and write it to the run's summary file.
    fn finish(self) -> Result<SweepOutcome> {
        let outcome = SweepOutcome {
            kind: self.run.error_log().kind(),
            run_id: self.run.run_id().to_string(),
            attempted: self.items.len(),
            failed: self.failed,
            error_log: self.run.error_log().path().to_path_buf(),
            items: self.items,
        };
        fs::write(
            self.run.summary_path(),
            serde_json::to_string_pretty(&outcome)?,
        )?;
        tracing::info!(
            run_id = outcome.run_id(),
            attempted = outcome.attempted(),
            failed = outcome.failed(),
            "{outcome}"
        );
        Ok(outcome)
    }
}
