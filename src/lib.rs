//! # groove-sweep: Fault-Tolerant Pipeline Runner for Drum-Pattern Experiments
//!
//! groove-sweep drives the batch stages of an HVO (hit/velocity/offset)
//! drum-generation experiment: a data-augmentation sweep over a parameter
//! grid, training on the resulting datasets, and evaluation of the trained
//! models. The actual augmentation, training and evaluation are external
//! collaborators; this crate owns the loop around them.
//!
//! ## Guarantees
//!
//! - **Per-item isolation**: a failing item is logged and skipped, never retried,
//!   and never aborts the run
//! - **Unconditional cleanup**: scratch state is reset after every item
//! - **Fresh run directories**: `<runs_root>/<run_id>` with a header-first error log
//! - **Deterministic sweeps**: nested-loop grid order (transformations,
//!   replacements, out-of-style probability)
//!
//! ## Example
//!
//! ```rust
//! use groove_sweep::grid::combinations;
//!
//! let sweep = combinations(&[1], &[1, 2], &[0.5], 42, &serde_json::Value::Null)?;
//! assert_eq!(sweep.len(), 2);
//! assert_eq!(sweep[1].num_replacements(), 2);
//! # Ok::<(), groove_sweep::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collaborator;
pub mod config;
pub mod error;
pub mod extract;
pub mod grid;
pub mod pipeline;
pub mod run;
pub mod scratch;

pub use config::Config;
pub use error::{Error, Result};
pub use grid::{AugmentationParameterSet, ParameterGrid};
pub use pipeline::{
    EvaluationPipeline, ItemOutcome, ItemRecord, ItemState, PreprocessingPipeline, SweepOutcome,
    TrainingPipeline,
};
pub use run::{ErrorLog, FailureDetail, PipelineKind, RunContext, RunLayout};
