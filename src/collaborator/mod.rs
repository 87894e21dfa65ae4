//! External collaborators
//!
//! The pipelines never augment MIDI, serialize HVO tensors, or train models
//! themselves. They call out through these traits. Command-backed
//! implementations live in [`command`]; tests and embedders can pass plain
//! closures, which implement every trait through blanket impls.
//!
//! All collaborator errors are `anyhow::Error`: they come from code the
//! runner does not own, and are only ever recorded, never matched on.

pub mod command;

pub use command::{
    CommandEvaluator, CommandMaterializer, CommandPreprocessor, CommandTrainer, ExternalCommand,
    TransferScript,
};

use std::path::{Path, PathBuf};

use crate::grid::AugmentationParameterSet;

/// Writes one `PreProcessed_*` dataset directory into `out_dir`.
pub trait Preprocessor {
    /// Preprocess the source data with the given augmentation parameters.
    ///
    /// # Errors
    ///
    /// Any error fails the current item only.
    fn preprocess(&self, out_dir: &Path, params: &AugmentationParameterSet) -> anyhow::Result<()>;
}

/// Ships a preprocessed dataset off the machine (e.g. to a cluster).
pub trait DatasetTransfer {
    /// Transfer `dataset`, tagged with the run it belongs to.
    ///
    /// # Errors
    ///
    /// Any error fails the current item only.
    fn transfer(&self, dataset: &Path, run_id: &str) -> anyhow::Result<()>;
}

/// Turns a preprocessed dataset into a training-ready dataset.
pub trait Materializer {
    /// Materialize `preprocessed` under `dest_dir` and return the new directory.
    ///
    /// # Errors
    ///
    /// Any error fails the current item only.
    fn materialize(&self, preprocessed: &Path, dest_dir: &Path) -> anyhow::Result<PathBuf>;
}

/// Trains a model on a materialized dataset.
pub trait Trainer {
    /// Train on `dataset`, write the checkpoint under `models_dir`, return its path.
    ///
    /// # Errors
    ///
    /// Any error fails the current item only.
    fn train(&self, dataset: &Path, models_dir: &Path) -> anyhow::Result<PathBuf>;
}

/// Evaluates a trained model against a validation dataset.
pub trait Evaluator {
    /// Evaluate `model` and return the directory holding the results.
    ///
    /// # Errors
    ///
    /// Any error fails the current item only.
    fn evaluate(&self, model: &Path, validation: &Path, out_dir: &Path) -> anyhow::Result<PathBuf>;
}

impl<F> Preprocessor for F
where
    F: Fn(&Path, &AugmentationParameterSet) -> anyhow::Result<()>,
{
    fn preprocess(&self, out_dir: &Path, params: &AugmentationParameterSet) -> anyhow::Result<()> {
        self(out_dir, params)
    }
}

impl<F> DatasetTransfer for F
where
    F: Fn(&Path, &str) -> anyhow::Result<()>,
{
    fn transfer(&self, dataset: &Path, run_id: &str) -> anyhow::Result<()> {
        self(dataset, run_id)
    }
}

impl<F> Materializer for F
where
    F: Fn(&Path, &Path) -> anyhow::Result<PathBuf>,
{
    fn materialize(&self, preprocessed: &Path, dest_dir: &Path) -> anyhow::Result<PathBuf> {
        self(preprocessed, dest_dir)
    }
}

impl<F> Trainer for F
where
    F: Fn(&Path, &Path) -> anyhow::Result<PathBuf>,
{
    fn train(&self, dataset: &Path, models_dir: &Path) -> anyhow::Result<PathBuf> {
        self(dataset, models_dir)
    }
}

impl<F> Evaluator for F
where
    F: Fn(&Path, &Path, &Path) -> anyhow::Result<PathBuf>,
{
    fn evaluate(&self, model: &Path, validation: &Path, out_dir: &Path) -> anyhow::Result<PathBuf> {
        self(model, validation, out_dir)
    }
}
