//! Configuration for the sweep, training and evaluation pipelines
//!
//! Every field has a default, and missing fields in a JSON file fall back
//! to those defaults:
//!
//! ```json
//! {
//!   "preprocess": { "grid": { "num_replacements": [1, 2] } },
//!   "train": { "hyperparams_setting": "solar-shadow" }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::collaborator::ExternalCommand;
use crate::grid::{AugmentationParameterSet, ParameterGrid};
use crate::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration format version.
    pub version: String,
    /// Preprocessing sweep section.
    pub preprocess: PreprocessConfig,
    /// Training pipeline section.
    pub train: TrainConfig,
    /// Evaluation pipeline section.
    pub evaluate: EvaluateConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            preprocess: PreprocessConfig::default(),
            train: TrainConfig::default(),
            evaluate: EvaluateConfig::default(),
        }
    }
}

/// Axes of an augmentation sweep, as written in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Transformation counts (outer loop).
    pub num_transformations: Vec<u32>,
    /// Replacement counts (middle loop).
    pub num_replacements: Vec<u32>,
    /// Out-of-style probabilities (inner loop).
    pub out_of_style_probs: Vec<f64>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            num_transformations: vec![1],
            num_replacements: vec![1, 2, 4],
            out_of_style_probs: vec![0.0, 0.5, 1.0],
        }
    }
}

impl GridConfig {
    /// Two-combination grid for quick end-to-end checks.
    #[must_use]
    pub fn smoke() -> Self {
        Self {
            num_transformations: vec![1],
            num_replacements: vec![1, 2],
            out_of_style_probs: vec![0.5],
        }
    }

    /// Validate the axes into a [`ParameterGrid`].
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if an axis value is out of range.
    pub fn to_grid(&self) -> Result<ParameterGrid> {
        ParameterGrid::new(
            self.num_transformations.clone(),
            self.num_replacements.clone(),
            self.out_of_style_probs.clone(),
        )
    }
}

/// Preprocessing sweep settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Directory holding one subdirectory per run.
    pub runs_root: PathBuf,
    /// Scratch directory name inside a run directory.
    pub scratch_dir: String,
    /// Error log file name inside a run directory.
    pub error_log: String,
    /// Seed copied into every parameter set.
    pub random_seed: u64,
    /// Style-example sets copied into every parameter set; passed through untouched.
    pub seed_example_sets: serde_json::Value,
    /// Full sweep.
    pub grid: GridConfig,
    /// Smoke-test sweep.
    pub smoke_grid: GridConfig,
    /// Preprocessing command; receives `<out_dir> <params-json>`.
    pub preprocess_command: Vec<String>,
    /// Transfer script; receives `<dataset_dir> <run_id>`.
    pub transfer_script: Vec<String>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            runs_root: PathBuf::from("preprocessing_runs"),
            scratch_dir: "pre_out".to_string(),
            error_log: "preprocessing_errors.log".to_string(),
            random_seed: 42,
            seed_example_sets: serde_json::Value::Null,
            grid: GridConfig::default(),
            smoke_grid: GridConfig::smoke(),
            preprocess_command: vec![
                "python3".to_string(),
                "-m".to_string(),
                "preprocessing".to_string(),
            ],
            transfer_script: vec!["./dataToCluster.sh".to_string()],
        }
    }
}

impl PreprocessConfig {
    /// Expand the full grid, or the smoke grid when `full` is false.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidParameter` if an axis value is out of range.
    pub fn combinations(&self, full: bool) -> Result<Vec<AugmentationParameterSet>> {
        let grid = if full { &self.grid } else { &self.smoke_grid };
        Ok(grid
            .to_grid()?
            .combinations(self.random_seed, &self.seed_example_sets))
    }
}

/// Training pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Directory holding one subdirectory per run.
    pub runs_root: PathBuf,
    /// Error log file name inside a run directory.
    pub error_log: String,
    /// Named hyperparameter setting handed to the trainer.
    pub hyperparams_setting: String,
    /// Report training metrics to Weights & Biases.
    pub log_wandb: bool,
    /// Train the reduced-size model variant.
    pub is_smol: bool,
    /// Materialization command; receives `<preprocessed> <dest_dir>`, prints the dataset path.
    pub materialize_command: Vec<String>,
    /// Training command; receives `<hyperparams> <dataset> <models_dir> [flags]`, prints the
    /// checkpoint path.
    pub train_command: Vec<String>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            runs_root: PathBuf::from("train_runs"),
            error_log: "train_errors.log".to_string(),
            hyperparams_setting: "solar-shadow".to_string(),
            log_wandb: true,
            is_smol: true,
            materialize_command: vec![
                "python3".to_string(),
                "-m".to_string(),
                "learning.training.process".to_string(),
            ],
            train_command: vec![
                "python3".to_string(),
                "-m".to_string(),
                "learning.training.training".to_string(),
            ],
        }
    }
}

/// Evaluation pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluateConfig {
    /// Directory holding one subdirectory per run.
    pub runs_root: PathBuf,
    /// Error log file name inside a run directory.
    pub error_log: String,
    /// Preprocessed validation dataset every model is scored against.
    pub validation_dataset: PathBuf,
    /// Evaluation command; receives `<model> <validation> <out_dir>`, prints the results path.
    pub evaluate_command: Vec<String>,
}

impl Default for EvaluateConfig {
    fn default() -> Self {
        Self {
            runs_root: PathBuf::from("eval_runs"),
            error_log: "eval_errors.log".to_string(),
            validation_dataset: PathBuf::from(
                "AfroCuban_Validation_PreProcessed_On_03_04_2024_at_01_04_hrs",
            ),
            evaluate_command: vec![
                "python3".to_string(),
                "-m".to_string(),
                "learning.evaluation.evaluation".to_string(),
            ],
        }
    }
}

/// Load configuration from a JSON file
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid JSON, or fails
/// [`validate_config`].
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file {}: {e}",
            path.as_ref().display()
        ))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration parameters
///
/// # Errors
///
/// Returns `Error::Config` for empty names or commands, and
/// `Error::InvalidParameter` for out-of-range grid values.
pub fn validate_config(config: &Config) -> Result<()> {
    let pre = &config.preprocess;
    require_name("preprocess.scratch_dir", &pre.scratch_dir)?;
    require_name("preprocess.error_log", &pre.error_log)?;
    if pre.scratch_dir == pre.error_log {
        return Err(Error::Config(
            "preprocess.scratch_dir and preprocess.error_log must differ".to_string(),
        ));
    }
    pre.grid.to_grid()?;
    pre.smoke_grid.to_grid()?;
    require_command("preprocess.preprocess_command", &pre.preprocess_command)?;
    require_command("preprocess.transfer_script", &pre.transfer_script)?;

    let train = &config.train;
    require_name("train.error_log", &train.error_log)?;
    if train.hyperparams_setting.trim().is_empty() {
        return Err(Error::Config(
            "train.hyperparams_setting must not be empty".to_string(),
        ));
    }
    require_command("train.materialize_command", &train.materialize_command)?;
    require_command("train.train_command", &train.train_command)?;

    let eval = &config.evaluate;
    require_name("evaluate.error_log", &eval.error_log)?;
    require_command("evaluate.evaluate_command", &eval.evaluate_command)?;

    Ok(())
}

fn require_name(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{field} must not be empty")));
    }
    if value.contains('/') || value.contains('\\') {
        return Err(Error::Config(format!(
            "{field} must be a plain name, got {value:?}"
        )));
    }
    Ok(())
}

fn require_command(field: &str, argv: &[String]) -> Result<ExternalCommand> {
    ExternalCommand::from_argv(argv)
        .map_err(|_| Error::Config(format!("{field} must name a program")))
}
