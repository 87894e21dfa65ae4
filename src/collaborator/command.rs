//! Collaborators backed by external executables
//!
//! Each step runs synchronously and blocks until the child exits. There is
//! no timeout: a hung child hangs the pipeline.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use super::{DatasetTransfer, Evaluator, Materializer, Preprocessor, Trainer};
use crate::grid::AugmentationParameterSet;
use crate::{Error, Result};

/// A program plus its leading arguments.
///
/// Step-specific arguments are appended after `args` at each invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCommand {
    program: String,
    #[serde(default)]
    args: Vec<String>,
}

impl ExternalCommand {
    /// Create a command with no leading arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Create a command from an argv-style list (`[program, args...]`).
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `argv` is empty.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Config("command must name a program".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Append a leading argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Get the program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Get the leading arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run the command with `extra` appended and wait for it to exit.
    ///
    /// Returns captured stdout on success.
    ///
    /// # Errors
    ///
    /// Returns `Error::Spawn` if the program cannot be started and
    /// `Error::ExternalCommand` (with the child's stderr) on a non-zero exit.
    pub fn run<I>(&self, extra: I) -> Result<String>
    where
        I: IntoIterator,
        I::Item: Into<OsString>,
    {
        let output: Output = Command::new(&self.program)
            .args(&self.args)
            .args(extra.into_iter().map(Into::into))
            .output()
            .map_err(|source| Error::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::ExternalCommand {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run the command and read an output path from the last non-empty stdout line.
    ///
    /// # Errors
    ///
    /// Same as [`ExternalCommand::run`], plus `Error::MissingOutputPath` if
    /// stdout is empty.
    pub fn run_for_path<I>(&self, extra: I) -> Result<PathBuf>
    where
        I: IntoIterator,
        I::Item: Into<OsString>,
    {
        let stdout = self.run(extra)?;
        stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .last()
            .map(PathBuf::from)
            .ok_or_else(|| Error::MissingOutputPath {
                program: self.program.clone(),
            })
    }
}

/// Runs `<cmd> <out_dir> <params-json>`.
#[derive(Debug, Clone)]
pub struct CommandPreprocessor {
    command: ExternalCommand,
}

impl CommandPreprocessor {
    /// Wrap a preprocessing command.
    #[must_use]
    pub const fn new(command: ExternalCommand) -> Self {
        Self { command }
    }
}

impl Preprocessor for CommandPreprocessor {
    fn preprocess(&self, out_dir: &Path, params: &AugmentationParameterSet) -> anyhow::Result<()> {
        let payload = serde_json::to_string(params)?;
        self.command
            .run([out_dir.as_os_str().to_owned(), OsString::from(payload)])
            .with_context(|| format!("preprocessing into {}", out_dir.display()))?;
        Ok(())
    }
}

/// Runs `<script> <dataset_dir> <run_id>` (the cluster upload script).
#[derive(Debug, Clone)]
pub struct TransferScript {
    command: ExternalCommand,
}

impl TransferScript {
    /// Wrap a transfer script.
    #[must_use]
    pub const fn new(command: ExternalCommand) -> Self {
        Self { command }
    }
}

impl DatasetTransfer for TransferScript {
    fn transfer(&self, dataset: &Path, run_id: &str) -> anyhow::Result<()> {
        self.command
            .run([dataset.as_os_str().to_owned(), OsString::from(run_id)])
            .with_context(|| format!("transferring {}", dataset.display()))?;
        Ok(())
    }
}

/// Runs `<cmd> <preprocessed> <dest_dir>` and reads the dataset path from stdout.
#[derive(Debug, Clone)]
pub struct CommandMaterializer {
    command: ExternalCommand,
}

impl CommandMaterializer {
    /// Wrap a materialization command.
    #[must_use]
    pub const fn new(command: ExternalCommand) -> Self {
        Self { command }
    }
}

impl Materializer for CommandMaterializer {
    fn materialize(&self, preprocessed: &Path, dest_dir: &Path) -> anyhow::Result<PathBuf> {
        let path = self
            .command
            .run_for_path([preprocessed.as_os_str(), dest_dir.as_os_str()])
            .with_context(|| format!("materializing {}", preprocessed.display()))?;
        Ok(path)
    }
}

/// Runs `<cmd> <hyperparams> <dataset> <models_dir> [--log-wandb] [--smol]`
/// and reads the checkpoint path from stdout.
#[derive(Debug, Clone)]
pub struct CommandTrainer {
    command: ExternalCommand,
    hyperparams_setting: String,
    log_wandb: bool,
    is_smol: bool,
}

impl CommandTrainer {
    /// Wrap a training command.
    #[must_use]
    pub fn new(
        command: ExternalCommand,
        hyperparams_setting: impl Into<String>,
        log_wandb: bool,
        is_smol: bool,
    ) -> Self {
        Self {
            command,
            hyperparams_setting: hyperparams_setting.into(),
            log_wandb,
            is_smol,
        }
    }

    fn step_args(&self, dataset: &Path, models_dir: &Path) -> Vec<OsString> {
        let mut args = vec![
            OsString::from(&self.hyperparams_setting),
            dataset.as_os_str().to_owned(),
            models_dir.as_os_str().to_owned(),
        ];
        if self.log_wandb {
            args.push(OsString::from("--log-wandb"));
        }
        if self.is_smol {
            args.push(OsString::from("--smol"));
        }
        args
    }
}

impl Trainer for CommandTrainer {
    fn train(&self, dataset: &Path, models_dir: &Path) -> anyhow::Result<PathBuf> {
        let path = self
            .command
            .run_for_path(self.step_args(dataset, models_dir))
            .with_context(|| {
                format!(
                    "training {} with hyperparameters {}",
                    dataset.display(),
                    self.hyperparams_setting
                )
            })?;
        Ok(path)
    }
}

/// Runs `<cmd> <model> <validation> <out_dir>` and reads the results path from stdout.
#[derive(Debug, Clone)]
pub struct CommandEvaluator {
    command: ExternalCommand,
}

impl CommandEvaluator {
    /// Wrap an evaluation command.
    #[must_use]
    pub const fn new(command: ExternalCommand) -> Self {
        Self { command }
    }
}

impl Evaluator for CommandEvaluator {
    fn evaluate(&self, model: &Path, validation: &Path, out_dir: &Path) -> anyhow::Result<PathBuf> {
        let path = self
            .command
            .run_for_path([model.as_os_str(), validation.as_os_str(), out_dir.as_os_str()])
            .with_context(|| format!("evaluating {}", model.display()))?;
        Ok(path)
    }
}
