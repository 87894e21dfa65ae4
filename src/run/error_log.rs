//! Per-run error log
//!
//! Plain text, append-only:
//!
//! ```text
//! Preprocessing error log for run 1711057004
//! Error preprocessing with data aug params: num_transformations=1, .... Stack trace: ...
//! ```

use std::backtrace::BacktraceStatus;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Which pipeline a run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineKind {
    /// Augmentation sweep: preprocess and transfer.
    Preprocessing,
    /// Materialize preprocessed datasets and train models.
    Training,
    /// Evaluate trained models against the validation set.
    Evaluation,
}

impl PipelineKind {
    /// Word used in the log header.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Preprocessing => "Preprocessing",
            Self::Training => "Training",
            Self::Evaluation => "Evaluation",
        }
    }

    /// Verb used in failure entries.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Preprocessing => "preprocessing",
            Self::Training => "training",
            Self::Evaluation => "evaluating",
        }
    }

    /// Label for the item a failure entry refers to.
    #[must_use]
    pub const fn subject_label(self) -> &'static str {
        match self {
            Self::Preprocessing => "data aug params",
            Self::Training => "preprocessed dataset",
            Self::Evaluation => "model",
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Everything recorded about one failed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    message: String,
    trace: String,
    backtrace: Option<String>,
}

impl FailureDetail {
    /// Capture an error: its message, its full cause chain and, when
    /// `RUST_BACKTRACE` enabled capture, its backtrace.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        let backtrace = err.backtrace();
        let backtrace = (backtrace.status() == BacktraceStatus::Captured)
            .then(|| backtrace.to_string());
        Self {
            message: err.to_string(),
            trace: format!("{err:#}"),
            backtrace,
        }
    }

    /// Top-level error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Cause chain on a single line (`outer: inner: root`).
    #[must_use]
    pub fn trace(&self) -> &str {
        &self.trace
    }

    /// Captured backtrace text, if any.
    #[must_use]
    pub fn backtrace(&self) -> Option<&str> {
        self.backtrace.as_deref()
    }
}

/// Handle to a run's error log file.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
    kind: PipelineKind,
}

impl ErrorLog {
    /// Create (or truncate) the log and write its header line.
    ///
    /// # Errors
    ///
    /// Returns `Error::ErrorLog` if the file cannot be written.
    pub fn create(path: PathBuf, kind: PipelineKind, run_id: &str) -> Result<Self> {
        let log_err = |source: std::io::Error| Error::ErrorLog {
            path: path.clone(),
            source,
        };
        let mut file = File::create(&path).map_err(log_err)?;
        writeln!(file, "{} error log for run {run_id}", kind.title()).map_err(log_err)?;
        Ok(Self { path, kind })
    }

    /// Get the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the pipeline kind the log was created for.
    #[must_use]
    pub const fn kind(&self) -> PipelineKind {
        self.kind
    }

    /// Append one failure entry for `subject`.
    ///
    /// # Errors
    ///
    /// Returns `Error::ErrorLog` if the entry cannot be written. A run that
    /// cannot record failures is aborted.
    pub fn append(&self, subject: &dyn fmt::Display, failure: &FailureDetail) -> Result<()> {
        let log_err = |source: std::io::Error| Error::ErrorLog {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(log_err)?;
        file.write_all(self.format_entry(subject, failure).as_bytes())
            .map_err(log_err)
    }

    fn format_entry(&self, subject: &dyn fmt::Display, failure: &FailureDetail) -> String {
        let mut entry = format!(
            "Error {} with {}: {subject}. Stack trace: {}\n",
            self.kind.verb(),
            self.kind.subject_label(),
            failure.trace()
        );
        if let Some(backtrace) = failure.backtrace() {
            for line in backtrace.lines() {
                entry.push_str("    ");
                entry.push_str(line);
                entry.push('\n');
            }
        }
        entry
    }
}
