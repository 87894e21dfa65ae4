//! Run directories
//!
//! Every pipeline invocation gets its own directory named after its run id:
//!
//! ```text
//! <runs_root>/<run_id>/
//!     <scratch_dir>/      (preprocessing only; cleared after every item)
//!     <error_log>         (header line, then one entry per failed item)
//!     summary.json        (written when the pipeline finishes)
//! ```
//!
//! The runner never deletes a run directory.

mod error_log;

pub use error_log::{ErrorLog, FailureDetail, PipelineKind};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::{Error, Result};

/// File name of the run summary written at the end of a pipeline.
pub const SUMMARY_FILE: &str = "summary.json";

/// Names of the entries inside a run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    kind: PipelineKind,
    error_log_name: String,
    scratch_dir_name: Option<String>,
}

impl RunLayout {
    /// Layout with an error log and no scratch directory.
    #[must_use]
    pub fn new(kind: PipelineKind, error_log_name: impl Into<String>) -> Self {
        Self {
            kind,
            error_log_name: error_log_name.into(),
            scratch_dir_name: None,
        }
    }

    /// Add a scratch directory to the layout.
    #[must_use]
    pub fn with_scratch_dir(mut self, name: impl Into<String>) -> Self {
        self.scratch_dir_name = Some(name.into());
        self
    }

    /// Pipeline the layout belongs to.
    #[must_use]
    pub const fn kind(&self) -> PipelineKind {
        self.kind
    }
}

/// Identity and on-disk location of one pipeline invocation.
#[derive(Debug)]
pub struct RunContext {
    run_id: String,
    run_dir: PathBuf,
    scratch_dir: Option<PathBuf>,
    error_log: ErrorLog,
}

impl RunContext {
    /// Create a run named after the current wall-clock second.
    ///
    /// Two runs started within the same second under the same root collide;
    /// the second one fails with `Error::RunDirectory` instead of reusing the
    /// first one's directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::RunDirectory` if the directories cannot be created and
    /// `Error::ErrorLog` if the log header cannot be written.
    pub fn create<P: AsRef<Path>>(runs_root: P, layout: &RunLayout) -> Result<Self> {
        Self::create_with_id(runs_root, &timestamp_run_id(), layout)
    }

    /// Create a run with a caller-supplied id.
    ///
    /// # Errors
    ///
    /// Same as [`RunContext::create`].
    pub fn create_with_id<P: AsRef<Path>>(
        runs_root: P,
        run_id: &str,
        layout: &RunLayout,
    ) -> Result<Self> {
        let runs_root = runs_root.as_ref();
        let run_dir = runs_root.join(run_id);
        fs::create_dir_all(runs_root).map_err(run_dir_error(runs_root))?;
        fs::create_dir(&run_dir).map_err(run_dir_error(&run_dir))?;

        let scratch_dir = match &layout.scratch_dir_name {
            Some(name) => {
                let scratch = run_dir.join(name);
                fs::create_dir(&scratch).map_err(run_dir_error(&scratch))?;
                Some(scratch)
            }
            None => None,
        };

        let error_log =
            ErrorLog::create(run_dir.join(&layout.error_log_name), layout.kind, run_id)?;

        tracing::info!(
            run_id,
            run_dir = %run_dir.display(),
            kind = ?layout.kind,
            "created run directory"
        );

        Ok(Self {
            run_id: run_id.to_string(),
            run_dir,
            scratch_dir,
            error_log,
        })
    }

    /// Get the run id.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the run directory.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Get the scratch directory, if the layout has one.
    #[must_use]
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }

    /// Get the error log.
    #[must_use]
    pub const fn error_log(&self) -> &ErrorLog {
        &self.error_log
    }

    /// Path of the summary file inside the run directory.
    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.run_dir.join(SUMMARY_FILE)
    }
}

fn run_dir_error(path: &Path) -> impl FnOnce(std::io::Error) -> Error {
    let path = path.to_path_buf();
    move |source| Error::RunDirectory { path, source }
}

/// Current Unix time in whole seconds, as a string.
#[must_use]
pub fn timestamp_run_id() -> String {
    Utc::now().timestamp().to_string()
}
