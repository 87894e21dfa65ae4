//! Error types for groove-sweep
//!
//! Two classes of failure flow through this type:
//! - per-item failures (external step errors, output-count violations), which
//!   pipelines record in the run's error log and then skip past;
//! - infrastructure failures (run directory, error log, cleanup), which abort
//!   the whole run.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// groove-sweep error types
#[derive(Error, Debug)]
pub enum Error {
    /// Augmentation parameter outside its valid range
    #[error("Invalid augmentation parameter: {0}")]
    InvalidParameter(String),

    /// Configuration failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Run directory could not be created (fatal)
    #[error("Failed to create run directory {}: {source}", path.display())]
    RunDirectory {
        /// Directory that could not be created
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Error log could not be written (fatal)
    #[error("Failed to write error log {}: {source}", path.display())]
    ErrorLog {
        /// Error log path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Scratch or materialized directory could not be cleared (fatal)
    #[error(
        "Failed to clean up {}: {source}\nScratch state is no longer trustworthy, aborting run.",
        path.display()
    )]
    Cleanup {
        /// Directory being cleaned
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Preprocessing did not leave exactly one dataset directory behind
    #[error("Expected exactly one preprocessed dataset in {}, found {found}", dir.display())]
    PreprocessedOutputCount {
        /// Scratch directory that was scanned
        dir: PathBuf,
        /// Number of matching dataset directories
        found: usize,
    },

    /// Dataset directory could not be copied; no partial copy is left behind
    #[error("Failed to copy dataset {}: {source}", path.display())]
    DatasetCopy {
        /// Entry being copied when the copy failed
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// MIDI pack directory name does not start with a known genre id
    #[error("Unknown genre id in MIDI pack directory {}", dir.display())]
    UnknownGenre {
        /// Genre directory inside the pack
        dir: PathBuf,
    },

    /// External command could not be started
    #[error("Failed to launch external command `{program}`: {source}")]
    Spawn {
        /// Program that failed to start
        program: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// External command exited unsuccessfully
    #[error("External command `{program}` failed ({status}): {stderr}")]
    ExternalCommand {
        /// Program that was run
        program: String,
        /// Rendered exit status
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// External command succeeded but printed no output path
    #[error("External command `{program}` did not report an output path on stdout")]
    MissingOutputPath {
        /// Program that was run
        program: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
