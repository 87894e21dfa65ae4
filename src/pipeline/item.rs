//! Item Record - lifecycle of one pipeline item

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::run::FailureDetail;

/// State of an item within a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemState {
    /// Not yet started.
    Pending,
    /// Preprocessing collaborator is running.
    Preprocessing,
    /// Transfer script is running.
    Transferring,
    /// Dataset materialization is running.
    Materializing,
    /// Model training is running.
    Training,
    /// Model evaluation is running.
    Evaluating,
    /// Every step finished.
    Succeeded,
    /// A step failed; the failure is in the error log.
    Failed,
    /// Cleanup finished. Terminal.
    Cleaned,
}

/// Result of running one item's steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// All steps succeeded; carries the item's final artifact.
    Succeeded(PathBuf),
    /// A step failed.
    Failed(FailureDetail),
}

impl From<anyhow::Result<PathBuf>> for ItemOutcome {
    fn from(result: anyhow::Result<PathBuf>) -> Self {
        match result {
            Ok(path) => Self::Succeeded(path),
            Err(err) => Self::Failed(FailureDetail::from_error(&err)),
        }
    }
}

/// Record of one item moving through a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    index: usize,
    subject: String,
    state: ItemState,
    succeeded: bool,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    artifact: Option<PathBuf>,
    error: Option<String>,
}

impl ItemRecord {
    /// Create a record in Pending state.
    ///
    /// # Arguments
    ///
    /// * `index` - Position of the item in the run (0-based)
    /// * `subject` - Human-readable description of the item
    #[must_use]
    pub fn new(index: usize, subject: impl Into<String>) -> Self {
        Self {
            index,
            subject: subject.into(),
            state: ItemState::Pending,
            succeeded: false,
            started_at: None,
            ended_at: None,
            artifact: None,
            error: None,
        }
    }

    /// Position of the item in the run.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Description of the item.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ItemState {
        self.state
    }

    /// Whether the item's steps all succeeded. Stays set after cleanup.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.succeeded
    }

    /// When the first step started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// When the item succeeded or failed.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Artifact produced by a successful item.
    #[must_use]
    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    /// Error trace of a failed item.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Enter a running step. Sets `started_at` on the first step.
    pub fn enter(&mut self, step: ItemState) {
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.state = step;
    }

    /// Move to Succeeded or Failed according to `outcome`.
    pub fn resolve(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Succeeded(path) => {
                self.state = ItemState::Succeeded;
                self.succeeded = true;
                self.artifact = Some(path.clone());
            }
            ItemOutcome::Failed(failure) => {
                self.state = ItemState::Failed;
                self.error = Some(failure.trace().to_string());
            }
        }
        self.ended_at = Some(Utc::now());
    }

    /// Mark cleanup as done.
    pub fn clean(&mut self) {
        self.state = ItemState::Cleaned;
    }
}
