//! Error and warning types for the pipeline engine.
//!
//! Two severities exist, and they never mix:
//!
//! - **Stage-level** problems (malformed stage config, missing referenced
//!   column, coercion failures) are non-fatal. The operator returns its
//!   input unchanged and a [`Warning`] is collected; execution continues.
//!   A misconfigured stage must not abort a long pipeline.
//! - **Run-level** problems ([`PipelineError`]) are fatal to the run:
//!   missing or empty input, a validation failure, or a storage failure.
//!   No partial output is ever committed.

use serde::Serialize;
use thiserror::Error;

use crate::store::DatasetId;

/// Fatal, run-level failure. A run that returns one of these produced no
/// execution log and mutated no output dataset.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// The pipeline has no input dataset bound.
    #[error("no input dataset is bound to the pipeline")]
    MissingInput,

    /// The input dataset contains no records.
    #[error("input dataset is empty")]
    EmptyInput,

    /// The dry-run validator found a structural problem before execution.
    #[error("stage '{stage}': {message}")]
    Validation { stage: String, message: String },

    /// The dataset store failed while loading input or committing output.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Build a validation error naming the offending stage.
    pub fn validation(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Failure reported by a [`DatasetStore`](crate::store::DatasetStore).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced dataset does not exist.
    #[error("dataset {0} not found")]
    DatasetNotFound(DatasetId),

    /// The atomic replace-records transaction failed; the dataset keeps
    /// its previous contents.
    #[error("storage transaction failed: {0}")]
    Transaction(String),

    /// Any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A non-fatal, stage-level finding: the stage degraded to a no-op (or
/// skipped part of its work) instead of failing the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// Label of the stage that degraded.
    pub stage: String,
    /// What went wrong, naming the field or config entry involved.
    pub message: String,
}

/// Collector for stage-level warnings over one run.
///
/// Every push also emits a `tracing` warning event, so degraded stages
/// are visible in logs even when the caller drops the report.
#[derive(Debug, Default)]
pub struct Warnings {
    entries: Vec<Warning>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning for `stage`.
    pub fn push(&mut self, stage: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(stage, "{message}");
        self.entries.push(Warning {
            stage: stage.to_string(),
            message,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over collected warnings.
    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.entries.iter()
    }

    /// Consume the collector, yielding the warnings.
    pub fn into_vec(self) -> Vec<Warning> {
        self.entries
    }
}
