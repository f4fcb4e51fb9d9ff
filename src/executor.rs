//! Pipeline execution.
//!
//! A run is single-threaded, synchronous, and request-scoped: records
//! are pulled into an in-memory [`Table`] owned exclusively by the call,
//! stages apply in order, and the final table replaces the output
//! dataset's records in one atomic store operation. Concurrent runs of
//! the same pipeline against the same output dataset are last-writer-
//! wins and must be serialized by the caller.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PipelineError, Warning, Warnings};
use crate::ops;
use crate::stage::{StageDef, StageKind};
use crate::store::{DatasetId, DatasetStore};
use crate::table::Table;
use crate::validate;

/// A processing pipeline: an input binding, an optional output binding,
/// and an ordered chain of stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,

    /// Dataset the run reads from. Executing without one fails.
    #[serde(default)]
    pub input_dataset: Option<DatasetId>,

    /// Dataset the run writes to. Unbound pipelines get a dataset
    /// created and bound on their first successful run; the binding is
    /// permanent after that.
    #[serde(default)]
    pub output_dataset: Option<DatasetId>,

    /// Name for the output dataset created on first run. Defaults to
    /// `"{name}_output"`.
    #[serde(default)]
    pub output_dataset_name: Option<String>,

    #[serde(default)]
    pub stages: Vec<StageDef>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Pipeline {
            name: name.into(),
            input_dataset: None,
            output_dataset: None,
            output_dataset_name: None,
            stages: Vec::new(),
        }
    }

    /// Replace the whole stage chain, renumbering `order` from 1.
    /// Pipelines are never partially patched: an update swaps every
    /// stage at once.
    pub fn replace_stages(&mut self, stages: Vec<StageDef>) {
        self.stages = stages;
        for (i, stage) in self.stages.iter_mut().enumerate() {
            stage.order = i as i32 + 1;
        }
    }

    /// Stages in execution order: ascending `order`, ties broken by
    /// insertion order.
    fn ordered_stages(&self) -> Vec<StageDef> {
        let mut stages = self.stages.clone();
        stages.sort_by_key(|s| s.order);
        stages
    }
}

/// One line of the per-run execution log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageLogEntry {
    /// Stage label (configured name or stage kind).
    pub module: String,
    #[serde(rename = "type")]
    pub kind: StageKind,
    pub before_count: usize,
    pub after_count: usize,
    /// `before_count - after_count`; negative when a stage added rows.
    pub records_affected: i64,
}

/// Successful run result: row counts, the output binding, the per-stage
/// execution log, and any stage-level warnings collected along the way.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub original_count: usize,
    pub processed_count: usize,
    pub output_dataset_id: DatasetId,
    pub output_dataset_name: String,
    pub execution_log: Vec<StageLogEntry>,
    pub warnings: Vec<Warning>,
}

/// Executes pipelines against a [`DatasetStore`].
#[derive(Debug, Default)]
pub struct PipelineRunner;

impl PipelineRunner {
    pub fn new() -> Self {
        Self
    }

    /// Run `pipeline` end to end.
    ///
    /// Loads the input dataset, validates the stage chain against it,
    /// applies each stage in order while recording before/after row
    /// counts, then atomically replaces the output dataset's records.
    /// On the first successful run of an unbound pipeline the output
    /// dataset is created (inheriting the input's data source) and
    /// bound permanently.
    ///
    /// # Errors
    ///
    /// Fails without touching any output when the input is unbound or
    /// empty, when validation finds a structural problem, or when the
    /// store fails. Stage-level problems never fail a run; they degrade
    /// to no-ops and surface in [`ExecutionReport::warnings`].
    pub fn execute<S: DatasetStore>(
        &self,
        store: &mut S,
        pipeline: &mut Pipeline,
    ) -> Result<ExecutionReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline_run", run = %run_id, pipeline = %pipeline.name);
        let _guard = span.enter();

        let input = pipeline.input_dataset.ok_or(PipelineError::MissingInput)?;
        let records = store.load_records(input)?;
        if records.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let mut table = Table::from_records(records);
        let stages = pipeline.ordered_stages();
        validate::validate(&table, &stages)?;

        let original_count = table.len();
        let mut warnings = Warnings::new();
        let mut execution_log = Vec::with_capacity(stages.len());

        for stage in &stages {
            let before_count = table.len();
            table = ops::apply_stage(&table, stage, &mut warnings);
            let after_count = table.len();
            tracing::debug!(
                stage = stage.label(),
                kind = %stage.kind,
                before_count,
                after_count,
                "stage applied"
            );
            execution_log.push(StageLogEntry {
                module: stage.label().to_string(),
                kind: stage.kind,
                before_count,
                after_count,
                records_affected: before_count as i64 - after_count as i64,
            });
        }

        let (output, created) = match pipeline.output_dataset {
            Some(id) => (id, false),
            None => {
                let name = pipeline
                    .output_dataset_name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| format!("{}_output", pipeline.name));
                let source = store.data_source(input)?;
                (store.create_dataset(&name, source.as_deref())?, true)
            }
        };

        // a failed commit rolls back a dataset created for this run, so
        // retries never accumulate empty orphans
        let processed_count = match store.replace_records(output, table.into_rows()) {
            Ok(count) => count,
            Err(e) => {
                if created
                    && let Err(rollback) = store.delete_dataset(output)
                {
                    tracing::warn!(dataset = %output, "rollback failed: {rollback}");
                }
                return Err(e.into());
            }
        };
        // bind only after the records landed, so a failed run never binds
        if pipeline.output_dataset.is_none() {
            pipeline.output_dataset = Some(output);
        }
        let output_dataset_name = store.dataset_name(output)?;

        tracing::info!(
            original_count,
            processed_count,
            output = %output,
            "pipeline executed"
        );

        Ok(ExecutionReport {
            original_count,
            processed_count,
            output_dataset_id: output,
            output_dataset_name,
            execution_log,
            warnings: warnings.into_vec(),
        })
    }
}
