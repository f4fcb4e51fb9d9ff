use rowpipe::{
    DatasetId, DatasetStore, MemoryStore, Pipeline, PipelineError, PipelineRunner, Record,
    StageDef, StageKind, StoreError, Value, cell,
};
use serde_json::json;

fn records(rows: serde_json::Value) -> Vec<Record> {
    serde_json::from_value(rows).unwrap()
}

fn sales_records() -> Vec<Record> {
    records(json!([
        {"city": "A", "sales": 10},
        {"city": "B", "sales": 20},
        {"city": "A", "sales": 5},
    ]))
}

fn rollup_stages() -> Vec<StageDef> {
    vec![
        StageDef::new(
            StageKind::Filter,
            1,
            json!({"field": "sales", "operator": ">", "value": 0}),
        ),
        StageDef::new(
            StageKind::Aggregate,
            2,
            json!({
                "group_by": ["city"],
                "aggregations": [{"field": "sales", "operation": "sum", "output_name": "total"}],
            }),
        ),
    ]
}

#[test]
fn end_to_end_rollup() {
    let mut store = MemoryStore::new();
    let input = store.insert_dataset("sales", Some("csv"), sales_records());

    let mut pipeline = Pipeline::new("sales_rollup");
    pipeline.input_dataset = Some(input);
    pipeline.replace_stages(rollup_stages());

    let report = PipelineRunner::new().execute(&mut store, &mut pipeline).unwrap();

    assert_eq!(report.original_count, 3);
    assert_eq!(report.processed_count, 2);
    assert!(report.warnings.is_empty());

    assert_eq!(report.execution_log.len(), 2);
    let filter = &report.execution_log[0];
    assert_eq!(filter.module, "filter");
    assert_eq!((filter.before_count, filter.after_count), (3, 3));
    assert_eq!(filter.records_affected, 0);
    let aggregate = &report.execution_log[1];
    assert_eq!(aggregate.module, "aggregate");
    assert_eq!((aggregate.before_count, aggregate.after_count), (3, 2));
    assert_eq!(aggregate.records_affected, 1);

    // output dataset created, named after the pipeline, source inherited
    assert_eq!(report.output_dataset_name, "sales_rollup_output");
    assert_eq!(pipeline.output_dataset, Some(report.output_dataset_id));
    assert_eq!(store.dataset_count(), 2);
    assert_eq!(
        store.data_source(report.output_dataset_id).unwrap().as_deref(),
        Some("csv")
    );

    let out = store.load_records(report.output_dataset_id).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(cell(&out[0], "city"), &Value::String("A".into()));
    assert_eq!(cell(&out[0], "total"), &Value::Integer(15));
    assert_eq!(cell(&out[1], "city"), &Value::String("B".into()));
    assert_eq!(cell(&out[1], "total"), &Value::Integer(20));
}

#[test]
fn rerun_reuses_the_bound_output_dataset() {
    let mut store = MemoryStore::new();
    let input = store.insert_dataset("sales", None, sales_records());

    let mut pipeline = Pipeline::new("sales_rollup");
    pipeline.input_dataset = Some(input);
    pipeline.replace_stages(rollup_stages());

    let runner = PipelineRunner::new();
    let first = runner.execute(&mut store, &mut pipeline).unwrap();
    let second = runner.execute(&mut store, &mut pipeline).unwrap();

    assert_eq!(first.output_dataset_id, second.output_dataset_id);
    assert_eq!(store.dataset_count(), 2);

    // reruns are deterministic
    let rows = store.load_records(first.output_dataset_id).unwrap();
    assert_eq!(rows, records(json!([
        {"city": "A", "total": 15},
        {"city": "B", "total": 20},
    ])));
}

#[test]
fn explicit_output_dataset_name_wins() {
    let mut store = MemoryStore::new();
    let input = store.insert_dataset("sales", None, sales_records());

    let mut pipeline = Pipeline::new("sales_rollup");
    pipeline.input_dataset = Some(input);
    pipeline.output_dataset_name = Some("monthly_totals".to_string());
    pipeline.replace_stages(rollup_stages());

    let report = PipelineRunner::new().execute(&mut store, &mut pipeline).unwrap();
    assert_eq!(report.output_dataset_name, "monthly_totals");
}

#[test]
fn unbound_input_fails() {
    let mut store = MemoryStore::new();
    let mut pipeline = Pipeline::new("p");
    let result = PipelineRunner::new().execute(&mut store, &mut pipeline);
    assert!(matches!(result, Err(PipelineError::MissingInput)));
}

#[test]
fn empty_input_fails_without_output() {
    let mut store = MemoryStore::new();
    let input = store.insert_dataset("empty", None, Vec::new());

    let mut pipeline = Pipeline::new("p");
    pipeline.input_dataset = Some(input);
    pipeline.replace_stages(rollup_stages());

    let result = PipelineRunner::new().execute(&mut store, &mut pipeline);
    assert!(matches!(result, Err(PipelineError::EmptyInput)));
    assert_eq!(store.dataset_count(), 1);
    assert!(pipeline.output_dataset.is_none());
}

#[test]
fn validation_failure_leaves_the_store_untouched() {
    let mut store = MemoryStore::new();
    let input = store.insert_dataset("sales", None, sales_records());

    let mut pipeline = Pipeline::new("p");
    pipeline.input_dataset = Some(input);
    pipeline.replace_stages(vec![StageDef::new(
        StageKind::Filter,
        1,
        json!({"field": "ghost", "operator": "==", "value": 1}),
    )]);

    let result = PipelineRunner::new().execute(&mut store, &mut pipeline);
    assert!(matches!(result, Err(PipelineError::Validation { .. })));
    assert_eq!(store.dataset_count(), 1);
    assert!(pipeline.output_dataset.is_none());
}

#[test]
fn degraded_stages_warn_instead_of_failing() {
    let mut store = MemoryStore::new();
    let input = store.insert_dataset("sales", None, sales_records());

    let mut pipeline = Pipeline::new("p");
    pipeline.input_dataset = Some(input);
    pipeline.replace_stages(vec![StageDef::new(
        StageKind::Filter,
        1,
        json!({"field": "sales", "operator": "between", "value": 1}),
    )]);

    let report = PipelineRunner::new().execute(&mut store, &mut pipeline).unwrap();
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].message.contains("between"));

    // the degraded stage is still logged, as a no-op
    let entry = &report.execution_log[0];
    assert_eq!((entry.before_count, entry.after_count), (3, 3));
    assert_eq!(report.processed_count, report.original_count);
}

#[test]
fn stages_run_in_order_not_in_insertion_sequence() {
    let mut store = MemoryStore::new();
    let input = store.insert_dataset("numbers", None, records(json!([{"n": -3}, {"n": 1}])));

    let mut pipeline = Pipeline::new("p");
    pipeline.input_dataset = Some(input);
    // inserted filter-first, but abs is ordered ahead of it
    pipeline.stages = vec![
        StageDef::new(StageKind::Filter, 2, json!({"field": "n", "operator": ">", "value": 2})),
        StageDef::new(StageKind::Transform, 1, json!({"fields": ["n"], "operation": "abs"})),
    ];

    let report = PipelineRunner::new().execute(&mut store, &mut pipeline).unwrap();
    assert_eq!(report.execution_log[0].module, "transform");
    // abs runs first, so -3 becomes 3 and survives the filter
    assert_eq!(report.processed_count, 1);
}

#[test]
fn replace_stages_renumbers_from_one() {
    let mut pipeline = Pipeline::new("p");
    pipeline.replace_stages(vec![
        StageDef::new(StageKind::Filter, 7, json!({})),
        StageDef::new(StageKind::Sort, 3, json!({})),
    ]);
    let orders: Vec<i32> = pipeline.stages.iter().map(|s| s.order).collect();
    assert_eq!(orders, [1, 2]);
    assert_eq!(pipeline.stages[0].kind, StageKind::Filter);
}

/// Store whose replace step always fails, for exercising the
/// commit-before-bind contract.
struct FlakyStore {
    inner: MemoryStore,
}

impl DatasetStore for FlakyStore {
    fn load_records(&self, id: DatasetId) -> Result<Vec<Record>, StoreError> {
        self.inner.load_records(id)
    }

    fn dataset_name(&self, id: DatasetId) -> Result<String, StoreError> {
        self.inner.dataset_name(id)
    }

    fn data_source(&self, id: DatasetId) -> Result<Option<String>, StoreError> {
        self.inner.data_source(id)
    }

    fn create_dataset(
        &mut self,
        name: &str,
        data_source: Option<&str>,
    ) -> Result<DatasetId, StoreError> {
        self.inner.create_dataset(name, data_source)
    }

    fn delete_dataset(&mut self, id: DatasetId) -> Result<(), StoreError> {
        self.inner.delete_dataset(id)
    }

    fn replace_records(&mut self, _: DatasetId, _: Vec<Record>) -> Result<usize, StoreError> {
        Err(StoreError::Transaction("disk full".to_string()))
    }
}

#[test]
fn failed_commit_never_binds_the_output() {
    let mut store = FlakyStore { inner: MemoryStore::new() };
    let input = store.inner.insert_dataset("sales", None, sales_records());

    let mut pipeline = Pipeline::new("p");
    pipeline.input_dataset = Some(input);
    pipeline.replace_stages(rollup_stages());

    let result = PipelineRunner::new().execute(&mut store, &mut pipeline);
    assert!(matches!(
        result,
        Err(PipelineError::Store(StoreError::Transaction(_)))
    ));
    assert!(pipeline.output_dataset.is_none());
}

#[test]
fn failed_commit_rolls_back_the_created_dataset() {
    let mut store = FlakyStore { inner: MemoryStore::new() };
    let input = store.inner.insert_dataset("sales", None, sales_records());

    let mut pipeline = Pipeline::new("p");
    pipeline.input_dataset = Some(input);
    pipeline.replace_stages(rollup_stages());

    let runner = PipelineRunner::new();
    assert!(runner.execute(&mut store, &mut pipeline).is_err());
    assert!(runner.execute(&mut store, &mut pipeline).is_err());

    // retries never accumulate empty output datasets
    assert_eq!(store.inner.dataset_count(), 1);
    assert!(pipeline.output_dataset.is_none());
}
