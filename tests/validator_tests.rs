use rowpipe::{PipelineError, Record, StageDef, StageKind, Table, validate};
use serde_json::json;

fn table(rows: serde_json::Value) -> Table {
    let records: Vec<Record> = serde_json::from_value(rows).unwrap();
    Table::from_records(records)
}

fn stages(defs: Vec<(StageKind, serde_json::Value)>) -> Vec<StageDef> {
    defs.into_iter()
        .enumerate()
        .map(|(i, (kind, config))| StageDef::new(kind, i as i32 + 1, config))
        .collect()
}

fn expect_validation(result: Result<(), PipelineError>) -> (String, String) {
    match result {
        Err(PipelineError::Validation { stage, message }) => (stage, message),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn valid_chain_passes() {
    let input = table(json!([
        {"city": "A", "sales": 10},
        {"city": "B", "sales": 20},
    ]));
    let chain = stages(vec![
        (StageKind::Filter, json!({"field": "sales", "operator": ">", "value": 0})),
        (StageKind::Clean, json!({"field": "city", "operation": "remove_na"})),
        (
            StageKind::Aggregate,
            json!({"group_by": ["city"], "aggregations": [{"field": "sales", "operation": "sum"}]}),
        ),
        (StageKind::Sort, json!({"sort_fields": [{"field": "sales_sum", "direction": "desc"}]})),
    ]);
    assert!(validate(&input, &chain).is_ok());
}

#[test]
fn empty_input_rejected_before_stage_checks() {
    let empty = Table::new();
    let chain = stages(vec![(
        StageKind::Filter,
        json!({"field": "ghost", "operator": "==", "value": 1}),
    )]);
    assert!(matches!(validate(&empty, &chain), Err(PipelineError::EmptyInput)));
}

#[test]
fn filter_on_unknown_field_names_field_and_stage() {
    let input = table(json!([{"a": 1}]));
    let chain = vec![
        StageDef::new(
            StageKind::Filter,
            1,
            json!({"field": "ghost", "operator": "==", "value": 1}),
        )
        .named("drop inactive"),
    ];
    let (stage, message) = expect_validation(validate(&input, &chain));
    assert_eq!(stage, "drop inactive");
    assert!(message.contains("'ghost'"), "{message}");
}

#[test]
fn transform_and_clean_check_their_fields() {
    let input = table(json!([{"a": 1}]));

    let chain = stages(vec![(
        StageKind::Transform,
        json!({"fields": ["a", "ghost"], "operation": "abs"}),
    )]);
    let (_, message) = expect_validation(validate(&input, &chain));
    assert!(message.contains("'ghost'"));

    let chain = stages(vec![(
        StageKind::Clean,
        json!({"field": "ghost", "operation": "fill_na"}),
    )]);
    let (_, message) = expect_validation(validate(&input, &chain));
    assert!(message.contains("'ghost'"));
}

#[test]
fn aggregate_checks_group_and_aggregation_fields() {
    let input = table(json!([{"g": "a", "v": 1}]));

    let chain = stages(vec![(
        StageKind::Aggregate,
        json!({"group_by": ["ghost"], "aggregations": [{"field": "v", "operation": "sum"}]}),
    )]);
    let (_, message) = expect_validation(validate(&input, &chain));
    assert!(message.contains("group-by field 'ghost'"));

    let chain = stages(vec![(
        StageKind::Aggregate,
        json!({"group_by": ["g"], "aggregations": [{"field": "ghost", "operation": "sum"}]}),
    )]);
    let (_, message) = expect_validation(validate(&input, &chain));
    assert!(message.contains("aggregation field 'ghost'"));
}

#[test]
fn select_needs_fields_and_checks_include_mode() {
    let input = table(json!([{"a": 1}]));

    let chain = stages(vec![(StageKind::Select, json!({"selected_fields": []}))]);
    let (_, message) = expect_validation(validate(&input, &chain));
    assert!(message.contains("at least one field"));

    let chain = stages(vec![(
        StageKind::Select,
        json!({"selected_fields": ["ghost"], "mode": "include"}),
    )]);
    expect_validation(validate(&input, &chain));

    // exclude mode tolerates unknown names
    let chain = stages(vec![(
        StageKind::Select,
        json!({"selected_fields": ["ghost"], "mode": "exclude"}),
    )]);
    assert!(validate(&input, &chain).is_ok());
}

#[test]
fn sort_field_and_limit_checks() {
    let input = table(json!([{"a": 1}]));

    let chain = stages(vec![(StageKind::Sort, json!({"sort_fields": []}))]);
    let (_, message) = expect_validation(validate(&input, &chain));
    assert!(message.contains("at least one sort field"));

    let chain = stages(vec![(
        StageKind::Sort,
        json!({"sort_fields": [{"field": "ghost"}]}),
    )]);
    expect_validation(validate(&input, &chain));

    let base = json!({"sort_fields": [{"field": "a", "direction": "asc"}]});

    let mut bad_count = base.clone();
    bad_count["enable_limit"] = json!(true);
    bad_count["limit_type"] = json!("top");
    bad_count["limit_count"] = json!(0);
    let (_, message) = expect_validation(validate(&input, &stages(vec![(StageKind::Sort, bad_count)])));
    assert!(message.contains("greater than 0"));

    let mut bad_start = base.clone();
    bad_start["enable_limit"] = json!(true);
    bad_start["limit_type"] = json!("range");
    bad_start["start_row"] = json!(-1);
    bad_start["end_row"] = json!(5);
    let (_, message) = expect_validation(validate(&input, &stages(vec![(StageKind::Sort, bad_start)])));
    assert!(message.contains("negative"));

    let mut inverted = base.clone();
    inverted["enable_limit"] = json!(true);
    inverted["limit_type"] = json!("range");
    inverted["start_row"] = json!(4);
    inverted["end_row"] = json!(4);
    let (_, message) = expect_validation(validate(&input, &stages(vec![(StageKind::Sort, inverted)])));
    assert!(message.contains("less than end row"));

    let mut unknown = base.clone();
    unknown["enable_limit"] = json!(true);
    unknown["limit_type"] = json!("middle");
    let (_, message) = expect_validation(validate(&input, &stages(vec![(StageKind::Sort, unknown)])));
    assert!(message.contains("unknown limit type"));

    let mut ok = base;
    ok["enable_limit"] = json!(true);
    ok["limit_type"] = json!("range");
    ok["start_row"] = json!(0);
    ok["end_row"] = json!(3);
    assert!(validate(&input, &stages(vec![(StageKind::Sort, ok)])).is_ok());
}

#[test]
fn transform_derived_columns_become_available() {
    let input = table(json!([{"date": "2024-03-01"}]));
    let chain = stages(vec![
        (
            StageKind::Transform,
            json!({"fields": ["date"], "operation": "extract_year", "new_field_prefix": "y"}),
        ),
        (StageKind::Filter, json!({"field": "y_date", "operator": ">=", "value": 2024})),
    ]);
    assert!(validate(&input, &chain).is_ok());
}

#[test]
fn aggregate_replaces_the_available_columns() {
    let input = table(json!([{"city": "A", "sales": 1, "note": "x"}]));
    let chain = stages(vec![
        (
            StageKind::Aggregate,
            json!({
                "group_by": ["city"],
                "aggregations": [{"field": "sales", "operation": "sum", "output_name": "total"}],
            }),
        ),
        (StageKind::Select, json!({"selected_fields": ["note"], "mode": "include"})),
    ]);
    let (_, message) = expect_validation(validate(&input, &chain));
    assert!(message.contains("'note'"));

    // the aggregate's own outputs are referencable downstream
    let chain = stages(vec![
        (
            StageKind::Aggregate,
            json!({
                "group_by": ["city"],
                "aggregations": [{"field": "sales", "operation": "sum", "output_name": "total"}],
            }),
        ),
        (StageKind::Sort, json!({"sort_fields": [{"field": "total", "direction": "desc"}]})),
    ]);
    assert!(validate(&input, &chain).is_ok());
}

#[test]
fn select_narrows_the_available_columns() {
    let input = table(json!([{"a": 1, "b": 2}]));
    let chain = stages(vec![
        (StageKind::Select, json!({"selected_fields": ["a"], "mode": "include"})),
        (StageKind::Sort, json!({"sort_fields": [{"field": "b"}]})),
    ]);
    let (_, message) = expect_validation(validate(&input, &chain));
    assert!(message.contains("'b'"));
}

#[test]
fn unparseable_configuration_is_not_a_validation_error() {
    let input = table(json!([{"a": 1}]));
    // field is the wrong JSON type; the stage will degrade at runtime
    let chain = stages(vec![(
        StageKind::Filter,
        json!({"field": 42, "operator": "==", "value": 1}),
    )]);
    assert!(validate(&input, &chain).is_ok());
}
