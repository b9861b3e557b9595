#![cfg(feature = "cli")]

use cellpipe::cli::{execute_check, pipeline_from_json, result_to_json, CheckOptions, CheckResult};
use cellpipe::engine::ExecutionResult;
use cellpipe::fragment::{CellParams, DedupeKey};
use cellpipe::value::{Row, Value};

#[test]
fn test_description_parses_all_kinds() {
    let json: serde_json::Value = serde_json::from_str(
        r#"[
            { "kind": "source", "table": "sales" },
            { "kind": "filter", "column": "price", "op": "gt", "value": 10 },
            { "kind": "sort", "column": "price", "direction": "desc" },
            { "kind": "deduplicate" },
            { "kind": "deduplicate", "column": "region" },
            { "kind": "pivot", "on": "region", "value": "amount", "aggregate": "avg" },
            { "kind": "derive", "name": "total", "expression": "price * quantity" },
            { "kind": "drop-columns", "columns": ["b"] },
            { "kind": "raw-query", "text": "SELECT 1" },
            { "kind": "table" }
        ]"#,
    )
    .unwrap();

    let cells = pipeline_from_json(&json).unwrap();
    assert_eq!(cells.len(), 10);
    assert!(cells[0].is_source());
    assert_eq!(
        cells[3],
        CellParams::Deduplicate {
            key: DedupeKey::FullRows
        }
    );
    assert_eq!(
        cells[4],
        CellParams::Deduplicate {
            key: DedupeKey::Column("region".to_string())
        }
    );
}

#[test]
fn test_full_rows_label_maps_to_full_rows() {
    let json: serde_json::Value = serde_json::from_str(
        r#"[
            { "kind": "source", "table": "t" },
            { "kind": "deduplicate", "column": "Full Rows" }
        ]"#,
    )
    .unwrap();
    let cells = pipeline_from_json(&json).unwrap();
    assert_eq!(
        cells[1],
        CellParams::Deduplicate {
            key: DedupeKey::FullRows
        }
    );
}

#[test]
fn test_description_must_start_with_a_source() {
    let json: serde_json::Value =
        serde_json::from_str(r#"[{ "kind": "table" }]"#).unwrap();
    assert!(pipeline_from_json(&json).is_err());
}

#[test]
fn test_unknown_kind_is_rejected() {
    let json: serde_json::Value = serde_json::from_str(
        r#"[{ "kind": "source", "table": "t" }, { "kind": "teleport" }]"#,
    )
    .unwrap();
    let err = pipeline_from_json(&json).unwrap_err();
    assert!(err.to_string().contains("teleport"));
}

#[test]
fn test_check_validates_without_data() {
    let options = CheckOptions {
        pipeline: r#"[{ "kind": "source", "table": "t" }, { "kind": "sort", "column": "a" }]"#
            .to_string(),
        data: None,
        pretty: false,
        syntax_only: false,
    };
    match execute_check(&options).unwrap() {
        CheckResult::DescriptionValid { cells } => assert_eq!(cells, 2),
        other => panic!("expected validation-only result, got {:?}", other),
    }
}

#[test]
fn test_result_rows_render_in_column_order() {
    let mut row = Row::new();
    row.insert("n".to_string(), Value::Integer(3));
    row.insert("name".to_string(), Value::Text("widget".to_string()));
    let result = ExecutionResult::new(
        vec!["name".to_string(), "n".to_string()],
        vec![row],
        false,
    );

    let json = result_to_json(&result);
    assert_eq!(json["rowCount"], serde_json::Value::from(1));
    assert_eq!(json["truncated"], serde_json::Value::from(false));
    assert_eq!(json["rows"][0]["name"], serde_json::Value::from("widget".to_string()));
    assert_eq!(json["rows"][0]["n"], serde_json::Value::from(3));
}
