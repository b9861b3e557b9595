#![cfg(feature = "duckdb")]

use std::fs;
use std::path::PathBuf;

use cellpipe::duck::DuckEngine;
use cellpipe::engine::{execute_with_retry, Engine, MAIN_VIEW_ROW_LIMIT, PREVIEW_ROW_LIMIT};
use cellpipe::fragment::{
    Aggregate, CellParams, DedupeKey, DedupeReport, FilterOp, FilterValue, SortDirection,
};
use cellpipe::pipeline::Pipeline;
use rust_decimal::Decimal;

fn write_csv(name: &str, contents: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("cellpipe_{}_{}.csv", name, std::process::id()));
    fs::write(&path, contents).unwrap();
    path
}

/// 10 rows over columns a,b with 3 duplicate a-values and 2 exact
/// duplicate rows.
const SALES: &str = "\
a,b
1,x
2,y
3,z
4,x
5,y
6,z
7,x
1,x
2,q
3,q
";

fn engine_with(table: &str, csv: &str, name: &str) -> DuckEngine {
    let path = write_csv(name, csv);
    let mut engine = DuckEngine::in_memory().unwrap();
    engine.register_csv(table, &path).unwrap();
    engine
}

fn resolve(pipeline: &mut Pipeline, engine: &mut DuckEngine) {
    pipeline.resolve(engine, |_, _| {}).unwrap();
}

fn row_count(engine: &mut DuckEngine, query: &str) -> usize {
    execute_with_retry(engine, query, MAIN_VIEW_ROW_LIMIT)
        .unwrap()
        .row_count
}

fn source(table: &str) -> CellParams {
    CellParams::Source {
        table: table.to_string(),
    }
}

#[test]
fn test_dedupe_by_column_keeps_one_row_per_value() {
    let mut engine = engine_with("sales", SALES, "dedupe_col");
    let mut pipeline = Pipeline::new(source("sales")).unwrap();
    pipeline.push(CellParams::Deduplicate {
        key: DedupeKey::Column("a".to_string()),
    });
    resolve(&mut pipeline, &mut engine);

    let total = row_count(&mut engine, pipeline.cumulative(0).unwrap());
    let current = row_count(&mut engine, pipeline.cumulative(1).unwrap());
    let report = DedupeReport::new(total, current);

    assert_eq!(report.table_rows, 10);
    assert_eq!(report.current_rows, 7);
    assert_eq!(report.duplicates_removed, 3);
    assert_eq!(report.current_rows + report.duplicates_removed, report.table_rows);
}

#[test]
fn test_dedupe_full_rows_removes_exact_duplicates_and_is_idempotent() {
    let mut engine = engine_with("sales", SALES, "dedupe_full");
    let mut pipeline = Pipeline::new(source("sales")).unwrap();
    pipeline.push(CellParams::Deduplicate {
        key: DedupeKey::FullRows,
    });
    pipeline.push(CellParams::Deduplicate {
        key: DedupeKey::FullRows,
    });
    resolve(&mut pipeline, &mut engine);

    // One exact duplicate row (1,x) in the fixture.
    let once = row_count(&mut engine, pipeline.cumulative(1).unwrap());
    let twice = row_count(&mut engine, pipeline.cumulative(2).unwrap());
    assert_eq!(once, 9);
    assert_eq!(twice, once);
}

#[test]
fn test_dedupe_on_empty_upstream_yields_zero_rows() {
    let mut engine = engine_with("sales", SALES, "dedupe_empty");
    let mut pipeline = Pipeline::new(source("sales")).unwrap();
    pipeline.push(CellParams::Filter {
        column: "a".to_string(),
        op: FilterOp::Gt,
        value: FilterValue::Number(Decimal::from(1000)),
    });
    pipeline.push(CellParams::Deduplicate {
        key: DedupeKey::FullRows,
    });
    resolve(&mut pipeline, &mut engine);

    assert_eq!(row_count(&mut engine, pipeline.cumulative(2).unwrap()), 0);
}

#[test]
fn test_filter_result_is_a_subset() {
    let mut engine = engine_with("sales", SALES, "filter_subset");
    let mut pipeline = Pipeline::new(source("sales")).unwrap();
    pipeline.push(CellParams::Filter {
        column: "b".to_string(),
        op: FilterOp::Eq,
        value: FilterValue::Text("x".to_string()),
    });
    resolve(&mut pipeline, &mut engine);

    let all = row_count(&mut engine, pipeline.cumulative(0).unwrap());
    let filtered = row_count(&mut engine, pipeline.cumulative(1).unwrap());
    assert!(filtered <= all);
    assert_eq!(filtered, 4);
}

#[test]
fn test_sort_after_pivot_executes() {
    let mut engine = engine_with("sales", SALES, "pivot_sort");
    let mut pipeline = Pipeline::new(source("sales")).unwrap();
    pipeline.push(CellParams::Pivot {
        on: "b".to_string(),
        value: "a".to_string(),
        aggregate: Aggregate::Sum,
        group_by: vec![],
    });
    pipeline.push(CellParams::Sort {
        column: "x".to_string(),
        direction: SortDirection::Descending,
    });
    resolve(&mut pipeline, &mut engine);

    let result = execute_with_retry(
        &mut engine,
        pipeline.cumulative(2).unwrap(),
        PREVIEW_ROW_LIMIT,
    )
    .unwrap();
    assert!(result.columns.iter().any(|c| c == "x"));
}

#[test]
fn test_derive_then_drop_round_trip() {
    let mut engine = engine_with("sales", SALES, "derive_drop");
    let mut pipeline = Pipeline::new(source("sales")).unwrap();
    pipeline.push(CellParams::DeriveColumn {
        name: "doubled".to_string(),
        expression: "a * 2".to_string(),
    });
    pipeline.push(CellParams::DropColumns {
        columns: vec!["b".to_string()],
    });
    resolve(&mut pipeline, &mut engine);

    let result = execute_with_retry(
        &mut engine,
        pipeline.cumulative(2).unwrap(),
        PREVIEW_ROW_LIMIT,
    )
    .unwrap();
    assert!(result.columns.iter().any(|c| c == "doubled"));
    assert!(!result.columns.iter().any(|c| c == "b"));
}

#[test]
fn test_raw_query_reads_from_prior() {
    let mut engine = engine_with("sales", SALES, "raw");
    let mut pipeline = Pipeline::new(source("sales")).unwrap();
    pipeline.push(CellParams::RawQuery {
        text: "SELECT count(*) AS n FROM prior".to_string(),
    });
    resolve(&mut pipeline, &mut engine);

    let result = execute_with_retry(
        &mut engine,
        pipeline.cumulative(1).unwrap(),
        PREVIEW_ROW_LIMIT,
    )
    .unwrap();
    assert_eq!(result.row_count, 1);
}

#[test]
fn test_truncation_flag_reports_the_cap() {
    let mut engine = engine_with("sales", SALES, "truncate_flag");
    let mut pipeline = Pipeline::new(source("sales")).unwrap();
    resolve(&mut pipeline, &mut engine);

    let result = execute_with_retry(&mut engine, pipeline.cumulative(0).unwrap(), 4).unwrap();
    assert_eq!(result.row_count, 4);
    assert!(result.truncated);
}

#[test]
fn test_disconnected_engine_reports_not_ready() {
    let mut engine = DuckEngine::new();
    assert!(engine.execute("SELECT 1", 1).is_err());
    engine.connect().unwrap();
    assert!(engine.execute("SELECT 1", 1).is_ok());
    engine.disconnect();
    assert!(engine.execute("SELECT 1", 1).is_err());
}
