use std::str::FromStr;

use cellpipe::fragment::{
    generate, Aggregate, CellParams, ClauseKind, DedupeKey, DedupeReport, FilterOp, FilterValue,
    Fragment, FragmentError, SortDirection, quote_ident,
};
use cellpipe::schema::SchemaSnapshot;
use rust_decimal::Decimal;

fn snapshot(columns: &[&str]) -> SchemaSnapshot {
    SchemaSnapshot::from_columns(columns.iter().map(|c| c.to_string()).collect())
}

fn clause_text(fragment: Fragment) -> String {
    match fragment {
        Fragment::Clause { text, .. } => text,
        other => panic!("expected a clause fragment, got {:?}", other),
    }
}

#[test]
fn test_source_fragment() {
    let params = CellParams::Source {
        table: "sales".to_string(),
    };
    let fragment = generate(&params, None).unwrap();
    assert_eq!(
        fragment,
        Fragment::Override {
            template: "SELECT * FROM \"sales\"".to_string()
        }
    );
}

#[test]
fn test_source_requires_table_name() {
    let params = CellParams::Source {
        table: "  ".to_string(),
    };
    assert_eq!(
        generate(&params, None),
        Err(FragmentError::EmptyParameter("source table name"))
    );
}

#[test]
fn test_filter_comparison() {
    let params = CellParams::Filter {
        column: "price".to_string(),
        op: FilterOp::Gt,
        value: FilterValue::Number(Decimal::from(10)),
    };
    let fragment = generate(&params, None).unwrap();
    match &fragment {
        Fragment::Clause { kind, text } => {
            assert_eq!(*kind, ClauseKind::Where);
            assert_eq!(text, "\"price\" > 10");
        }
        other => panic!("expected a clause, got {:?}", other),
    }
}

#[test]
fn test_filter_decimal_renders_as_typed() {
    let params = CellParams::Filter {
        column: "price".to_string(),
        op: FilterOp::Le,
        value: FilterValue::Number(Decimal::from_str("3.10").unwrap()),
    };
    assert_eq!(clause_text(generate(&params, None).unwrap()), "\"price\" <= 3.10");
}

#[test]
fn test_filter_contains_escapes_quotes() {
    let params = CellParams::Filter {
        column: "name".to_string(),
        op: FilterOp::Contains,
        value: FilterValue::Text("O'Brien".to_string()),
    };
    assert_eq!(
        clause_text(generate(&params, None).unwrap()),
        "\"name\" LIKE '%O''Brien%'"
    );
}

#[test]
fn test_filter_null_checks_take_no_value() {
    let params = CellParams::Filter {
        column: "email".to_string(),
        op: FilterOp::IsNull,
        value: FilterValue::Null,
    };
    assert_eq!(clause_text(generate(&params, None).unwrap()), "\"email\" IS NULL");
}

#[test]
fn test_sort_fragment() {
    let params = CellParams::Sort {
        column: "price".to_string(),
        direction: SortDirection::Descending,
    };
    let fragment = generate(&params, None).unwrap();
    match &fragment {
        Fragment::Clause { kind, text } => {
            assert_eq!(*kind, ClauseKind::OrderBy);
            assert_eq!(text, "\"price\" DESC");
        }
        other => panic!("expected a clause, got {:?}", other),
    }
}

#[test]
fn test_dedupe_full_rows_partitions_by_all_columns() {
    let params = CellParams::Deduplicate {
        key: DedupeKey::FullRows,
    };
    let fragment = generate(&params, Some(&snapshot(&["a", "b"]))).unwrap();
    match &fragment {
        Fragment::WrapRequired { select } => {
            assert!(select.contains("ROW_NUMBER() OVER (PARTITION BY \"a\", \"b\")"));
            assert!(select.contains("WHERE \"__seq\" = 1"));
            assert!(select.starts_with("SELECT * EXCLUDE (\"__seq\")"));
        }
        other => panic!("expected wrap-required, got {:?}", other),
    }
}

#[test]
fn test_dedupe_single_column_partitions_by_it() {
    let params = CellParams::Deduplicate {
        key: DedupeKey::Column("region".to_string()),
    };
    let fragment = generate(&params, Some(&snapshot(&["region", "amount"]))).unwrap();
    match &fragment {
        Fragment::WrapRequired { select } => {
            assert!(select.contains("PARTITION BY \"region\")"));
            assert!(!select.contains("\"amount\","));
        }
        other => panic!("expected wrap-required, got {:?}", other),
    }
}

#[test]
fn test_dedupe_missing_column_is_schema_mismatch() {
    let params = CellParams::Deduplicate {
        key: DedupeKey::Column("gone".to_string()),
    };
    assert_eq!(
        generate(&params, Some(&snapshot(&["a", "b"]))),
        Err(FragmentError::SchemaMismatch {
            column: "gone".to_string()
        })
    );
}

#[test]
fn test_dedupe_without_snapshot_is_unavailable() {
    let params = CellParams::Deduplicate {
        key: DedupeKey::FullRows,
    };
    assert_eq!(generate(&params, None), Err(FragmentError::SchemaUnavailable));
}

#[test]
fn test_drop_columns_fragment() {
    let params = CellParams::DropColumns {
        columns: vec!["a".to_string(), "b".to_string()],
    };
    let fragment = generate(&params, Some(&snapshot(&["a", "b", "c"]))).unwrap();
    assert_eq!(
        fragment,
        Fragment::WrapRequired {
            select: "SELECT * EXCLUDE (\"a\", \"b\") FROM __src".to_string()
        }
    );
}

#[test]
fn test_drop_missing_column_is_schema_mismatch() {
    let params = CellParams::DropColumns {
        columns: vec!["gone".to_string()],
    };
    assert_eq!(
        generate(&params, Some(&snapshot(&["a"]))),
        Err(FragmentError::SchemaMismatch {
            column: "gone".to_string()
        })
    );
}

#[test]
fn test_drop_nothing_is_an_error() {
    let params = CellParams::DropColumns { columns: vec![] };
    assert_eq!(
        generate(&params, Some(&snapshot(&["a"]))),
        Err(FragmentError::EmptyParameter("columns to drop"))
    );
}

#[test]
fn test_derive_column_fragment() {
    let params = CellParams::DeriveColumn {
        name: "total".to_string(),
        expression: "price * quantity".to_string(),
    };
    let fragment = generate(&params, None).unwrap();
    assert_eq!(
        fragment,
        Fragment::WrapRequired {
            select: "SELECT *, (price * quantity) AS \"total\" FROM __src".to_string()
        }
    );
}

#[test]
fn test_derive_rejects_bad_identifier() {
    for bad in ["2total", "total price", "tot\"al", ""] {
        let params = CellParams::DeriveColumn {
            name: bad.to_string(),
            expression: "1".to_string(),
        };
        assert!(generate(&params, None).is_err(), "accepted '{}'", bad);
    }
}

#[test]
fn test_pivot_fragment_embeds_upstream_slot() {
    let params = CellParams::Pivot {
        on: "region".to_string(),
        value: "amount".to_string(),
        aggregate: Aggregate::Sum,
        group_by: vec!["year".to_string()],
    };
    let fragment = generate(&params, None).unwrap();
    assert_eq!(
        fragment,
        Fragment::Override {
            template: "PIVOT ({{upstream}}) ON \"region\" USING sum(\"amount\") GROUP BY \"year\""
                .to_string()
        }
    );
}

#[test]
fn test_raw_query_exposes_prior() {
    let params = CellParams::RawQuery {
        text: "SELECT count(*) AS n FROM prior".to_string(),
    };
    let fragment = generate(&params, None).unwrap();
    assert_eq!(
        fragment,
        Fragment::Override {
            template: "WITH prior AS ({{upstream}}) SELECT count(*) AS n FROM prior".to_string()
        }
    );
}

#[test]
fn test_display_cells_pass_through() {
    for params in [
        CellParams::TableView,
        CellParams::Download,
        CellParams::Chart,
        CellParams::Assistant,
        CellParams::ScriptQuery,
    ] {
        assert_eq!(
            generate(&params, None).unwrap(),
            Fragment::Override {
                template: "{{upstream}}".to_string()
            }
        );
    }
}

#[test]
fn test_generation_is_deterministic() {
    let params = CellParams::Deduplicate {
        key: DedupeKey::FullRows,
    };
    let schema = snapshot(&["a", "b", "c"]);
    assert_eq!(
        generate(&params, Some(&schema)).unwrap(),
        generate(&params, Some(&schema)).unwrap()
    );
}

#[test]
fn test_quote_ident_doubles_embedded_quotes() {
    assert_eq!(quote_ident("weird\"name"), "\"weird\"\"name\"");
}

#[test]
fn test_dedupe_report_accounting() {
    let report = DedupeReport::new(10, 7);
    assert_eq!(report.duplicates_removed, 3);
    assert_eq!(report.current_rows + report.duplicates_removed, report.table_rows);

    let empty = DedupeReport::new(0, 0);
    assert_eq!(empty.duplicates_removed, 0);
}
