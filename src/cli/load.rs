//! JSON <-> pipeline description conversion utilities
//!
//! A pipeline description is a JSON array of cell objects, first entry a
//! source cell:
//!
//! ```json
//! [
//!   { "kind": "source", "table": "sales" },
//!   { "kind": "filter", "column": "price", "op": "gt", "value": 10 },
//!   { "kind": "deduplicate", "column": "region" }
//! ]
//! ```

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value as Json};

use super::CliError;
use crate::engine::ExecutionResult;
use crate::fragment::{
    Aggregate, CellParams, DedupeKey, FilterOp, FilterValue, SortDirection,
};
use crate::value::Value;

/// Selection label the UI shows for whole-row deduplication.
const FULL_ROWS_LABEL: &str = "Full Rows";

/// Parse a pipeline description into cell parameters.
pub fn pipeline_from_json(root: &Json) -> Result<Vec<CellParams>, CliError> {
    let array = root
        .as_array()
        .ok_or_else(|| CliError::Description("expected a JSON array of cells".to_string()))?;
    if array.is_empty() {
        return Err(CliError::Description("pipeline has no cells".to_string()));
    }
    let mut cells = Vec::with_capacity(array.len());
    for (i, entry) in array.iter().enumerate() {
        let obj = entry.as_object().ok_or_else(|| {
            CliError::Description(format!("cell {} is not a JSON object", i))
        })?;
        cells.push(cell_from_json(i, obj)?);
    }
    if !cells[0].is_source() {
        return Err(CliError::Description(
            "the first cell must have kind 'source'".to_string(),
        ));
    }
    Ok(cells)
}

fn cell_from_json(index: usize, obj: &Map<String, Json>) -> Result<CellParams, CliError> {
    let kind = str_field(index, obj, "kind")?;
    match kind.as_str() {
        "source" => Ok(CellParams::Source {
            table: str_field(index, obj, "table")?,
        }),
        "filter" => Ok(CellParams::Filter {
            column: str_field(index, obj, "column")?,
            op: filter_op(index, &str_field(index, obj, "op")?)?,
            value: filter_value(obj.get("value").unwrap_or(&Json::Null)),
        }),
        "sort" => {
            let direction = match obj.get("direction").and_then(Json::as_str) {
                None | Some("asc") => SortDirection::Ascending,
                Some("desc") => SortDirection::Descending,
                Some(other) => {
                    return Err(CliError::Description(format!(
                        "cell {}: unknown sort direction '{}'",
                        index, other
                    )))
                }
            };
            Ok(CellParams::Sort {
                column: str_field(index, obj, "column")?,
                direction,
            })
        }
        "deduplicate" => {
            let key = match obj.get("column").and_then(Json::as_str) {
                None | Some(FULL_ROWS_LABEL) => DedupeKey::FullRows,
                Some(column) => DedupeKey::Column(column.to_string()),
            };
            Ok(CellParams::Deduplicate { key })
        }
        "pivot" => Ok(CellParams::Pivot {
            on: str_field(index, obj, "on")?,
            value: str_field(index, obj, "value")?,
            aggregate: aggregate(index, obj.get("aggregate").and_then(Json::as_str))?,
            group_by: str_list(index, obj, "group_by")?,
        }),
        "derive" => Ok(CellParams::DeriveColumn {
            name: str_field(index, obj, "name")?,
            expression: str_field(index, obj, "expression")?,
        }),
        "drop-columns" => Ok(CellParams::DropColumns {
            columns: str_list(index, obj, "columns")?,
        }),
        "raw-query" => Ok(CellParams::RawQuery {
            text: str_field(index, obj, "text")?,
        }),
        "table" => Ok(CellParams::TableView),
        "download" => Ok(CellParams::Download),
        "chart" => Ok(CellParams::Chart),
        "assistant" => Ok(CellParams::Assistant),
        "script" => Ok(CellParams::ScriptQuery),
        other => Err(CliError::Description(format!(
            "cell {}: unknown kind '{}'",
            index, other
        ))),
    }
}

fn str_field(index: usize, obj: &Map<String, Json>, key: &str) -> Result<String, CliError> {
    obj.get(key)
        .and_then(Json::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            CliError::Description(format!("cell {}: missing string field '{}'", index, key))
        })
}

fn str_list(index: usize, obj: &Map<String, Json>, key: &str) -> Result<Vec<String>, CliError> {
    match obj.get(key) {
        None => Ok(Vec::new()),
        Some(Json::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    CliError::Description(format!(
                        "cell {}: '{}' must be an array of strings",
                        index, key
                    ))
                })
            })
            .collect(),
        Some(_) => Err(CliError::Description(format!(
            "cell {}: '{}' must be an array of strings",
            index, key
        ))),
    }
}

fn filter_op(index: usize, op: &str) -> Result<FilterOp, CliError> {
    match op {
        "eq" => Ok(FilterOp::Eq),
        "ne" => Ok(FilterOp::Ne),
        "lt" => Ok(FilterOp::Lt),
        "le" => Ok(FilterOp::Le),
        "gt" => Ok(FilterOp::Gt),
        "ge" => Ok(FilterOp::Ge),
        "contains" => Ok(FilterOp::Contains),
        "is-null" => Ok(FilterOp::IsNull),
        "not-null" => Ok(FilterOp::IsNotNull),
        other => Err(CliError::Description(format!(
            "cell {}: unknown filter op '{}'",
            index, other
        ))),
    }
}

fn filter_value(value: &Json) -> FilterValue {
    match value {
        Json::Null => FilterValue::Null,
        Json::Bool(b) => FilterValue::Boolean(*b),
        Json::Number(n) => Decimal::from_str(&n.to_string())
            .map(FilterValue::Number)
            .unwrap_or_else(|_| FilterValue::Text(n.to_string())),
        Json::String(s) => FilterValue::Text(s.clone()),
        other => FilterValue::Text(other.to_string()),
    }
}

fn aggregate(index: usize, name: Option<&str>) -> Result<Aggregate, CliError> {
    match name {
        None | Some("sum") => Ok(Aggregate::Sum),
        Some("count") => Ok(Aggregate::Count),
        Some("avg") => Ok(Aggregate::Avg),
        Some("min") => Ok(Aggregate::Min),
        Some("max") => Ok(Aggregate::Max),
        Some(other) => Err(CliError::Description(format!(
            "cell {}: unknown aggregate '{}'",
            index, other
        ))),
    }
}

/// Convert an execution result to JSON for CLI output.
pub fn result_to_json(result: &ExecutionResult) -> Json {
    let rows: Vec<Json> = result
        .rows
        .iter()
        .map(|row| {
            let mut obj = Map::new();
            for column in &result.columns {
                let value = row.get(column).unwrap_or(&Value::Null);
                obj.insert(column.clone(), value_to_json(value));
            }
            Json::Object(obj)
        })
        .collect();
    let mut out = Map::new();
    out.insert(
        "columns".to_string(),
        Json::Array(result.columns.iter().cloned().map(Json::String).collect()),
    );
    out.insert("rowCount".to_string(), Json::Number(result.row_count.into()));
    out.insert("truncated".to_string(), Json::Bool(result.truncated));
    out.insert("rows".to_string(), Json::Array(rows));
    Json::Object(out)
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Integer(n) => Json::Number((*n).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Text(s) => Json::String(s.clone()),
    }
}
