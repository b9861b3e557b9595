//! DuckDB-backed implementation of the engine boundary.
//!
//! One in-process connection, opened once per session and reused for every
//! call. Connecting applies the session settings the pipeline relies on,
//! most importantly raising the pivot row ceiling.

use std::path::Path;

use duckdb::types::ValueRef;
use duckdb::Connection;

use crate::engine::{Engine, EngineError, ExecutionResult, PIVOT_ROW_CEILING};
use crate::fragment::quote_ident;
use crate::value::{Row, Value};

/// An embedded DuckDB engine holding one logical connection.
pub struct DuckEngine {
    conn: Option<Connection>,
}

impl DuckEngine {
    /// An engine with no connection yet; call [`Engine::connect`] before use.
    pub fn new() -> Self {
        DuckEngine { conn: None }
    }

    /// A connected in-memory engine, session settings applied.
    pub fn in_memory() -> Result<Self, EngineError> {
        let mut engine = DuckEngine::new();
        engine.connect()?;
        Ok(engine)
    }

    /// Ingest a CSV file as `table`, replacing any previous contents.
    pub fn register_csv(&mut self, table: &str, path: &Path) -> Result<(), EngineError> {
        let conn = self.conn.as_ref().ok_or(EngineError::NotReady)?;
        let sql = format!(
            "CREATE OR REPLACE TABLE {} AS SELECT * FROM read_csv_auto('{}')",
            quote_ident(table),
            path.display().to_string().replace('\'', "''")
        );
        conn.execute_batch(&sql).map_err(reject)?;
        Ok(())
    }
}

impl Default for DuckEngine {
    fn default() -> Self {
        DuckEngine::new()
    }
}

impl Engine for DuckEngine {
    fn connect(&mut self) -> Result<(), EngineError> {
        if self.conn.is_none() {
            let conn = Connection::open_in_memory().map_err(reject)?;
            conn.execute_batch(&format!("SET pivot_limit={}", PIVOT_ROW_CEILING))
                .map_err(reject)?;
            self.conn = Some(conn);
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.conn = None;
    }

    fn execute(&mut self, query: &str, row_limit: usize) -> Result<ExecutionResult, EngineError> {
        let conn = self.conn.as_ref().ok_or(EngineError::NotReady)?;
        // Wrapping keeps the limit valid for any query shape, PIVOT
        // statements included. One extra row detects truncation.
        let bounded = format!("SELECT * FROM ({}) LIMIT {}", query, row_limit + 1);
        let mut stmt = conn.prepare(&bounded).map_err(reject)?;
        let mut raw = stmt.query([]).map_err(reject)?;
        let columns: Vec<String> = raw
            .as_ref()
            .map(|s| s.column_names().iter().map(|c| c.to_string()).collect())
            .unwrap_or_default();
        let mut rows: Vec<Row> = Vec::new();
        while let Some(row) = raw.next().map_err(reject)? {
            let mut out = Row::new();
            for (i, name) in columns.iter().enumerate() {
                let value = row.get_ref(i).map_err(reject)?;
                out.insert(name.clone(), value_from_ref(value));
            }
            rows.push(out);
        }
        let truncated = rows.len() > row_limit;
        if truncated {
            rows.truncate(row_limit);
        }
        Ok(ExecutionResult::new(columns, rows, truncated))
    }
}

fn reject(err: duckdb::Error) -> EngineError {
    EngineError::Rejected(err.to_string())
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Boolean(b),
        ValueRef::TinyInt(n) => Value::Integer(n as i64),
        ValueRef::SmallInt(n) => Value::Integer(n as i64),
        ValueRef::Int(n) => Value::Integer(n as i64),
        ValueRef::BigInt(n) => Value::Integer(n),
        ValueRef::HugeInt(n) => Value::Integer(n as i64),
        ValueRef::UTinyInt(n) => Value::Integer(n as i64),
        ValueRef::USmallInt(n) => Value::Integer(n as i64),
        ValueRef::UInt(n) => Value::Integer(n as i64),
        ValueRef::UBigInt(n) => Value::Integer(n as i64),
        ValueRef::Float(n) => Value::Float(n as f64),
        ValueRef::Double(n) => Value::Float(n),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        other => Value::Text(format!("{:?}", other)),
    }
}
