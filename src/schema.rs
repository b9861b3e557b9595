//! Schema introspection: deriving the current column set of a cumulative
//! query by probing the engine with a near-zero row limit.
//!
//! Snapshots are advisory. They populate selection widgets and let
//! generators refuse obviously wrong fragments early; the engine stays the
//! source of truth for whether a generated query is valid.

use crate::engine::{execute_with_retry, Engine, EngineError, INTROSPECT_ROW_LIMIT};

/// The column set of one cumulative query, in result order.
///
/// Not persisted; recomputed on demand by the cell that needs it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaSnapshot {
    columns: Vec<String>,
}

impl SchemaSnapshot {
    pub fn from_columns(columns: Vec<String>) -> Self {
        SchemaSnapshot { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Derive the column set of `query` by executing it with
/// [`INTROSPECT_ROW_LIMIT`] and reading back the result shape.
pub fn introspect(engine: &mut dyn Engine, query: &str) -> Result<SchemaSnapshot, EngineError> {
    let result = execute_with_retry(engine, query, INTROSPECT_ROW_LIMIT)?;
    Ok(SchemaSnapshot::from_columns(result.columns))
}
