//! The execution-adapter boundary.
//!
//! The core treats the embedded columnar engine as a query-in/rows-out
//! oracle behind the [`Engine`] trait: it never inspects plans, and it hands
//! the engine syntactically complete query text together with a bounded row
//! limit. The handle is injected wherever execution is needed (constructed
//! once per session, dropped at teardown) rather than living in ambient
//! global state.

use crate::value::Row;

/// Row cap for in-cell previews.
pub const PREVIEW_ROW_LIMIT: usize = 100;

/// Row cap for the main result view.
pub const MAIN_VIEW_ROW_LIMIT: usize = 10_000;

/// Row cap used by schema introspection probes.
pub const INTROSPECT_ROW_LIMIT: usize = 1;

/// Value the engine's pivot row ceiling is raised to at connect time, so
/// pivot-style queries are not truncated below practical dataset sizes.
pub const PIVOT_ROW_CEILING: u64 = 1_000_001;

/// Maximum attempts for transient connection-level failures.
pub const CONNECT_RETRY_LIMIT: u32 = 3;

/// The outcome of one execution call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionResult {
    /// Result shape, in column order. Present even when `rows` is empty,
    /// which is what makes introspection of empty results possible.
    pub columns: Vec<String>,
    /// Materialized rows, at most the requested limit.
    pub rows: Vec<Row>,
    /// Number of rows materialized.
    pub row_count: usize,
    /// True when the limit cut the result short.
    pub truncated: bool,
}

impl ExecutionResult {
    /// A result with the given shape and rows; fills in the count.
    pub fn new(columns: Vec<String>, rows: Vec<Row>, truncated: bool) -> Self {
        let row_count = rows.len();
        ExecutionResult {
            columns,
            rows,
            row_count,
            truncated,
        }
    }
}

/// Errors reported by an engine adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The engine is not connected or not finished initializing. Transient;
    /// eligible for bounded retry.
    NotReady,

    /// The engine rejected the query (malformed SQL, unknown column).
    /// Deterministic; never retried.
    Rejected(String),

    /// The engine ran out of memory or another resource.
    Exhausted(String),

    /// The engine did not answer in time.
    Timeout,

    /// The session was torn down.
    Closed,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotReady => write!(f, "engine is not ready"),
            EngineError::Rejected(msg) => write!(f, "engine rejected query: {}", msg),
            EngineError::Exhausted(msg) => write!(f, "engine resources exhausted: {}", msg),
            EngineError::Timeout => write!(f, "engine timed out"),
            EngineError::Closed => write!(f, "engine session is closed"),
        }
    }
}

impl std::error::Error for EngineError {}

/// One logical connection to the embedded engine, reused across all calls.
pub trait Engine {
    /// Establish the connection and apply session configuration, including
    /// raising the pivot row ceiling to [`PIVOT_ROW_CEILING`]. Idempotent on
    /// an already-open connection.
    fn connect(&mut self) -> Result<(), EngineError>;

    /// Tear the connection down.
    fn disconnect(&mut self);

    /// Run `query` and materialize at most `row_limit` rows.
    fn execute(&mut self, query: &str, row_limit: usize) -> Result<ExecutionResult, EngineError>;
}

/// Execute, retrying only transient [`EngineError::NotReady`] failures, at
/// most [`CONNECT_RETRY_LIMIT`] attempts. A [`EngineError::Rejected`] query
/// is never retried: the text is deterministic, so a retry cannot succeed.
pub fn execute_with_retry(
    engine: &mut dyn Engine,
    query: &str,
    row_limit: usize,
) -> Result<ExecutionResult, EngineError> {
    let mut attempt = 1;
    loop {
        match engine.execute(query, row_limit) {
            Err(EngineError::NotReady) if attempt < CONNECT_RETRY_LIMIT => {
                attempt += 1;
                engine.connect()?;
            }
            other => return other,
        }
    }
}
