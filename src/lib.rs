pub mod engine;
pub mod fragment;
pub mod merge;
pub mod pipeline;
pub mod schema;
pub mod script;
pub mod value;

#[cfg(feature = "duckdb")]
pub mod duck;

#[cfg(feature = "cli")]
pub mod cli;

pub use engine::{
    execute_with_retry, Engine, EngineError, ExecutionResult, MAIN_VIEW_ROW_LIMIT,
    PREVIEW_ROW_LIMIT,
};
pub use fragment::{generate, CellParams, DedupeKey, Fragment, FragmentError};
pub use merge::{merge, MergeError};
pub use pipeline::{Cell, ExecutionRequest, Pipeline, PipelineError};
pub use schema::{introspect, SchemaSnapshot};
pub use script::{ScriptChannel, ScriptError};
pub use value::{Row, Value};

#[cfg(feature = "duckdb")]
pub use duck::DuckEngine;
