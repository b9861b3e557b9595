//! CLI support for cellpipe
//!
//! Provides programmatic access to the cellpipe CLI functionality for
//! embedding in other tools.

mod check;
mod load;

pub use check::{execute_check, CheckOptions, CheckResult};
pub use load::{pipeline_from_json, result_to_json};

use std::io;

use crate::engine::EngineError;
use crate::pipeline::PipelineError;

/// Errors that can occur during CLI operations
#[derive(Debug)]
pub enum CliError {
    /// The pipeline description JSON does not describe valid cells
    Description(String),
    /// A pipeline operation failed
    Pipeline(PipelineError),
    /// The engine adapter failed
    Engine(EngineError),
    /// JSON parsing error
    Json(serde_json::Error),
    /// IO error
    Io(io::Error),
    /// No pipeline description provided
    NoInput,
    /// Execution was requested but no engine adapter is compiled in
    EngineUnavailable,
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Description(msg) => write!(f, "Invalid pipeline description: {}", msg),
            CliError::Pipeline(e) => write!(f, "Pipeline error: {}", e),
            CliError::Engine(e) => write!(f, "Engine error: {}", e),
            CliError::Json(e) => write!(f, "Invalid JSON: {}", e),
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::NoInput => {
                write!(f, "No pipeline description provided. Pass a file or pipe JSON to stdin.")
            }
            CliError::EngineUnavailable => {
                write!(f, "Executing pipelines requires the 'duckdb' feature.")
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Pipeline(e) => Some(e),
            CliError::Engine(e) => Some(e),
            CliError::Json(e) => Some(e),
            CliError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}
