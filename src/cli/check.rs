//! Validate a pipeline description and, when data is supplied, resolve and
//! execute it against the embedded engine.

use super::{pipeline_from_json, CliError};
use crate::pipeline::Pipeline;

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The pipeline description JSON
    pub pipeline: String,
    /// Path to a CSV file to load as the source table
    pub data: Option<String>,
    /// Pretty-print the output
    pub pretty: bool,
    /// Only validate the description, don't execute
    pub syntax_only: bool,
}

/// Result of a check operation
#[derive(Debug)]
pub enum CheckResult {
    /// Description validation passed
    DescriptionValid { cells: usize },
    /// Pipeline resolved and executed; per-cell SQL plus final rows
    Executed {
        queries: Vec<(String, String)>,
        rows: serde_json::Value,
    },
}

/// Execute a cellpipe check operation
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let root: serde_json::Value = serde_json::from_str(&options.pipeline)?;
    let cells = pipeline_from_json(&root)?;

    let mut iter = cells.into_iter();
    let source = iter.next().ok_or(CliError::NoInput)?;
    let mut pipeline = Pipeline::new(source)?;
    for params in iter {
        pipeline.push(params);
    }

    if options.syntax_only || options.data.is_none() {
        return Ok(CheckResult::DescriptionValid {
            cells: pipeline.len(),
        });
    }

    run_pipeline(&mut pipeline, options)
}

#[cfg(feature = "duckdb")]
fn run_pipeline(
    pipeline: &mut Pipeline,
    options: &CheckOptions,
) -> Result<CheckResult, CliError> {
    use super::result_to_json;
    use crate::duck::DuckEngine;
    use crate::engine::{execute_with_retry, MAIN_VIEW_ROW_LIMIT};
    use crate::fragment::CellParams;
    use std::path::Path;

    let data = options.data.as_deref().ok_or(CliError::NoInput)?;
    let table = match pipeline.cell(0).map(|c| c.params()) {
        Some(CellParams::Source { table }) => table.clone(),
        _ => return Err(CliError::Description("missing source cell".to_string())),
    };

    let mut engine = DuckEngine::in_memory()?;
    engine.register_csv(&table, Path::new(data))?;

    // The callback cannot borrow the pipeline while it is being resolved;
    // collect the queries first and pair them with kinds afterwards.
    let mut resolved: Vec<(usize, String)> = Vec::new();
    pipeline.resolve(&mut engine, |index, query| {
        resolved.push((index, query.to_string()));
    })?;
    let queries: Vec<(String, String)> = resolved
        .into_iter()
        .map(|(i, query)| {
            let kind = pipeline
                .cell(i)
                .map(|c| c.params().kind_name().to_string())
                .unwrap_or_default();
            (kind, query)
        })
        .collect();

    let request = pipeline.execution_request(pipeline.len() - 1, MAIN_VIEW_ROW_LIMIT)?;
    let result = execute_with_retry(&mut engine, &request.query, request.row_limit)?;
    if !pipeline.is_current(&request) {
        return Err(CliError::Pipeline(
            crate::pipeline::PipelineError::StaleDependency {
                index: request.index,
            },
        ));
    }
    Ok(CheckResult::Executed {
        queries,
        rows: result_to_json(&result),
    })
}

#[cfg(not(feature = "duckdb"))]
fn run_pipeline(
    _pipeline: &mut Pipeline,
    _options: &CheckOptions,
) -> Result<CheckResult, CliError> {
    Err(CliError::EngineUnavailable)
}
