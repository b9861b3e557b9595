//! Pipeline state: the ordered cell sequence and its incremental
//! re-resolution.
//!
//! Each cell's cumulative query is derivable purely from its predecessor's
//! cumulative query plus its own parameters; no cell holds state reaching
//! further back. Staleness is monotonic: invalidating cell *i* invalidates
//! everything after it, and a failing cell blocks everything downstream
//! without touching earlier cells.
//!
//! Recomputation and execution are decoupled. Resolving produces query text
//! synchronously; execution happens whenever the caller gets to it, against
//! an [`ExecutionRequest`] ticket carrying the cell's generation at issue
//! time. A later edit bumps the generation, so a superseded execution's
//! result is detectable and discarded no matter when it completes: the
//! last-issued request for a cell index always wins.

use crate::engine::{Engine, EngineError, MAIN_VIEW_ROW_LIMIT};
use crate::fragment::{generate, CellParams, FragmentError};
use crate::merge::{merge, MergeError};
use crate::schema::introspect;

/// One pipeline step: its parameters and, once resolved, the cumulative
/// query representing everything up to and including it.
#[derive(Debug, Clone)]
pub struct Cell {
    params: CellParams,
    cumulative: Option<String>,
    generation: u64,
}

impl Cell {
    pub fn params(&self) -> &CellParams {
        &self.params
    }

    /// The resolved cumulative query, absent while the cell is stale.
    pub fn cumulative(&self) -> Option<&str> {
        self.cumulative.as_deref()
    }

    /// Bumped on every edit that invalidates this cell's resolution.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Errors surfaced by pipeline operations, each tied to the failing cell.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Fragment generation failed for the cell at `index`.
    Fragment { index: usize, source: FragmentError },

    /// Merging the cell's fragment with its upstream failed.
    Merge { index: usize, source: MergeError },

    /// The engine failed while introspecting or executing for the cell.
    Engine { index: usize, source: EngineError },

    /// The cell's predecessor has no valid cumulative query yet.
    StaleDependency { index: usize },

    /// No cell at `index`, or the operation is not allowed there.
    BadIndex { index: usize },

    /// Index 0 must hold a data-source cell.
    SourceRequired,
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Fragment { index, source } => {
                write!(f, "cell {}: {}", index, source)
            }
            PipelineError::Merge { index, source } => write!(f, "cell {}: {}", index, source),
            PipelineError::Engine { index, source } => write!(f, "cell {}: {}", index, source),
            PipelineError::StaleDependency { index } => {
                write!(f, "cell {}: upstream query is not resolved yet", index)
            }
            PipelineError::BadIndex { index } => write!(f, "no cell at index {}", index),
            PipelineError::SourceRequired => {
                write!(f, "the first cell of a pipeline must be a data source")
            }
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Fragment { source, .. } => Some(source),
            PipelineError::Merge { source, .. } => Some(source),
            PipelineError::Engine { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl PipelineError {
    /// The failing cell's index, where one applies.
    pub fn index(&self) -> Option<usize> {
        match self {
            PipelineError::Fragment { index, .. }
            | PipelineError::Merge { index, .. }
            | PipelineError::Engine { index, .. }
            | PipelineError::StaleDependency { index }
            | PipelineError::BadIndex { index } => Some(*index),
            PipelineError::SourceRequired => None,
        }
    }
}

/// A ticket for executing one cell's cumulative query.
///
/// Carries the cell's generation at issue time; check
/// [`Pipeline::is_current`] before applying the completed result.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    pub index: usize,
    pub generation: u64,
    pub query: String,
    pub row_limit: usize,
}

/// The ordered, non-empty cell sequence of one session.
#[derive(Debug, Clone)]
pub struct Pipeline {
    cells: Vec<Cell>,
    next_generation: u64,
}

impl Pipeline {
    /// Create a pipeline anchored by a data-source cell.
    pub fn new(source: CellParams) -> Result<Self, PipelineError> {
        if !source.is_source() {
            return Err(PipelineError::SourceRequired);
        }
        let mut pipeline = Pipeline {
            cells: Vec::new(),
            next_generation: 0,
        };
        let generation = pipeline.bump();
        pipeline.cells.push(Cell {
            params: source,
            cumulative: None,
            generation,
        });
        Ok(pipeline)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false; a pipeline keeps its source cell for its whole life.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// The resolved cumulative query of the cell at `index`, if any.
    pub fn cumulative(&self, index: usize) -> Option<&str> {
        self.cells.get(index).and_then(|c| c.cumulative())
    }

    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Append a cell. It starts stale; resolve from its index afterwards.
    pub fn push(&mut self, params: CellParams) -> usize {
        let generation = self.bump();
        self.cells.push(Cell {
            params,
            cumulative: None,
            generation,
        });
        self.cells.len() - 1
    }

    /// Replace the parameters of the cell at `index`, invalidating it and
    /// every cell after it.
    pub fn set_params(&mut self, index: usize, params: CellParams) -> Result<(), PipelineError> {
        if index >= self.cells.len() {
            return Err(PipelineError::BadIndex { index });
        }
        if index == 0 && !params.is_source() {
            return Err(PipelineError::SourceRequired);
        }
        self.cells[index].params = params;
        self.invalidate_from(index);
        Ok(())
    }

    /// Delete the cell at `index` (never the source cell) and invalidate
    /// the tail, which now depends on a new predecessor.
    pub fn remove(&mut self, index: usize) -> Result<CellParams, PipelineError> {
        if index == 0 || index >= self.cells.len() {
            return Err(PipelineError::BadIndex { index });
        }
        let removed = self.cells.remove(index);
        self.invalidate_from(index);
        Ok(removed.params)
    }

    /// Delete the last cell, if it is not the source cell. Discards only the
    /// removed cell's state; earlier cells keep their resolved queries.
    pub fn pop(&mut self) -> Option<CellParams> {
        if self.cells.len() <= 1 {
            return None;
        }
        self.cells.pop().map(|c| c.params)
    }

    /// Keep only the first `keep` cells (at least the source cell). Never
    /// recomputes the surviving cells.
    pub fn truncate(&mut self, keep: usize) {
        let keep = keep.max(1);
        self.cells.truncate(keep);
    }

    fn invalidate_from(&mut self, index: usize) {
        for i in index..self.cells.len() {
            let generation = self.bump();
            let cell = &mut self.cells[i];
            cell.cumulative = None;
            cell.generation = generation;
        }
    }

    /// Resolve every cell from index 0.
    pub fn resolve(
        &mut self,
        engine: &mut dyn Engine,
        on_resolved: impl FnMut(usize, &str),
    ) -> Result<(), PipelineError> {
        self.resolve_from(0, engine, on_resolved)
    }

    /// Recompute cumulative queries from `start` to the end of the pipeline.
    ///
    /// For each cell in order: introspect the predecessor's columns where
    /// the generator needs them, generate the fragment, merge it with the
    /// predecessor's cumulative query, store the result, and call
    /// `on_resolved(index, query)` exactly once. `on_resolved` is never
    /// called for a failing cell; the first failure stops the walk and
    /// leaves that cell and everything after it stale.
    pub fn resolve_from(
        &mut self,
        start: usize,
        engine: &mut dyn Engine,
        mut on_resolved: impl FnMut(usize, &str),
    ) -> Result<(), PipelineError> {
        if start >= self.cells.len() {
            return Err(PipelineError::BadIndex { index: start });
        }
        for index in start..self.cells.len() {
            let params = self.cells[index].params.clone();
            let upstream = if index == 0 {
                String::new()
            } else {
                match self.cells[index - 1].cumulative() {
                    Some(q) => q.to_string(),
                    None => return Err(PipelineError::StaleDependency { index }),
                }
            };
            let snapshot = if params.needs_schema() {
                if upstream.is_empty() {
                    return Err(PipelineError::StaleDependency { index });
                }
                Some(
                    introspect(engine, &upstream)
                        .map_err(|source| PipelineError::Engine { index, source })?,
                )
            } else {
                None
            };
            let fragment = generate(&params, snapshot.as_ref())
                .map_err(|source| PipelineError::Fragment { index, source })?;
            let query = merge(&upstream, &fragment)
                .map_err(|source| PipelineError::Merge { index, source })?;
            self.cells[index].cumulative = Some(query);
            on_resolved(index, self.cells[index].cumulative().unwrap_or_default());
        }
        Ok(())
    }

    /// Issue an execution ticket for the cell at `index`. The row limit is
    /// clamped to [`MAIN_VIEW_ROW_LIMIT`] so no caller can request unbounded
    /// materialization.
    pub fn execution_request(
        &self,
        index: usize,
        row_limit: usize,
    ) -> Result<ExecutionRequest, PipelineError> {
        let cell = self
            .cells
            .get(index)
            .ok_or(PipelineError::BadIndex { index })?;
        let query = cell
            .cumulative()
            .ok_or(PipelineError::StaleDependency { index })?;
        Ok(ExecutionRequest {
            index,
            generation: cell.generation,
            query: query.to_string(),
            row_limit: row_limit.min(MAIN_VIEW_ROW_LIMIT),
        })
    }

    /// Whether a completed execution for `request` may still be applied, or
    /// a newer edit has superseded it.
    pub fn is_current(&self, request: &ExecutionRequest) -> bool {
        self.cells
            .get(request.index)
            .map(|c| c.generation == request.generation)
            .unwrap_or(false)
    }
}
