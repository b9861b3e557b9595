//! Boundary for the secondary, script-based execution channel.
//!
//! The channel runs user-supplied scripts over the current cumulative
//! query's result. It is opaque to the core and fully decoupled from the
//! engine: it has its own request/response pair and never shares the
//! engine's execution slot, so a long script cannot block query previews.

use crate::engine::ExecutionResult;

/// Errors reported by a script channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// The channel itself failed (worker gone, transport broken).
    Channel(String),

    /// The user's script raised an error.
    Script(String),
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptError::Channel(msg) => write!(f, "script channel failed: {}", msg),
            ScriptError::Script(msg) => write!(f, "script error: {}", msg),
        }
    }
}

impl std::error::Error for ScriptError {}

/// A secondary execution channel accepting a script plus the current
/// cumulative query and returning transformed rows.
pub trait ScriptChannel {
    fn transform(
        &mut self,
        script: &str,
        upstream_query: &str,
    ) -> Result<ExecutionResult, ScriptError>;
}
