//! Errors surfaced by the engine. Only caller-side defects end up here; bad
//! user input is replaced by defaults and empty selections yield empty output.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A split role or level spec names something that is not a column.
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    /// A grouping request that cannot be evaluated against the rows.
    #[error("malformed grouping: {0}")]
    MalformedGrouping(String),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
