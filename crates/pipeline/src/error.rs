//! Error types for the pipeline system.

use thiserror::Error;

/// Failure of a single stage: configuration/setup problems or a fatal
/// condition hit while processing. Per-epoch rejection is not an error; a
/// stage rejects by returning `Ok(None)` from `process`.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("bad param {0}")]
    BadParam(String),

    #[error("invalid configuration: {0}")]
    BadConfig(String),

    #[error("stage type not found: {0}")]
    NotFound(String),

    #[error("a source stage cannot take input")]
    UnexpectedInput,

    #[error("missing input epoch")]
    MissingInput,

    #[error("fatal error: {0}")]
    Fatal(String),
}

impl From<serde_json::Error> for StageError {
    fn from(err: serde_json::Error) -> Self {
        StageError::BadConfig(err.to_string())
    }
}

/// Pipeline-level failures: an invalid stage list, or a stage error wrapped
/// with the name of the stage that raised it. Any of these aborts the whole
/// run; nothing is partially applied.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("pipeline must contain at least one stage")]
    Empty,

    #[error("first stage '{name}' is not a source")]
    FirstStageNotSource { name: String },

    #[error("stage '{name}' is a source but only the first stage may be one")]
    ExtraSource { name: String },

    #[error("invalid stage configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: StageError,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
