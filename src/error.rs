use thiserror::Error;

/// Top-level error surfaced by the binary: a process exit code plus a message.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Errors raised inside the ingestion pipeline.
///
/// Only some of these are fatal: the pipeline recovers from testing-feed and
/// per-snapshot failures on its own and returns the rest to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A remote feed could not be fetched or decoded as its declared shape.
    #[error("source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// A table is missing a required column (or an alias of one).
    #[error("unrecognized schema in '{source_name}': {detail}")]
    UnrecognizedSchema { source_name: String, detail: String },

    /// No cached copy exists to fall back to.
    #[error("no cached copy at '{path}'")]
    CacheMiss { path: String },

    /// An assembled payload could not be decoded back into tables.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn unavailable(source_name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn schema(source_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnrecognizedSchema {
            source_name: source_name.into(),
            detail: detail.into(),
        }
    }

    /// Exit code used when this error ends a CLI run.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::InvalidPayload(_) | PipelineError::Io { .. } => 2,
            _ => 4,
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}
