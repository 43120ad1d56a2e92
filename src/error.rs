//! Error types for the analysis engine.

use thiserror::Error;

/// Errors surfaced by the engine and its collaborators.
///
/// `Parse` fails a single-file analysis only and never touches persisted
/// state. `Persistence` is reported alongside degraded results rather than
/// thrown (see `AnalysisResult::degraded`); it only appears as a hard error
/// from store lifecycle calls. `Configuration` fails fast at construction,
/// before any analysis runs.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("parse error in {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    pub fn parse(file: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Parse {
            file: file.into(),
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        EngineError::Configuration(reason.into())
    }
}
