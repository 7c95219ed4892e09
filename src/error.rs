//! Error types for this crate.
//!
//! All fallible operations return [`Result<T>`] which uses [`PipelineError`] as the error type.
//! Model loading additionally wraps the cause in a [`LoadError`] that remembers which
//! identifier failed, so a caller comparing two models can report one failure and keep going.

use thiserror::Error;

/// A [`Result`](std::result::Result) alias using [`PipelineError`] as the error type.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The unified error type for all crate errors.
///
/// # Example
///
/// ```rust
/// use sentiment_lens::error::PipelineError;
///
/// fn handle_error(e: PipelineError) {
///     match &e {
///         PipelineError::Download(_) => {
///             // Network issue or unknown repository - check the identifier
///         }
///         PipelineError::UnsupportedModel(_) => {
///             // Architecture or label count we cannot serve - pick another model
///         }
///         PipelineError::Attribution(_) => {
///             // Explanation failed for this model only
///         }
///         _ => {
///             eprintln!("error: {e}");
///         }
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PipelineError {
    /// Network or download failure, including unknown repositories.
    #[error("{0}")]
    Download(String),

    /// Tokenizer could not be loaded or failed on an input.
    #[error("{0}")]
    Tokenization(String),

    /// Checkpoint architecture or label count is not supported.
    #[error("{0}")]
    UnsupportedModel(String),

    /// Device initialization failure. Fall back to CPU.
    #[error("{0}")]
    Device(String),

    /// The perturbation pass produced unusable numbers.
    #[error("{0}")]
    Attribution(String),

    /// Internal error. Report if seen.
    #[error("{0}")]
    Unexpected(String),
}

/// A model identifier that could not be turned into a working classifier.
#[derive(Error, Debug)]
#[error("failed to load model '{model_id}': {source}")]
pub struct LoadError {
    /// The identifier that was requested.
    pub model_id: String,
    /// What went wrong.
    #[source]
    pub source: PipelineError,
}

impl LoadError {
    pub(crate) fn new(model_id: impl Into<String>, source: PipelineError) -> Self {
        Self {
            model_id: model_id.into(),
            source,
        }
    }
}

impl From<hf_hub::api::sync::ApiError> for PipelineError {
    fn from(value: hf_hub::api::sync::ApiError) -> Self {
        PipelineError::Download(format!("HuggingFace API error: {}", value))
    }
}

impl From<candle_core::Error> for PipelineError {
    fn from(value: candle_core::Error) -> Self {
        PipelineError::Unexpected(value.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(value: std::io::Error) -> Self {
        PipelineError::Unexpected(value.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(value: serde_json::Error) -> Self {
        PipelineError::Unexpected(value.to_string())
    }
}
