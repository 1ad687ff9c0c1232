//! Error types for the engine layer.

use pcmstream_core::{FormatIssue, StreamFormat};
use thiserror::Error;

use crate::controller::StreamState;

/// Status reported by an output engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine cannot open a stream with the requested mode/format.
    #[error("format rejected: {0}")]
    FormatRejected(String),

    #[error("engine is not initialized")]
    NotInitialized,

    #[error("engine is already initialized")]
    AlreadyInitialized,

    #[error("engine is already streaming")]
    AlreadyStreaming,

    #[error("no output device available")]
    NoDevice,

    /// Host audio API failure (device lost, stream build/play failed, …).
    #[error("audio backend error: {0}")]
    Backend(String),
}

impl From<FormatIssue> for EngineError {
    fn from(issue: FormatIssue) -> Self {
        EngineError::FormatRejected(issue.to_string())
    }
}

/// A lifecycle call that could not be carried out.
///
/// Fatal to the attempted transition only; the controller keeps its
/// previous state and the caller decides whether to retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Called out of sequence.
    #[error("cannot {op} while {state}")]
    InvalidTransition { op: &'static str, state: StreamState },

    /// Valid PCM, but not a layout the stereo generator renders.
    #[error("cannot render {format}: only 16-bit stereo is supported")]
    UnsupportedLayout { format: StreamFormat },

    /// The engine refused the request.
    #[error("engine rejected the request: {0}")]
    Engine(#[from] EngineError),
}

/// Convenience Result type for lifecycle calls.
pub type Result<T> = std::result::Result<T, ConfigurationError>;
