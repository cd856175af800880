//! Error types for the generation pipeline.

use serde::{Deserialize, Serialize};
use sketch_core::CoreError;
use thiserror::Error;

/// Errors that can occur while talking to the generation service.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Input was rejected before any request was sent.
    #[error(transparent)]
    Core(#[from] CoreError),
    /// The generation endpoint URL is invalid.
    #[error("invalid generation endpoint URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed (connection, body read, etc.).
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The service answered with a failure status or an in-stream error event.
    #[error("generation service error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Upstream {
        /// HTTP status, when the failure came from the response status.
        status: Option<u16>,
        /// Message reported by the service.
        message: String,
    },
    /// A stream line could not be parsed and strict decoding is enabled.
    #[error("malformed stream event: {0}")]
    MalformedStreamEvent(String),
}

impl AgentError {
    /// Returns true if the error was raised before any network call.
    #[must_use]
    pub fn is_preflight(&self) -> bool {
        matches!(self, Self::Core(_) | Self::InvalidUrl(_))
    }

    /// Shorthand for an in-stream upstream error.
    #[must_use]
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            status: None,
            message: message.into(),
        }
    }
}

/// A failed orchestration together with the reasoning gathered so far.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct OrchestrationError {
    /// What went wrong.
    #[source]
    pub error: AgentError,
    /// Thinking trace accumulated up to the failure point.
    pub thinking_trace: String,
}

impl OrchestrationError {
    /// Wrap an error that happened before any trace was produced.
    #[must_use]
    pub fn without_trace(error: impl Into<AgentError>) -> Self {
        Self {
            error: error.into(),
            thinking_trace: String::new(),
        }
    }

    /// User-facing explanation.
    #[must_use]
    pub fn message(&self) -> String {
        self.error.to_string()
    }

    /// What the caller shows when a run fails.
    #[must_use]
    pub fn report(&self) -> FailureReport {
        FailureReport {
            diagram_text: None,
            message: self.message(),
            thinking_trace: self.thinking_trace.clone(),
        }
    }
}

/// Caller-facing form of a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    /// Always `None`; present so success and failure share a shape.
    pub diagram_text: Option<String>,
    /// Explanation of the failure.
    pub message: String,
    /// Reasoning received before the failure.
    pub thinking_trace: String,
}
