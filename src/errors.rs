//! Typed errors for each pipeline stage.
//!
//! Library code returns these so that [`crate::pipeline`] can attribute every
//! failure to a stage. Command-line glue wraps them in [`anyhow::Error`].

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

use crate::prelude::*;

/// The image-capture collaborator failed for some reason other than the
/// user cancelling.
#[derive(Debug, Error)]
#[error("image capture failed: {reason}")]
pub struct CaptureError {
    /// What went wrong.
    pub reason: String,
}

impl CaptureError {
    /// Create a new capture error.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The OCR service did not give us usable text.
#[derive(Debug, Error)]
pub enum OcrError {
    /// We couldn't talk to the service at all.
    #[error("could not reach OCR service: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with an error.
    #[error("OCR service returned {status}: {body}")]
    Status {
        /// HTTP status of the reply.
        status: StatusCode,
        /// Error text from the service, if any.
        body: String,
    },

    /// The service accepted the request, but reported an error for our image.
    #[error("OCR service rejected the image: {message}")]
    Rejected {
        /// Error text from the service.
        message: String,
    },

    /// The reply had no full-text annotation.
    #[error("OCR response has no full-text annotation")]
    MissingAnnotation,

    /// The service found no text in the image.
    #[error("OCR found no text in the image")]
    EmptyText,
}

/// The structuring (LLM) service did not give us a response.
#[derive(Debug, Error)]
pub enum StructuringServiceError {
    /// Transport or API-level failure.
    #[error("structuring service error: {0}")]
    Transport(#[from] async_openai::error::OpenAIError),

    /// The reply had no choices.
    #[error("structuring service returned no choices")]
    NoChoices,

    /// The first choice had no message content.
    #[error("structuring service returned an empty message")]
    EmptyContent,

    /// We couldn't build the prompt.
    #[error("could not render structuring prompt: {0}")]
    Prompt(#[from] handlebars::RenderError),
}

/// The structuring service's output could not be turned into a receipt.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The output wasn't JSON at all.
    #[error("model output is not valid JSON: {reason}")]
    MalformedOutput {
        /// Parser error message.
        reason: String,
    },

    /// The output was JSON, but not shaped like a receipt.
    #[error("model output does not match the receipt schema at {path}: {reason}")]
    Schema {
        /// Where the problem is, e.g. `items[2].cost`.
        path: String,
        /// What the problem is.
        reason: String,
    },
}

impl ValidationError {
    /// Build a [`ValidationError::Schema`].
    pub fn schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::Schema {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A cart operation referred to an item that doesn't exist.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("item index {index} is out of bounds for a cart with {len} items")]
pub struct IndexError {
    /// The requested index.
    pub index: usize,
    /// How many items the cart holds.
    pub len: usize,
}

/// A pipeline stage which can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Waiting on the image-capture collaborator.
    CapturingImage,
    /// Waiting on the OCR service.
    RecognizingText,
    /// Waiting on the structuring service, or validating its output.
    StructuringData,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CapturingImage => "capturing image",
            Stage::RecognizingText => "recognizing text",
            Stage::StructuringData => "structuring data",
        };
        f.write_str(name)
    }
}

/// A failure attributed to a specific stage, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{stage} failed: {reason}")]
pub struct StageFailure {
    /// The stage that failed.
    pub stage: Stage,
    /// Why it failed.
    pub reason: String,
}

impl StageFailure {
    /// Attribute an error to a stage.
    pub fn new(stage: Stage, error: &dyn std::error::Error) -> Self {
        Self {
            stage,
            reason: error.to_string(),
        }
    }
}
