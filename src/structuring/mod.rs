//! Structuring drivers, which turn OCR text into (hopefully) receipt JSON.
//!
//! Drivers only fetch the model's raw text. Checking that it's actually a
//! receipt is [`crate::validator`]'s job.

use clap::Args;

use crate::{
    errors::StructuringServiceError, ocr::RecognizedText, prelude::*,
    validator::RawModelOutput,
};

pub mod openai;
pub mod prompt;

/// Default model for structuring receipts.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Options for the structuring service.
#[derive(Args, Clone, Debug)]
pub struct StructuringOpts {
    /// The model to use for structuring receipt text.
    #[clap(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// The temperature to use for sampling, between 0.0 and 2.0. We want
    /// the same receipt to produce the same JSON, so this defaults to 0.
    #[clap(long, default_value_t = 0.0)]
    pub temperature: f32,
}

impl Default for StructuringOpts {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            temperature: 0.0,
        }
    }
}

/// Interface trait for structuring drivers.
#[async_trait]
pub trait StructuringDriver: Send + Sync + 'static {
    /// Ask the model to structure `text`, and return its raw reply.
    async fn structure(
        &self,
        text: &RecognizedText,
    ) -> Result<RawModelOutput, StructuringServiceError>;
}
