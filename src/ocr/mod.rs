//! OCR engine interface.

use std::fmt;

use crate::{data_url::Base64Image, errors::OcrError, prelude::*};

pub mod vision;

/// Plain text recognized in an image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecognizedText(pub String);

impl RecognizedText {
    /// The recognized text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecognizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Interface to an OCR engine.
///
/// Engines are stateless, and make exactly one attempt per call.
#[async_trait]
pub trait OcrEngine: Send + Sync + 'static {
    /// Recognize all the text in an image.
    async fn recognize(&self, image: &Base64Image) -> Result<RecognizedText, OcrError>;
}
