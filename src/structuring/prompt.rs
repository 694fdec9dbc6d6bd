//! The instruction prompt sent to the structuring service.

use handlebars::Handlebars;

use crate::{ocr::RecognizedText, prelude::*};

/// Our built-in prompt. It ends with the OCR text, so the rendered message is
/// the instructions followed by the receipt.
const DEFAULT_RECEIPT_PROMPT: &str = include_str!("receipt_prompt.hbs");

/// The placeholder where OCR text goes. Triple braces, so nothing is
/// HTML-escaped.
const OCR_TEXT_PLACEHOLDER: &str = "{{{ocr_text}}}";

/// A prompt template for turning OCR text into receipt JSON.
#[derive(Clone, Debug)]
pub struct ReceiptPrompt {
    template: String,
}

impl Default for ReceiptPrompt {
    fn default() -> Self {
        Self {
            template: DEFAULT_RECEIPT_PROMPT.trim_end().to_owned(),
        }
    }
}

impl ReceiptPrompt {
    /// Use a custom template. If it doesn't mention `{{{ocr_text}}}`, the OCR
    /// text is appended to the end.
    pub fn from_template(template: impl Into<String>) -> Self {
        let mut template = template.into();
        if !template.contains(OCR_TEXT_PLACEHOLDER) {
            if !template.is_empty() && !template.ends_with('\n') {
                template.push('\n');
            }
            template.push_str(OCR_TEXT_PLACEHOLDER);
        }
        Self { template }
    }

    /// Load a custom template from a file.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read prompt from {}", path.display()))?;
        Ok(Self::from_template(template))
    }

    /// The raw template.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the prompt for some OCR text.
    pub fn render(&self, text: &RecognizedText) -> Result<String, handlebars::RenderError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.render_template(&self.template, &json!({ "ocr_text": text.as_str() }))
    }
}
