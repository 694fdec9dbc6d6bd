//! OCR using a Google Cloud Vision-style `images:annotate` endpoint.

use reqwest::{Client, header};

use crate::{config::OcrConfig, data_url::Base64Image, errors::OcrError, prelude::*};

use super::{OcrEngine, RecognizedText};

/// The feature we ask for. Dense document text works much better on receipts
/// than plain `TEXT_DETECTION`.
const FEATURE_TYPE: &str = "DOCUMENT_TEXT_DETECTION";

/// Header used to pick the project we're billed against.
const PROJECT_HEADER: &str = "x-goog-user-project";

/// Request body for `images:annotate`.
#[derive(Debug, Serialize)]
struct AnnotateRequest<'a> {
    requests: Vec<AnnotateImageRequest<'a>>,
}

#[derive(Debug, Serialize)]
struct AnnotateImageRequest<'a> {
    image: ImageContent<'a>,
    features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
struct ImageContent<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    feature_type: &'static str,
}

impl<'a> AnnotateRequest<'a> {
    /// Ask for document text detection on a single image.
    fn for_image(image: &'a Base64Image) -> Self {
        Self {
            requests: vec![AnnotateImageRequest {
                image: ImageContent {
                    content: image.as_base64(),
                },
                features: vec![Feature {
                    feature_type: FEATURE_TYPE,
                }],
            }],
        }
    }
}

/// Response body for `images:annotate`. We only declare the parts we use.
#[derive(Debug, Default, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    full_text_annotation: Option<TextAnnotation>,
    error: Option<ServiceStatus>,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    text: Option<String>,
}

/// An error reported by the service, either per-image or for the whole call.
#[derive(Debug, Deserialize)]
struct ServiceStatus {
    #[serde(default)]
    message: String,
}

/// Error body returned with a non-success HTTP status.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ServiceStatus,
}

impl AnnotateResponse {
    /// Pull the recognized text out of a response.
    fn into_text(self) -> Result<RecognizedText, OcrError> {
        let first = self
            .responses
            .into_iter()
            .next()
            .ok_or(OcrError::MissingAnnotation)?;
        if let Some(error) = first.error {
            return Err(OcrError::Rejected {
                message: error.message,
            });
        }
        let text = first
            .full_text_annotation
            .and_then(|annotation| annotation.text)
            .ok_or(OcrError::MissingAnnotation)?;
        if text.trim().is_empty() {
            return Err(OcrError::EmptyText);
        }
        Ok(RecognizedText(text))
    }
}

/// OCR engine which calls a Vision-compatible REST API.
#[derive(Debug)]
pub struct VisionOcrEngine {
    client: Client,
    config: OcrConfig,
}

impl VisionOcrEngine {
    /// Create a new engine.
    pub fn new(config: OcrConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// The URL we post images to.
    fn annotate_url(&self) -> String {
        format!("{}/images:annotate", self.config.api_base)
    }
}

#[async_trait]
impl OcrEngine for VisionOcrEngine {
    #[instrument(level = "debug", skip_all, fields(image = ?image))]
    async fn recognize(&self, image: &Base64Image) -> Result<RecognizedText, OcrError> {
        let mut req = self
            .client
            .post(self.annotate_url())
            .bearer_auth(&self.config.api_key)
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .json(&AnnotateRequest::for_image(image));
        if let Some(project_id) = &self.config.project_id {
            req = req.header(PROJECT_HEADER, project_id);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = serde_json::from_str::<ErrorResponse>(&body)
                .map(|err| err.error.message)
                .unwrap_or(body);
            error!(%status, %body, "OCR request failed");
            return Err(OcrError::Status { status, body });
        }

        let response = response.json::<AnnotateResponse>().await?;
        let text = response.into_text()?;
        debug!(chars = text.as_str().len(), "Recognized text");
        trace!(%text, "OCR text");
        Ok(text)
    }
}
