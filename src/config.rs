//! Service credentials and endpoints.
//!
//! Secrets come from environment variables, which may be set in a standard
//! `.env` file. Everything else is a command-line option.

use std::fmt;

use async_openai::config::OpenAIConfig;

use crate::prelude::*;

/// Default endpoint for the OCR service.
pub const DEFAULT_OCR_API_BASE: &str = "https://vision.googleapis.com/v1";

/// Load variables from a `.env` file, if there is one.
pub fn load_dotenv() {
    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "Loaded .env file");
    }
}

/// How to reach the OCR service.
#[derive(Clone)]
pub struct OcrConfig {
    /// Base URL, without a trailing slash.
    pub api_base: String,

    /// Bearer token.
    pub api_key: String,

    /// Project to bill requests to, sent as `x-goog-user-project`.
    pub project_id: Option<String>,
}

impl OcrConfig {
    /// Read our configuration from `OCR_API_KEY`, `OCR_PROJECT_ID` and
    /// `OCR_API_BASE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read our configuration using `lookup` to find variables.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let api_key = non_empty("OCR_API_KEY")
            .ok_or_else(|| anyhow!("OCR_API_KEY must be set to use the OCR service"))?;
        let api_base = non_empty("OCR_API_BASE")
            .unwrap_or_else(|| DEFAULT_OCR_API_BASE.to_owned())
            .trim_end_matches('/')
            .to_owned();
        Ok(Self {
            api_base,
            api_key,
            project_id: non_empty("OCR_PROJECT_ID"),
        })
    }
}

// Keep our token out of logs.
impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Get the OpenAI client configuration from `OPENAI_API_KEY` and
/// `OPENAI_API_BASE`.
pub fn openai_client_config() -> OpenAIConfig {
    let mut client_config = OpenAIConfig::new();
    if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
        client_config = client_config.with_api_key(api_key);
    }
    if let Ok(api_base) = std::env::var("OPENAI_API_BASE") {
        client_config = client_config.with_api_base(api_base);
    }
    client_config
}
