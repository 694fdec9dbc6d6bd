//! Base64-encoded images, and converting them to and from `data:` URLs.

use std::sync::LazyLock;

use base64::{Engine as _, prelude::BASE64_STANDARD};
use regex::Regex;

/// Regex for parsing a `data:` URL.
static DATA_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^data:(?P<mime_type>[^;,]+);base64,(?P<data>.+)$")
        .expect("failed to compile regex")
});

/// An image, encoded as Base64 text. This is what camera plugins hand us, and
/// what the OCR service wants.
#[derive(Clone, PartialEq, Eq)]
pub struct Base64Image {
    /// The MIME type, if we know it.
    mime_type: Option<String>,

    /// Standard Base64, without any `data:` prefix.
    data: String,
}

impl Base64Image {
    /// Wrap Base64 text we got from somewhere else. Surrounding whitespace is
    /// removed.
    pub fn new(data: impl Into<String>) -> Self {
        let data = data.into();
        Self {
            mime_type: None,
            data: data.trim().to_owned(),
        }
    }

    /// Encode raw image bytes.
    pub fn from_bytes(mime_type: Option<&str>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.map(str::to_owned),
            data: BASE64_STANDARD.encode(bytes),
        }
    }

    /// Parse a `data:` URL. Returns `None` if this isn't a Base64 `data:` URL.
    pub fn from_data_url(data_url: &str) -> Option<Self> {
        let caps = DATA_URL_RE.captures(data_url.trim())?;
        Some(Self {
            mime_type: Some(caps.name("mime_type")?.as_str().to_owned()),
            data: caps.name("data")?.as_str().to_owned(),
        })
    }

    /// The MIME type, if known.
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    /// The Base64 text.
    pub fn as_base64(&self) -> &str {
        &self.data
    }

    /// Is there no image data at all?
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode the image to check that it's valid Base64, returning its size in
    /// bytes.
    pub fn decoded_len(&self) -> Result<usize, base64::DecodeError> {
        Ok(BASE64_STANDARD.decode(&self.data)?.len())
    }

    /// Convert to a `data:` URL.
    pub fn to_data_url(&self) -> String {
        // Some sources indicate that the Base64 data should be percent-encoded,
        // but in practice this breaks most consumers.
        format!(
            "data:{};base64,{}",
            self.mime_type().unwrap_or("application/octet-stream"),
            self.data
        )
    }
}

// Images are large, so don't dump them into our logs.
impl std::fmt::Debug for Base64Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Base64Image")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_round_trip() {
        let image = Base64Image::from_bytes(Some("image/png"), b"\x89PNG");
        let url = image.to_data_url();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(Base64Image::from_data_url(&url), Some(image));
    }

    #[test]
    fn test_rejects_non_data_urls() {
        assert!(Base64Image::from_data_url("https://example.com/a.png").is_none());
        assert!(Base64Image::from_data_url("data:image/png,rawtext").is_none());
    }

    #[test]
    fn test_decoded_len_checks_base64() {
        assert_eq!(Base64Image::new("aGVsbG8=").decoded_len().unwrap(), 5);
        assert!(Base64Image::new("not base64!").decoded_len().is_err());
    }

    #[test]
    fn test_debug_does_not_include_data() {
        let image = Base64Image::new("aGVsbG8=");
        assert!(!format!("{image:?}").contains("aGVsbG8"));
    }
}
