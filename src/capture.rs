//! The image-capture collaborator.
//!
//! On a phone, this is the camera plugin. We only care about its contract:
//! it either hands us a Base64 image, or tells us the user cancelled.

use std::io;

use clap::{Args, ValueEnum};

use crate::{data_url::Base64Image, errors::CaptureError, prelude::*};

/// Image types we're willing to send to the OCR service.
const SUPPORTED_IMAGE_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/gif",
    "image/tiff",
    "image/bmp",
];

/// Where the image should come from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[clap(rename_all = "snake_case")]
pub enum CaptureSource {
    /// Take a new photo.
    #[default]
    Camera,
    /// Pick an existing photo.
    Gallery,
}

/// Options passed to the image-capture collaborator.
#[derive(Args, Clone, Debug, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Image quality, from 0 to 100.
    #[clap(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub quality: u8,

    /// Allow the user to crop or rotate the image before it's used.
    #[clap(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub allow_editing: bool,

    /// Where the image should come from.
    #[clap(long, value_enum, default_value_t = CaptureSource::default())]
    pub source: CaptureSource,
}

impl CaptureOptions {
    /// Build options, clamping `quality` to 100.
    pub fn new(quality: u8, allow_editing: bool, source: CaptureSource) -> Self {
        Self {
            quality: quality.min(100),
            allow_editing,
            source,
        }
    }
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self::new(100, true, CaptureSource::Camera)
    }
}

/// Interface to the image-capture collaborator.
#[async_trait]
pub trait ImageSource: Send + Sync + 'static {
    /// Capture an image. Returns `Ok(None)` if the user cancelled, which is
    /// not an error.
    async fn capture(
        &self,
        options: &CaptureOptions,
    ) -> Result<Option<Base64Image>, CaptureError>;
}

/// An image source that always returns the same result. Useful for tests and
/// for driving the pipeline from other code that already has an image.
#[derive(Clone, Debug)]
pub struct StaticImageSource {
    image: Option<Base64Image>,
}

impl StaticImageSource {
    /// Always return `image`.
    pub fn new(image: Base64Image) -> Self {
        Self { image: Some(image) }
    }

    /// Always report a cancellation.
    pub fn cancelled() -> Self {
        Self { image: None }
    }
}

#[async_trait]
impl ImageSource for StaticImageSource {
    async fn capture(
        &self,
        _options: &CaptureOptions,
    ) -> Result<Option<Base64Image>, CaptureError> {
        Ok(self.image.clone())
    }
}

/// An image source that reads a photo from disk, standing in for a camera.
#[derive(Clone, Debug)]
pub struct FileImageSource {
    path: Option<PathBuf>,
}

impl FileImageSource {
    /// Read the image at `path`. If `path` is `None`, we behave like a user
    /// who backed out of the camera.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ImageSource for FileImageSource {
    #[instrument(level = "debug", skip_all, fields(path = ?self.path))]
    async fn capture(
        &self,
        options: &CaptureOptions,
    ) -> Result<Option<Base64Image>, CaptureError> {
        let Some(path) = &self.path else {
            debug!("No image path, treating as cancelled");
            return Ok(None);
        };
        trace!(?options, "Reading image file in place of a camera");

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            // The photo went away before we could read it. Same as cancelling.
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Image file not found");
                return Ok(None);
            }
            Err(err) => {
                return Err(CaptureError::new(format!(
                    "could not read {}: {err}",
                    path.display()
                )));
            }
        };
        let mime_type = infer::get(&bytes)
            .map(|kind| kind.mime_type())
            .ok_or_else(|| {
                CaptureError::new(format!("unknown file type for {}", path.display()))
            })?;
        if !SUPPORTED_IMAGE_TYPES.contains(&mime_type) {
            return Err(CaptureError::new(format!(
                "{} is {mime_type}, not a supported image type",
                path.display()
            )));
        }
        debug!(%mime_type, bytes = bytes.len(), "Captured image");
        Ok(Some(Base64Image::from_bytes(Some(mime_type), &bytes)))
    }
}
