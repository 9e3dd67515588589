//! Image inspection and resizing
//!
//! [`ImageService`] validates and decodes uploaded bytes; the decoded
//! [`SourceImage`] produces one re-encoded variant per target width. Every
//! variant is resized from the decoded source, never from another variant.

pub mod mime;
pub mod mock;
pub mod processor;

pub use mock::MockImageProcessor;
pub use processor::ImageProcessor;

use crate::Result;
use async_trait::async_trait;

/// Sniffed format of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageKind {
    pub mime: &'static str,
}

impl ImageKind {
    pub fn extension(&self) -> &'static str {
        mime::extension_for_mime(self.mime)
    }
}

/// One encoded variant.
#[derive(Debug, Clone)]
pub struct ResizedImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait ImageService: Send + Sync {
    /// Identify the image format, failing with `NotAnImage` otherwise.
    fn sniff_format(&self, data: &[u8]) -> Result<ImageKind>;

    /// Width and height without decoding the pixel data.
    fn dimensions(&self, data: &[u8]) -> Result<(u32, u32)>;

    async fn decode(&self, data: &[u8]) -> Result<Box<dyn SourceImage>>;
}

#[async_trait]
pub trait SourceImage: Send + Sync {
    /// Resize to `width`, keeping the aspect ratio, and encode in the source format.
    async fn resize_to_width(&self, width: u32) -> Result<ResizedImage>;
}

/// Height that keeps the aspect ratio at `target_width`.
///
/// Rounds half away from zero and never returns less than 1.
pub fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    if width == 0 {
        return 0;
    }
    let scaled = (f64::from(height) * f64::from(target_width) / f64::from(width)).round();
    (scaled as u32).max(1)
}
