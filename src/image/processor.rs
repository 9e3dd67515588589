use super::mime::detect_image_mime;
use super::{scaled_height, ImageKind, ImageService, ResizedImage, SourceImage};
use crate::{Error, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::Arc;

/// [`ImageService`] backed by the `image` crate.
pub struct ImageProcessor {
    jpeg_quality: u8,
}

impl ImageProcessor {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality }
    }

    fn format_for(kind: ImageKind) -> Result<ImageFormat> {
        ImageFormat::from_mime_type(kind.mime).ok_or(Error::NotAnImage)
    }
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new(90)
    }
}

#[async_trait]
impl ImageService for ImageProcessor {
    fn sniff_format(&self, data: &[u8]) -> Result<ImageKind> {
        detect_image_mime(data)
            .map(|mime| ImageKind { mime })
            .ok_or(Error::NotAnImage)
    }

    fn dimensions(&self, data: &[u8]) -> Result<(u32, u32)> {
        let format = Self::format_for(self.sniff_format(data)?)?;
        let mut reader = ImageReader::new(Cursor::new(data));
        reader.set_format(format);
        // A header that cannot be parsed is treated like any other non-image.
        reader.into_dimensions().map_err(|e| {
            tracing::debug!("Failed to read image header: {}", e);
            Error::NotAnImage
        })
    }

    async fn decode(&self, data: &[u8]) -> Result<Box<dyn SourceImage>> {
        let format = Self::format_for(self.sniff_format(data)?)?;
        let owned = data.to_vec();

        let image = tokio::task::spawn_blocking(move || {
            image::load_from_memory_with_format(&owned, format)
        })
        .await
        .map_err(|e| Error::Invariant(format!("Image decode task join error: {}", e)))??;

        Ok(Box::new(DecodedImage {
            image: Arc::new(image),
            format,
            jpeg_quality: self.jpeg_quality,
        }))
    }
}

/// A decoded upload; shared read-only by every variant resize.
struct DecodedImage {
    image: Arc<DynamicImage>,
    format: ImageFormat,
    jpeg_quality: u8,
}

impl DecodedImage {
    fn resize_sync(
        image: &DynamicImage,
        format: ImageFormat,
        jpeg_quality: u8,
        width: u32,
    ) -> Result<ResizedImage> {
        let height = scaled_height(image.width(), image.height(), width);
        let resized = image.resize_exact(width, height, FilterType::Lanczos3);

        let mut data = Vec::new();
        match format {
            ImageFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut data, jpeg_quality);
                DynamicImage::ImageRgb8(resized.to_rgb8()).write_with_encoder(encoder)?;
            }
            _ => resized.write_to(&mut Cursor::new(&mut data), format)?,
        }

        Ok(ResizedImage {
            width: resized.width(),
            height: resized.height(),
            data,
        })
    }
}

#[async_trait]
impl SourceImage for DecodedImage {
    async fn resize_to_width(&self, width: u32) -> Result<ResizedImage> {
        tokio::task::spawn_blocking({
            let image = Arc::clone(&self.image);
            let format = self.format;
            let jpeg_quality = self.jpeg_quality;
            move || Self::resize_sync(&image, format, jpeg_quality, width)
        })
        .await
        .map_err(|e| Error::Invariant(format!("Image resize task join error: {}", e)))?
    }
}
