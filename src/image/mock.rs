use super::mime::detect_image_mime;
use super::{scaled_height, ImageKind, ImageService, ResizedImage, SourceImage};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Image backend that sniffs real magic bytes but reports fixed dimensions
/// and returns placeholder variant bytes.
#[derive(Clone)]
pub struct MockImageProcessor {
    dimensions: (u32, u32),
    decode_count: Arc<Mutex<usize>>,
    resized_widths: Arc<Mutex<Vec<u32>>>,
    failing_widths: Arc<Mutex<HashSet<u32>>>,
}

impl MockImageProcessor {
    pub fn new() -> Self {
        Self {
            dimensions: (1200, 900),
            decode_count: Arc::new(Mutex::new(0)),
            resized_widths: Arc::new(Mutex::new(Vec::new())),
            failing_widths: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = (width, height);
        self
    }

    /// Make resizing to `width` fail.
    pub fn with_resize_failure(self, width: u32) -> Self {
        self.failing_widths.lock().unwrap().insert(width);
        self
    }

    pub fn get_decode_count(&self) -> usize {
        *self.decode_count.lock().unwrap()
    }

    /// Widths passed to `resize_to_width`, in call order.
    pub fn get_resized_widths(&self) -> Vec<u32> {
        self.resized_widths.lock().unwrap().clone()
    }
}

impl Default for MockImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageService for MockImageProcessor {
    fn sniff_format(&self, data: &[u8]) -> Result<ImageKind> {
        detect_image_mime(data)
            .map(|mime| ImageKind { mime })
            .ok_or(Error::NotAnImage)
    }

    fn dimensions(&self, data: &[u8]) -> Result<(u32, u32)> {
        self.sniff_format(data)?;
        Ok(self.dimensions)
    }

    async fn decode(&self, data: &[u8]) -> Result<Box<dyn SourceImage>> {
        self.sniff_format(data)?;
        *self.decode_count.lock().unwrap() += 1;

        Ok(Box::new(MockSource {
            dimensions: self.dimensions,
            resized_widths: Arc::clone(&self.resized_widths),
            failing_widths: Arc::clone(&self.failing_widths),
        }))
    }
}

struct MockSource {
    dimensions: (u32, u32),
    resized_widths: Arc<Mutex<Vec<u32>>>,
    failing_widths: Arc<Mutex<HashSet<u32>>>,
}

#[async_trait]
impl SourceImage for MockSource {
    async fn resize_to_width(&self, width: u32) -> Result<ResizedImage> {
        self.resized_widths.lock().unwrap().push(width);

        if self.failing_widths.lock().unwrap().contains(&width) {
            return Err(Error::Image(image::ImageError::IoError(
                std::io::Error::other("Mock failure"),
            )));
        }

        let (source_width, source_height) = self.dimensions;
        let height = scaled_height(source_width, source_height, width);
        Ok(ResizedImage {
            width,
            height,
            data: format!("{}x{}", width, height).into_bytes(),
        })
    }
}
