//! Variant generation
//!
//! Resizes a decoded source to every requested width, stores each variant
//! at its resolved path and records the realized heights.

use crate::image::SourceImage;
use crate::models::{SizeMap, VariantSpec};
use crate::paths::{resolve, ImageLocation, Variant};
use crate::storage::StorageService;
use crate::{Error, Result};
use futures::{stream, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The image the variants belong to.
pub struct VariantTarget<'a> {
    pub location: &'a ImageLocation,
    pub name: &'a str,
    pub content_type: &'a str,
}

pub struct VariantGenerator {
    concurrency: usize,
}

impl VariantGenerator {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// Write one variant per width, widest first.
    ///
    /// The first failure aborts the remaining widths; variants written
    /// before it are left for the caller to clean up.
    pub async fn generate(
        &self,
        source: &dyn SourceImage,
        spec: &VariantSpec,
        target: &VariantTarget<'_>,
        storage: &dyn StorageService,
        cancel: &CancellationToken,
    ) -> Result<SizeMap> {
        let sizes: Vec<(u32, u32)> = stream::iter(spec.widths().iter().copied())
            .map(|width| self.generate_one(source, width, target, storage, cancel))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        Ok(sizes.into_iter().collect())
    }

    async fn generate_one(
        &self,
        source: &dyn SourceImage,
        width: u32,
        target: &VariantTarget<'_>,
        storage: &dyn StorageService,
        cancel: &CancellationToken,
    ) -> Result<(u32, u32)> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let variant = source.resize_to_width(width).await?;
        let path = resolve(target.location, Variant::Width(width), target.name);

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let write = async {
            storage.ensure_directory(path.directory()).await?;
            storage
                .write(&path.key, &variant.data, target.content_type)
                .await
        };
        write.await.map_err(|e| Error::VariantWriteFailed {
            width,
            path: path.key.clone(),
            source: e,
        })?;

        debug!(
            "Stored {}x{} variant at {} on {}",
            variant.width, variant.height, path, path.disk
        );
        Ok((width, variant.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ImageService, MockImageProcessor};
    use crate::storage::MockStorage;
    use pretty_assertions::assert_eq;

    const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn location() -> ImageLocation {
        ImageLocation::new("store7", "product", "disk1")
    }

    async fn run(
        images: &MockImageProcessor,
        storage: &MockStorage,
        widths: &[u32],
        concurrency: usize,
        cancel: &CancellationToken,
    ) -> Result<SizeMap> {
        let source = images.decode(PNG_HEADER).await.unwrap();
        let spec = VariantSpec::new(widths.iter().copied()).unwrap();
        let location = location();
        let target = VariantTarget {
            location: &location,
            name: "product_1_abc.png",
            content_type: "image/png",
        };
        VariantGenerator::new(concurrency)
            .generate(source.as_ref(), &spec, &target, storage, cancel)
            .await
    }

    #[tokio::test]
    async fn test_generate_widest_first() {
        let images = MockImageProcessor::new();
        let storage = MockStorage::new();

        let sizes = run(&images, &storage, &[200, 800, 400], 1, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(sizes.iter().collect::<Vec<_>>(), vec![(800, 600), (400, 300), (200, 150)]);
        assert_eq!(images.get_resized_widths(), vec![800, 400, 200]);
        assert_eq!(
            storage.get_writes(),
            vec![
                "store7/product/w800/product_1_abc.png",
                "store7/product/w400/product_1_abc.png",
                "store7/product/w200/product_1_abc.png",
            ]
        );
        assert!(storage.get_directories().contains("store7/product/w400"));
        assert_eq!(images.get_decode_count(), 1);
    }

    #[tokio::test]
    async fn test_generate_concurrently_keeps_order() {
        let images = MockImageProcessor::new();
        let storage = MockStorage::new();

        let sizes = run(&images, &storage, &[100, 300, 200, 400], 3, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(sizes.widths(), vec![400, 300, 200, 100]);
        assert_eq!(storage.get_write_count(), 4);
    }

    #[tokio::test]
    async fn test_write_failure_reports_width() {
        let images = MockImageProcessor::new();
        let storage = MockStorage::new().with_write_failure("/w400/");

        let err = run(&images, &storage, &[800, 400, 200], 1, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            Error::VariantWriteFailed { width, path, .. } => {
                assert_eq!(width, 400);
                assert_eq!(path, "store7/product/w400/product_1_abc.png");
            }
            other => panic!("unexpected error: {}", other),
        }
        // w200 is never attempted once w400 fails.
        assert_eq!(storage.get_write_count(), 2);
    }

    #[tokio::test]
    async fn test_resize_failure_aborts() {
        let images = MockImageProcessor::new().with_resize_failure(800);
        let storage = MockStorage::new();

        let result = run(&images, &storage, &[800, 400], 1, &CancellationToken::new()).await;

        assert!(matches!(result, Err(Error::Image(_))));
        assert_eq!(storage.get_write_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_writes_nothing() {
        let images = MockImageProcessor::new();
        let storage = MockStorage::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run(&images, &storage, &[800, 400], 1, &cancel).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(storage.get_write_count(), 0);
    }
}
