//! Upload orchestration: validate, store the original, generate variants.
//!
//! An upload either leaves the original and every planned variant in
//! storage or, after a failure, removes whatever it had written.

use crate::config::ImageConfig;
use crate::deleter::Deleter;
use crate::generator::{VariantGenerator, VariantTarget};
use crate::image::ImageService;
use crate::models::{SizeMap, StoredImage, UploadRequest, VariantSpec};
use crate::naming::generate_name;
use crate::paths::{resolve, Variant};
use crate::storage::{Disks, StorageService};
use crate::{Error, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct Uploader {
    disks: Arc<Disks>,
    images: Arc<dyn ImageService>,
    config: Arc<ImageConfig>,
    generator: VariantGenerator,
    deleter: Deleter,
}

impl Uploader {
    pub fn new(disks: Arc<Disks>, images: Arc<dyn ImageService>, config: Arc<ImageConfig>) -> Self {
        Self {
            generator: VariantGenerator::new(config.concurrency),
            deleter: Deleter::new(Arc::clone(&disks), Arc::clone(&config)),
            disks,
            images,
            config,
        }
    }

    pub async fn upload(&self, request: UploadRequest) -> Result<StoredImage> {
        self.upload_with_cancel(request, &CancellationToken::new())
            .await
    }

    pub async fn upload_with_cancel(
        &self,
        request: UploadRequest,
        cancel: &CancellationToken,
    ) -> Result<StoredImage> {
        let location = &request.location;
        let storage = self.disks.get(&location.disk)?;
        let plan = self.plan_variants(&request)?;

        let kind = self.images.sniff_format(&request.data)?;
        let (width, height) = self.images.dimensions(&request.data)?;
        if width < self.config.min_width {
            return Err(Error::TooNarrow {
                actual: width,
                min: self.config.min_width,
            });
        }

        let name = generate_name(&location.content, kind.extension());
        let original = resolve(location, Variant::Original, &name);

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let write = async {
            storage.ensure_directory(original.directory()).await?;
            storage.write(&original.key, &request.data, kind.mime).await
        };
        let url = match write.await {
            Ok(url) => url,
            Err(e) => {
                self.deleter
                    .cleanup(storage.as_ref(), &name, location, &[])
                    .await;
                return Err(Error::OriginalWriteFailed {
                    path: original.key,
                    source: e,
                });
            }
        };

        let sizes = match &plan {
            Some(spec) => {
                let target = VariantTarget {
                    location,
                    name: &name,
                    content_type: kind.mime,
                };
                match self
                    .generate(&request.data, spec, &target, storage.as_ref(), cancel)
                    .await
                {
                    Ok(sizes) => sizes,
                    Err(e) => {
                        warn!("Upload of {} failed, removing partial files: {}", name, e);
                        self.deleter
                            .cleanup(storage.as_ref(), &name, location, spec.widths())
                            .await;
                        return Err(e);
                    }
                }
            }
            None => SizeMap::new(),
        };

        info!(
            "Stored {} ({}x{}) at {} with {} variant(s)",
            name,
            width,
            height,
            original,
            sizes.len()
        );

        Ok(StoredImage {
            name,
            url,
            path: original.key,
            sizes,
        })
    }

    /// Widths to generate for `request`, or `None` when thumbnails are off.
    fn plan_variants(&self, request: &UploadRequest) -> Result<Option<VariantSpec>> {
        if !request.thumbnails {
            return Ok(None);
        }
        let spec = request
            .widths
            .clone()
            .unwrap_or_else(|| self.config.widths.clone());
        if spec.is_empty() {
            return Err(Error::InvalidConfig(
                "Thumbnails requested but no variant widths are configured".to_string(),
            ));
        }
        self.config.check_widths(&spec)?;
        Ok(Some(spec))
    }

    async fn generate(
        &self,
        data: &[u8],
        spec: &VariantSpec,
        target: &VariantTarget<'_>,
        storage: &dyn StorageService,
        cancel: &CancellationToken,
    ) -> Result<SizeMap> {
        let source = self.images.decode(data).await?;
        self.generator
            .generate(source.as_ref(), spec, target, storage, cancel)
            .await
    }
}
