//! Application wiring: configuration, disks, image backend, uploader and deleter.

use crate::config::{Config, ImageConfig};
use crate::deleter::Deleter;
use crate::image::{ImageProcessor, ImageService};
use crate::models::{ImageRecord, SizeMap, StoredImage, UploadRequest};
use crate::paths::ImageLocation;
use crate::storage::{Disks, LocalStorage, S3Storage};
use crate::uploader::Uploader;
use crate::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Upload and delete entry point shared by the CLI and embedding code.
pub struct App {
    uploader: Uploader,
    deleter: Deleter,
    default_disk: String,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub disks: Disks,
    pub images: Arc<dyn ImageService>,
}

impl App {
    /// Build an app from concrete service dependencies.
    pub fn with_services(
        services: AppServices,
        config: ImageConfig,
        default_disk: String,
    ) -> Result<Self> {
        config.validate()?;

        let disks = Arc::new(services.disks);
        let config = Arc::new(config);

        Ok(Self {
            uploader: Uploader::new(
                Arc::clone(&disks),
                services.images,
                Arc::clone(&config),
            ),
            deleter: Deleter::new(disks, config),
            default_disk,
        })
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub async fn new() -> Result<Self> {
        let config = Config::from_env()?;

        let mut disks = Disks::new();

        let local = LocalStorage::new(&config.local_root, config.local_base_url.clone()).await?;
        info!("Disk 'local' -> {}", config.local_root.display());
        disks.insert("local", Arc::new(local));

        if let Some(settings) = config.s3.clone() {
            info!(
                "Disk '{}' -> bucket {} at {}",
                config.s3_disk_name, settings.bucket, settings.endpoint
            );
            disks.insert(config.s3_disk_name.clone(), Arc::new(S3Storage::new(settings).await?));
        }

        // Unknown default disks fail here instead of on first use.
        disks.get(&config.default_disk)?;
        info!("Registered disks: {:?}, default '{}'", disks.names(), config.default_disk);

        let images = Arc::new(ImageProcessor::new(config.image.jpeg_quality));

        Self::with_services(
            AppServices { disks, images },
            config.image,
            config.default_disk,
        )
    }

    pub fn default_disk(&self) -> &str {
        &self.default_disk
    }

    pub async fn upload(&self, request: UploadRequest) -> Result<StoredImage> {
        self.uploader.upload(request).await
    }

    pub async fn upload_with_cancel(
        &self,
        request: UploadRequest,
        cancel: &CancellationToken,
    ) -> Result<StoredImage> {
        self.uploader.upload_with_cancel(request, cancel).await
    }

    pub async fn delete(
        &self,
        name: &str,
        location: &ImageLocation,
        sizes: Option<&SizeMap>,
    ) -> Result<()> {
        self.deleter.delete(name, location, sizes).await
    }

    pub async fn delete_many<S: AsRef<str>>(
        &self,
        names: &[S],
        location: &ImageLocation,
        sizes: Option<&SizeMap>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.deleter
            .delete_many(names, location, sizes, cancel)
            .await
    }

    /// Delete an image using the record persisted after its upload.
    pub async fn delete_record(&self, record: &ImageRecord, location: &ImageLocation) -> Result<()> {
        self.deleter
            .delete(&record.name, location, Some(&record.sizes))
            .await
    }
}
