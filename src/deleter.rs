//! Deletion of an image and all of its variants.
//!
//! Deletion is best-effort and idempotent: every path is attempted, missing
//! blobs count as deleted, and failures are collected rather than aborting
//! the remaining deletes.

use crate::config::ImageConfig;
use crate::error::DeleteFailure;
use crate::models::SizeMap;
use crate::paths::{resolve_all, BlobPath, ImageLocation};
use crate::storage::{Disks, StorageService};
use crate::{Error, Result};
use futures::{stream, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct Deleter {
    disks: Arc<Disks>,
    config: Arc<ImageConfig>,
}

impl Deleter {
    pub fn new(disks: Arc<Disks>, config: Arc<ImageConfig>) -> Self {
        Self { disks, config }
    }

    /// Delete the original and the variants listed in `sizes`.
    ///
    /// Without `sizes` the configured default widths are used. That only
    /// matches what was written if the configuration has not changed since
    /// the upload; pass the recorded size map whenever it is available.
    pub async fn delete(
        &self,
        name: &str,
        location: &ImageLocation,
        sizes: Option<&SizeMap>,
    ) -> Result<()> {
        self.delete_with_cancel(name, location, sizes, &CancellationToken::new())
            .await
    }

    pub async fn delete_with_cancel(
        &self,
        name: &str,
        location: &ImageLocation,
        sizes: Option<&SizeMap>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.delete_many(&[name], location, sizes, cancel).await
    }

    /// Delete several images that share a location and size map.
    pub async fn delete_many<S: AsRef<str>>(
        &self,
        names: &[S],
        location: &ImageLocation,
        sizes: Option<&SizeMap>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let storage = self.disks.get(&location.disk)?;
        let widths = self.widths_for(sizes);

        let mut failures = Vec::new();
        for name in names {
            let paths = resolve_all(location, &widths, name.as_ref());
            failures.extend(
                remove_paths(storage.as_ref(), paths, self.config.concurrency, cancel).await,
            );
        }

        if failures.is_empty() {
            info!(
                "Deleted {} image(s) from {}/{} on disk {}",
                names.len(),
                location.scope,
                location.content,
                location.disk
            );
            Ok(())
        } else {
            warn!(
                "{} delete(s) failed under {}/{} on disk {}",
                failures.len(),
                location.scope,
                location.content,
                location.disk
            );
            Err(Error::DeleteFailed { failures })
        }
    }

    /// Remove everything an upload of `name` could have written for `widths`.
    ///
    /// Used to roll back a failed upload; failures are logged, not returned,
    /// and cancellation does not apply.
    pub(crate) async fn cleanup(
        &self,
        storage: &dyn StorageService,
        name: &str,
        location: &ImageLocation,
        widths: &[u32],
    ) {
        let paths = resolve_all(location, widths, name);
        let failures = remove_paths(
            storage,
            paths,
            self.config.concurrency,
            &CancellationToken::new(),
        )
        .await;

        for failure in &failures {
            warn!("Cleanup could not remove {}: {}", failure.path, failure.error);
        }
    }

    fn widths_for(&self, sizes: Option<&SizeMap>) -> Vec<u32> {
        match sizes {
            Some(sizes) => sizes.widths(),
            None => {
                warn!("No size map supplied for delete, falling back to configured widths");
                self.config.widths.widths().to_vec()
            }
        }
    }
}

async fn remove_paths(
    storage: &dyn StorageService,
    paths: Vec<BlobPath>,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Vec<DeleteFailure> {
    stream::iter(paths)
        .map(|path| async move {
            if cancel.is_cancelled() {
                return Some(DeleteFailure {
                    path: path.key,
                    error: Error::Cancelled,
                });
            }
            match storage.delete(&path.key).await {
                Ok(()) => {
                    debug!("Deleted {} from {}", path, path.disk);
                    None
                }
                Err(e) => Some(DeleteFailure {
                    path: path.key,
                    error: Error::Storage(e),
                }),
            }
        })
        .buffered(concurrency.max(1))
        .filter_map(|failure| async move { failure })
        .collect()
        .await
}
