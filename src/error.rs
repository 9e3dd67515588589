//! Error handling and custom error types
//!
//! Provides unified error handling across the crate using thiserror. Storage
//! backends report [`StorageError`]; the core wraps those with the path (and
//! width) that was being written or deleted.

use crate::storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("File should be an image (JPEG, PNG, GIF or WebP)")]
    NotAnImage,

    #[error("Image should be at least {min}px wide, got {actual}px")]
    TooNarrow { actual: u32, min: u32 },

    #[error("Failed to write original to {path}: {source}")]
    OriginalWriteFailed {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to write {width}px variant to {path}: {source}")]
    VariantWriteFailed {
        width: u32,
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("{} delete(s) failed: {}", .failures.len(), summarize(.failures))]
    DeleteFailed { failures: Vec<DeleteFailure> },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unknown storage disk: {0}")]
    UnknownDisk(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

/// A single path the deleter could not remove.
#[derive(Debug)]
pub struct DeleteFailure {
    pub path: String,
    pub error: Error,
}

fn summarize(failures: &[DeleteFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.path, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, Error>;
