//! Storage key layout for originals and variants
//!
//! Layout: `{scope}/{content}/original/{name}` for the original and
//! `{scope}/{content}/w{width}/{name}` for each variant. Files are served by
//! convention from these keys, so the layout must not change.
//!
//! Writing, deleting and upload cleanup all build keys through [`resolve`].

use serde::{Deserialize, Serialize};
use std::fmt;

pub const ORIGINAL_SEGMENT: &str = "original";

/// Where a family of images lives: owning scope, content tag and disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageLocation {
    pub scope: String,
    pub content: String,
    pub disk: String,
}

impl ImageLocation {
    pub fn new(
        scope: impl Into<String>,
        content: impl Into<String>,
        disk: impl Into<String>,
    ) -> Self {
        Self {
            scope: scope.into(),
            content: content.into(),
            disk: disk.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Original,
    Width(u32),
}

impl Variant {
    pub fn segment(&self) -> String {
        match self {
            Variant::Original => ORIGINAL_SEGMENT.to_string(),
            Variant::Width(width) => format!("w{}", width),
        }
    }
}

/// A resolved blob location: the disk it lives on and its key there.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobPath {
    pub disk: String,
    pub key: String,
}

impl BlobPath {
    /// Key of the folder holding the blob.
    pub fn directory(&self) -> &str {
        self.key
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or_default()
    }
}

impl fmt::Display for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Compute the blob path of `variant` of the image `name`.
///
/// `name` is opaque here; it comes from [`crate::naming`].
pub fn resolve(location: &ImageLocation, variant: Variant, name: &str) -> BlobPath {
    BlobPath {
        disk: location.disk.clone(),
        key: format!(
            "{}/{}/{}/{}",
            location.scope,
            location.content,
            variant.segment(),
            name
        ),
    }
}

/// Paths of the original followed by every width, in the order given.
pub fn resolve_all(location: &ImageLocation, widths: &[u32], name: &str) -> Vec<BlobPath> {
    std::iter::once(Variant::Original)
        .chain(widths.iter().copied().map(Variant::Width))
        .map(|variant| resolve(location, variant, name))
        .collect()
}
