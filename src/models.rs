//! Data models and structures
//!
//! Defines the upload request, the variant width set, the realized size map
//! and the stored-image result handed back to callers.

use crate::paths::ImageLocation;
use crate::{Error, Result};
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Target widths for variants, deduplicated and sorted descending.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariantSpec {
    widths: Vec<u32>,
}

impl VariantSpec {
    pub fn new(widths: impl IntoIterator<Item = u32>) -> Result<Self> {
        let mut widths: Vec<u32> = widths.into_iter().collect();
        if widths.contains(&0) {
            return Err(Error::InvalidConfig(
                "Variant widths must be greater than zero".to_string(),
            ));
        }
        widths.sort_unstable_by(|a, b| b.cmp(a));
        widths.dedup();
        Ok(Self { widths })
    }

    /// Parse a comma separated list such as `"800, 400,200"`.
    pub fn parse(input: &str) -> Result<Self> {
        let widths = input
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u32>().map_err(|_| {
                    Error::InvalidConfig(format!("Invalid variant width '{}'", part))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(widths)
    }

    pub fn widths(&self) -> &[u32] {
        &self.widths
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.widths.len()
    }
}

/// Realized variant sizes: width -> height, iterated widest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SizeMap {
    sizes: BTreeMap<Reverse<u32>, u32>,
}

impl SizeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, width: u32, height: u32) {
        self.sizes.insert(Reverse(width), height);
    }

    pub fn get(&self, width: u32) -> Option<u32> {
        self.sizes.get(&Reverse(width)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.sizes.iter().map(|(Reverse(w), h)| (*w, *h))
    }

    pub fn widths(&self) -> Vec<u32> {
        self.sizes.keys().map(|Reverse(w)| *w).collect()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

impl FromIterator<(u32, u32)> for SizeMap {
    fn from_iter<I: IntoIterator<Item = (u32, u32)>>(iter: I) -> Self {
        let mut sizes = SizeMap::new();
        for (width, height) in iter {
            sizes.insert(width, height);
        }
        sizes
    }
}

impl Serialize for SizeMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (width, height) in self.iter() {
            map.serialize_entry(&width, &height)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SizeMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = BTreeMap::<u32, u32>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}

/// Input of a single upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub data: Vec<u8>,
    pub location: ImageLocation,
    pub thumbnails: bool,
    pub widths: Option<VariantSpec>,
}

impl UploadRequest {
    pub fn new(data: Vec<u8>, location: ImageLocation) -> Self {
        Self {
            data,
            location,
            thumbnails: false,
            widths: None,
        }
    }

    pub fn with_thumbnails(mut self, thumbnails: bool) -> Self {
        self.thumbnails = thumbnails;
        self
    }

    /// Use `widths` instead of the configured defaults for this call only.
    ///
    /// Widths wider than the source are upscaled, so every width costs a
    /// full `width x height` pixel buffer. Set `ImageConfig::max_width` when
    /// widths come from untrusted callers.
    pub fn with_widths(mut self, widths: VariantSpec) -> Self {
        self.widths = Some(widths);
        self
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredImage {
    pub name: String,
    pub url: String,
    pub path: String,
    pub sizes: SizeMap,
}

impl StoredImage {
    /// The part callers persist to be able to delete the image later.
    pub fn record(&self) -> ImageRecord {
        ImageRecord {
            name: self.name.clone(),
            sizes: self.sizes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub name: String,
    pub sizes: SizeMap,
}
