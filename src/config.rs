//! Configuration
//!
//! [`ImageConfig`] is immutable once built and shared by every upload and
//! delete. Per-call width overrides travel on the request instead.

use crate::models::VariantSpec;
use crate::storage::s3::S3Settings;
use crate::{Error, Result};
use std::path::PathBuf;

pub const DEFAULT_WIDTHS: [u32; 3] = [800, 400, 200];
pub const DEFAULT_MIN_WIDTH: u32 = 500;
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Widths generated when a request does not carry its own.
    pub widths: VariantSpec,
    pub min_width: u32,
    pub jpeg_quality: u8,
    /// Variant writes or deletes in flight at once for one image.
    pub concurrency: usize,
    /// Widest variant an upload may ask for. Unbounded when `None`.
    pub max_width: Option<u32>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            widths: VariantSpec::new(DEFAULT_WIDTHS).unwrap_or_default(),
            min_width: DEFAULT_MIN_WIDTH,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            concurrency: 1,
            max_width: None,
        }
    }
}

impl ImageConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::InvalidConfig(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig(
                "Concurrency must be at least 1".to_string(),
            ));
        }
        if let Some(max) = self.max_width {
            if max == 0 {
                return Err(Error::InvalidConfig(
                    "Maximum width must be at least 1".to_string(),
                ));
            }
            self.check_widths(&self.widths)?;
        }
        Ok(())
    }

    /// Reject `spec` when it asks for a width above `max_width`.
    pub fn check_widths(&self, spec: &VariantSpec) -> Result<()> {
        match (self.max_width, spec.widths().first()) {
            (Some(max), Some(&widest)) if widest > max => Err(Error::InvalidConfig(format!(
                "Variant width {} exceeds the maximum of {}",
                widest, max
            ))),
            _ => Ok(()),
        }
    }

    fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            widths: match std::env::var("IMAGE_WIDTHS") {
                Ok(raw) => VariantSpec::parse(&raw)?,
                Err(_) => defaults.widths,
            },
            min_width: parse_env("IMAGE_MIN_WIDTH")?.unwrap_or(defaults.min_width),
            jpeg_quality: parse_env("IMAGE_JPEG_QUALITY")?.unwrap_or(defaults.jpeg_quality),
            concurrency: parse_env("IMAGE_CONCURRENCY")?.unwrap_or(defaults.concurrency),
            max_width: parse_env("IMAGE_MAX_WIDTH")?.or(defaults.max_width),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Process configuration: image settings plus the disks to register.
#[derive(Debug, Clone)]
pub struct Config {
    pub image: ImageConfig,
    pub default_disk: String,
    pub local_root: PathBuf,
    pub local_base_url: String,
    pub s3_disk_name: String,
    pub s3: Option<S3Settings>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let s3 = match std::env::var("S3_BUCKET") {
            Ok(bucket) => Some(S3Settings {
                access_key_id: std::env::var("S3_ACCESS_KEY_ID").map_err(|_| {
                    Error::InvalidConfig("S3_ACCESS_KEY_ID not set".to_string())
                })?,
                secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY").map_err(|_| {
                    Error::InvalidConfig("S3_SECRET_ACCESS_KEY not set".to_string())
                })?,
                endpoint: std::env::var("S3_ENDPOINT")
                    .unwrap_or_else(|_| "https://nyc3.digitaloceanspaces.com".to_string()),
                region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                base_url: std::env::var("S3_BASE_URL")
                    .unwrap_or_else(|_| format!("https://{}.nyc3.cdn.digitaloceanspaces.com", bucket)),
                bucket,
            }),
            Err(_) => None,
        };

        Ok(Self {
            image: ImageConfig::from_env()?,
            default_disk: std::env::var("DEFAULT_DISK").unwrap_or_else(|_| "local".to_string()),
            local_root: std::env::var("LOCAL_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("storage")),
            local_base_url: std::env::var("LOCAL_BASE_URL")
                .unwrap_or_else(|_| "/storage".to_string()),
            s3_disk_name: std::env::var("S3_DISK_NAME").unwrap_or_else(|_| "s3".to_string()),
            s3,
        })
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidConfig(format!("{} has an invalid value '{}'", key, raw))),
        Err(_) => Ok(None),
    }
}
