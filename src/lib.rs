//! Derived-image lifecycle: validate an upload, store the original under a
//! content-scoped path, generate resized variants, and later delete the
//! original together with every variant.
//!
//! Writing and deleting share one key layout ([`paths::resolve`]), so
//! anything an upload writes can be found and removed again.

pub mod app;
pub mod config;
pub mod deleter;
pub mod error;
pub mod generator;
pub mod image;
pub mod models;
pub mod naming;
pub mod paths;
pub mod storage;
pub mod uploader;

pub use error::{Error, Result};
