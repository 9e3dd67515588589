//! Unique file names for uploaded images.
//!
//! Names look like `{content}_{unix_seconds}_{suffix}.{extension}`. The
//! suffix is 12 characters of `[a-z0-9]` (36^12 combinations), so many
//! uploads within the same second still get distinct names.

use chrono::Utc;
use rand::Rng;

pub const SUFFIX_LEN: usize = 12;
const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

pub fn generate_name(content_tag: &str, extension: &str) -> String {
    generate_name_at(content_tag, extension, Utc::now().timestamp())
}

pub fn generate_name_at(content_tag: &str, extension: &str, timestamp: i64) -> String {
    format!(
        "{}_{}_{}.{}",
        content_tag,
        timestamp,
        random_suffix(),
        extension
    )
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}
