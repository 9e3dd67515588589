/// Identify a supported web image format from its leading bytes.
pub fn detect_image_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("image/png"),
        [0x47, 0x49, 0x46, 0x38, 0x37 | 0x39, 0x61, ..] => Some("image/gif"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => {
            tracing::debug!(
                "Unrecognized image format (first 4 bytes: {:02X?})",
                &bytes[..bytes.len().min(4)]
            );
            None
        }
    }
}

/// File extension for a mime type: its subtype (`image/jpeg` -> `jpeg`).
pub fn extension_for_mime(mime: &str) -> &str {
    mime.split_once('/').map(|(_, subtype)| subtype).unwrap_or(mime)
}
