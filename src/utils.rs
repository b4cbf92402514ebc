//! Utility functions for gateway operations

use sha2::{Digest, Sha256};

/// Hex digits of the key digest used to pick a cache shard
///
/// One digit gives sixteen shards. Coarse on purpose: many keys share one
/// cache entry, which keeps the number of cache entries small.
pub const SHARD_KEY_LEN: usize = 1;

/// Derive the cache shard for a physical key
///
/// Example: "a/b.png" → "f" (first hex digit of its SHA-256)
pub fn shard_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    let mut hex = hex::encode(&digest[..SHARD_KEY_LEN.div_ceil(2)]);
    hex.truncate(SHARD_KEY_LEN);
    hex
}

/// Index of a shard key in `0..16`, used to select its lock
pub fn shard_index(shard: &str) -> usize {
    shard
        .chars()
        .next()
        .and_then(|c| c.to_digit(16))
        .unwrap_or(0) as usize
}

/// Guess a content type from the file extension of a path
///
/// Falls back to `application/octet-stream` for unknown or missing extensions.
pub fn guess_mimetype(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    let ext = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return mime::APPLICATION_OCTET_STREAM.to_string(),
    };

    let guessed = match ext.as_str() {
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "bmp" => mime::IMAGE_BMP,
        "svg" => mime::IMAGE_SVG,
        "txt" => mime::TEXT_PLAIN,
        "csv" => mime::TEXT_CSV,
        "html" | "htm" => mime::TEXT_HTML,
        "css" => mime::TEXT_CSS,
        "js" => mime::APPLICATION_JAVASCRIPT,
        "xml" => mime::TEXT_XML,
        "json" => mime::APPLICATION_JSON,
        "pdf" => mime::APPLICATION_PDF,
        "woff" => mime::FONT_WOFF,
        "woff2" => mime::FONT_WOFF2,
        // no constants in `mime` for these
        "webp" => return "image/webp".to_string(),
        "avif" => return "image/avif".to_string(),
        "ico" => return "image/x-icon".to_string(),
        "mp4" => return "video/mp4".to_string(),
        "webm" => return "video/webm".to_string(),
        "zip" => return "application/zip".to_string(),
        _ => mime::APPLICATION_OCTET_STREAM,
    };
    guessed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_key_is_single_hex_digit() {
        for key in ["a/b.png", "media/cat.jpg", "", "garbage/20240101/x"] {
            let shard = shard_key(key);
            assert_eq!(shard.len(), 1);
            assert!(shard.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_shard_key_deterministic() {
        assert_eq!(shard_key("a/b.png"), shard_key("a/b.png"));
        // sha256("") = e3b0c442...
        assert_eq!(shard_key(""), "e");
    }

    #[test]
    fn test_shard_index() {
        assert_eq!(shard_index("0"), 0);
        assert_eq!(shard_index("a"), 10);
        assert_eq!(shard_index("f"), 15);
        assert_eq!(shard_index(""), 0);
    }

    #[test]
    fn test_guess_mimetype() {
        assert_eq!(guess_mimetype("a/b.png"), "image/png");
        assert_eq!(guess_mimetype("photo.JPEG"), "image/jpeg");
        assert_eq!(guess_mimetype("style.css"), "text/css");
        assert_eq!(guess_mimetype("thumb.webp"), "image/webp");
        assert_eq!(guess_mimetype("README"), "application/octet-stream");
        assert_eq!(guess_mimetype("dir.v2/.hidden"), "application/octet-stream");
    }
}
