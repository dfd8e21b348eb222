//! Shared-secret generation and comparison

use base64::Engine;
use rand::Rng;
use std::path::Path;

/// 32 random bytes, base64 URL-safe without padding (43 characters)
pub fn generate_api_key() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Write the key to `path`, replacing any previous key
pub fn write_api_key_file(path: &Path, key: &str) -> std::io::Result<()> {
    std::fs::write(path, key)
}

/// Compare keys without short-circuiting on the first differing byte
pub fn keys_match(provided: &str, expected: &str) -> bool {
    let (provided, expected) = (provided.as_bytes(), expected.as_bytes());
    if provided.len() != expected.len() {
        return false;
    }
    provided
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_url_safe_and_distinct() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn key_comparison() {
        assert!(keys_match("abc", "abc"));
        assert!(!keys_match("abd", "abc"));
        assert!(!keys_match("ab", "abc"));
        assert!(!keys_match("", "abc"));
    }
}
