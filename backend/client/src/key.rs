//! Application server key decoding.
//!
//! Keys arrive as URL-safe base64 (what VAPID tooling prints). Standard
//! alphabet and padding are tolerated. The result must be an uncompressed
//! P-256 point: 65 bytes with a leading 0x04.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::ClientError;

pub const P256_UNCOMPRESSED_LEN: usize = 65;

pub fn decode_application_server_key(key: &str) -> Result<Vec<u8>, ClientError> {
    let normalized: String = key
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    if normalized.is_empty() {
        return Err(ClientError::InvalidKey("key is empty".into()));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(normalized.as_bytes())
        .map_err(|e| ClientError::InvalidKey(e.to_string()))?;

    if bytes.len() != P256_UNCOMPRESSED_LEN || bytes[0] != 0x04 {
        return Err(ClientError::InvalidKey(format!(
            "expected a {P256_UNCOMPRESSED_LEN}-byte uncompressed P-256 point, got {} bytes",
            bytes.len()
        )));
    }
    Ok(bytes)
}
