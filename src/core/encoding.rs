//! Base64 helpers for wire fields.
//!
//! All binary fields on the wire use standard, padded base64. Decoding
//! errors name the offending field.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::error::{Result, ValidationError};

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a standard base64 field.
pub fn decode(field: &'static str, value: &str) -> Result<Vec<u8>> {
    STANDARD.decode(value.trim()).map_err(|e| {
        ValidationError::InvalidEncoding {
            field,
            reason: e.to_string(),
        }
        .into()
    })
}

/// Decode a standard base64 field into a fixed-size array.
pub fn decode_array<const N: usize>(field: &'static str, value: &str) -> Result<[u8; N]> {
    let bytes = decode(field, value)?;
    bytes.as_slice().try_into().map_err(|_| {
        ValidationError::InvalidKeyLength {
            what: field,
            expected: N,
            actual: bytes.len(),
        }
        .into()
    })
}

/// URL-safe, unpadded base64 (used in token strings).
pub fn encode_url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn decode_url(field: &'static str, value: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(value.trim()).map_err(|e| {
        ValidationError::InvalidEncoding {
            field,
            reason: e.to_string(),
        }
        .into()
    })
}
