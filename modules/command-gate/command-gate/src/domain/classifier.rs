//! Token shape classification.
//!
//! Purely syntactic: the result picks a verification path and is never a
//! trust decision on its own.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use super::AuthorizationError;

/// base64url that accepts segments with or without trailing `=`.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Structural kind of a bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenShape {
    /// Three segments, the first two base64url-encoded JSON.
    Signed,
    /// Anything else, typically an OAuth access token.
    Opaque,
}

/// Classify a raw credential. Every malformed input is `Opaque`.
#[must_use]
pub fn classify(raw: &str) -> TokenShape {
    match inspect(raw) {
        Ok(()) => TokenShape::Signed,
        Err(_) => TokenShape::Opaque,
    }
}

/// Check whether `raw` has the signed-token shape, explaining why not.
///
/// # Errors
///
/// Returns `MalformedCredential` naming the first structural problem found.
pub fn inspect(raw: &str) -> Result<(), AuthorizationError> {
    let segments: Vec<&str> = raw.split('.').collect();
    let [header, payload, _signature] = segments.as_slice() else {
        return Err(AuthorizationError::malformed_credential(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };

    decode_json_segment(header, "header")?;
    decode_json_segment(payload, "payload")?;
    Ok(())
}

fn decode_json_segment(segment: &str, what: &str) -> Result<(), AuthorizationError> {
    let bytes = URL_SAFE_LENIENT.decode(segment).map_err(|e| {
        AuthorizationError::malformed_credential(format!("{what} is not base64url: {e}"))
    })?;
    let value: serde_json::Value = serde_json::from_slice(&bytes).map_err(|e| {
        AuthorizationError::malformed_credential(format!("{what} is not JSON: {e}"))
    })?;
    if value.is_null() {
        return Err(AuthorizationError::malformed_credential(format!(
            "{what} decodes to null"
        )));
    }
    Ok(())
}
