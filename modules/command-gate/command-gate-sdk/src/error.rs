//! Error types for the command gate module.

use thiserror::Error;

/// Errors that can occur when using the command gate API.
///
/// Verification failures are never reported here: they surface as a denied
/// [`crate::AuthorizationDecision`]. This type only covers wiring faults.
#[derive(Debug, Error)]
pub enum CommandGateError {
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}
