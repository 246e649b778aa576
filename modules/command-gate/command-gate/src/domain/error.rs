//! Domain errors for the command gate.
//!
//! None of these leave the crate: the orchestrator folds every one of them
//! into a denied decision and only logs the detail.

use std::time::Duration;

use thiserror::Error;

/// Why a verification step refused to vouch for a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("key set unavailable: {0}")]
    KeySetUnavailable(String),

    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("claim missing: {0}")]
    ClaimMissing(String),

    #[error("principal not allowed: {0}")]
    PrincipalNotAllowed(String),

    #[error("introspection unreachable: {0}")]
    IntrospectionUnreachable(String),

    #[error("introspection denied: {0}")]
    IntrospectionDenied(String),

    #[error("hosting environment signal absent")]
    EnvironmentSignalAbsent,

    #[error("no trusted trigger signal present")]
    UntrustedTrigger,

    #[error("no credential presented")]
    CredentialMissing,

    #[error("decision timed out after {0:?}")]
    DecisionTimeout(Duration),
}

impl AuthorizationError {
    pub fn key_set_unavailable(message: impl Into<String>) -> Self {
        Self::KeySetUnavailable(message.into())
    }

    pub fn malformed_credential(message: impl Into<String>) -> Self {
        Self::MalformedCredential(message.into())
    }

    pub fn signature_invalid(message: impl Into<String>) -> Self {
        Self::SignatureInvalid(message.into())
    }

    pub fn claim_missing(claim: impl Into<String>) -> Self {
        Self::ClaimMissing(claim.into())
    }

    pub fn introspection_unreachable(message: impl Into<String>) -> Self {
        Self::IntrospectionUnreachable(message.into())
    }

    pub fn introspection_denied(message: impl Into<String>) -> Self {
        Self::IntrospectionDenied(message.into())
    }

    /// Stable label for structured logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::KeySetUnavailable(_) => "key_set_unavailable",
            Self::MalformedCredential(_) => "malformed_credential",
            Self::SignatureInvalid(_) => "signature_invalid",
            Self::ClaimMissing(_) => "claim_missing",
            Self::PrincipalNotAllowed(_) => "principal_not_allowed",
            Self::IntrospectionUnreachable(_) => "introspection_unreachable",
            Self::IntrospectionDenied(_) => "introspection_denied",
            Self::EnvironmentSignalAbsent => "environment_signal_absent",
            Self::UntrustedTrigger => "untrusted_trigger",
            Self::CredentialMissing => "credential_missing",
            Self::DecisionTimeout(_) => "decision_timeout",
        }
    }
}
