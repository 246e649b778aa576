//! Command Gate SDK
//!
//! This crate provides the public API for the `command_gate` module:
//!
//! - [`CommandGateClient`] - Public API trait for consumers
//! - [`RequestSource`] - Capability trait the transport layer implements per request
//! - [`AuthorizationDecision`] / [`DecisionReason`] - The verdict and its reason code
//! - [`IdentityClaims`] / [`TrustContext`] - Per-request models
//! - [`CommandGateError`] - Error types
//!
//! ## Usage
//!
//! ```ignore
//! use command_gate_sdk::CommandGateClient;
//!
//! let decision = gate.authorize(&request_source).await?;
//! if !decision.is_allowed() {
//!     return unauthorized();
//! }
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod models;

// Re-export main types at crate root
pub use api::{CommandGateClient, RequestSource};
pub use error::CommandGateError;
pub use models::{
    AuthorizationDecision, DecisionReason, IdentityClaims, TrustContext, TrustContextBuilder,
};
