//! Command Gate Module
//!
//! Decides whether an inbound request may trigger a privileged administrative
//! command. The decision walks a fixed chain and fails closed:
//!
//! 1. Environment trust (cron / scheduler triggers, only inside the hosting environment)
//! 2. Credential extraction from the configured header
//! 3. Token shape classification
//! 4. Signed identity token verification (JWKS, RS256, principal allow-list)
//!    or opaque access token verification (IAM permission introspection)
//!
//! Provides the `CommandGateClient` trait implementation and an axum
//! middleware for consumption by the HTTP layer.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod config;
pub mod domain;
pub mod infra;
pub mod module;

#[cfg(test)]
mod test_support;

pub use config::{CommandGateConfig, EnvironmentTrustConfig, HostingEnvironment};
pub use module::CommandGate;
