//! Outbound HTTP clients.

pub mod iam_client;
pub mod jwks_client;

pub use iam_client::HttpPermissionIntrospector;
pub use jwks_client::HttpKeySetFetcher;
