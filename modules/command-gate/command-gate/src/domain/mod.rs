//! Domain layer for the command gate.

pub mod classifier;
pub mod credential;
pub mod environment;
pub mod error;
pub mod key_set;
pub mod local_client;
pub mod opaque_token;
pub mod service;
pub mod signed_token;


pub use error::AuthorizationError;
pub use local_client::CommandGateLocalClient;
pub use service::{DecisionState, DecisionTrace, Service};
