//! Inbound HTTP adapter.

pub mod middleware;

pub use middleware::{AxumRequestSource, CommandGateState, command_gate_middleware};
