//! Public API traits for the command gate.

use async_trait::async_trait;

use crate::error::CommandGateError;
use crate::models::AuthorizationDecision;

/// Read-only view of an inbound request, implemented per transport.
///
/// Header lookups are case-insensitive. Implementations must not perform
/// I/O: everything the gate needs is already on the request or was decided
/// at process start (the hosting signal).
pub trait RequestSource: Send + Sync {
    /// Value of the named header, if present and valid UTF-8.
    fn header(&self, name: &str) -> Option<&str>;

    /// Whether the named header is present at all, regardless of its value.
    fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// The caller's reported source address.
    fn source_address(&self) -> Option<&str>;

    /// Whether the process runs inside the managed hosting environment.
    fn has_hosting_signal(&self) -> bool;
}

/// Public API trait for the command gate.
///
/// ```ignore
/// let gate: Arc<dyn CommandGateClient> = ...;
/// let decision = gate.authorize(&source).await?;
/// ```
#[async_trait]
pub trait CommandGateClient: Send + Sync {
    /// Decide whether the request may invoke a privileged command.
    ///
    /// Every verification failure yields a denied decision; `Err` is reserved
    /// for faults in the gate's own wiring.
    ///
    /// # Errors
    ///
    /// - `Internal` if the gate itself is misconfigured
    async fn authorize(
        &self,
        source: &dyn RequestSource,
    ) -> Result<AuthorizationDecision, CommandGateError>;
}
