//! Axum middleware guarding privileged command routes.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use command_gate_sdk::{CommandGateClient, RequestSource};

use crate::config::HostingEnvironment;

/// Body of every rejection. Identical whatever the cause, so callers cannot
/// probe which check failed.
pub const UNAUTHORIZED_BODY: &str = concat!(
    r#"{"type":"about:blank","title":"Unauthorized","status":401,"#,
    r#""detail":"Not authorized to run this command"}"#,
);

/// [`RequestSource`] over an axum request.
pub struct AxumRequestSource<'a> {
    headers: &'a HeaderMap,
    source_address_header: &'a str,
    peer: Option<String>,
    hosting: HostingEnvironment,
}

impl<'a> AxumRequestSource<'a> {
    #[must_use]
    pub fn new(
        headers: &'a HeaderMap,
        source_address_header: &'a str,
        hosting: HostingEnvironment,
    ) -> Self {
        Self {
            headers,
            source_address_header,
            peer: None,
            hosting,
        }
    }

    /// Fallback source address when the platform header is absent.
    #[must_use]
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer.ip().to_string());
        self
    }
}

impl RequestSource for AxumRequestSource<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    fn source_address(&self) -> Option<&str> {
        self.header(self.source_address_header).or(self.peer.as_deref())
    }

    fn has_hosting_signal(&self) -> bool {
        self.hosting.is_active()
    }
}

/// State for [`command_gate_middleware`].
#[derive(Clone)]
pub struct CommandGateState {
    pub gate: Arc<dyn CommandGateClient>,
    pub hosting: HostingEnvironment,
    pub source_address_header: Arc<str>,
    /// Fall back to the connection peer for the source address.
    pub trust_peer_address: bool,
}

/// Authorization middleware for command routes.
///
/// On success the `AuthorizationDecision` is inserted into the request
/// extensions and the request continues. Every other outcome, including a
/// fault in the gate itself, yields the same `401`.
pub async fn command_gate_middleware(
    State(state): State<CommandGateState>,
    mut req: Request,
    next: Next,
) -> Response {
    let peer = if state.trust_peer_address {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr)
    } else {
        None
    };

    let mut source =
        AxumRequestSource::new(req.headers(), &state.source_address_header, state.hosting);
    if let Some(peer) = peer {
        source = source.with_peer(peer);
    }

    match state.gate.authorize(&source).await {
        Ok(decision) if decision.is_allowed() => {
            req.extensions_mut().insert(decision);
            next.run(req).await
        }
        Ok(_) => unauthorized(),
        Err(e) => {
            tracing::error!(error = %e, "Command gate failed, denying request");
            unauthorized()
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::CONTENT_TYPE, "application/problem+json")],
        UNAUTHORIZED_BODY,
    )
        .into_response()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    const ADDRESS_HEADER: &str = "x-appengine-user-ip";

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        map
    }

    fn peer() -> SocketAddr {
        SocketAddr::from(([10, 0, 0, 7], 4711))
    }

    #[test]
    fn header_lookup_ignores_case() {
        let map = headers(&[("x-cloudscheduler", "true")]);
        let source = AxumRequestSource::new(&map, ADDRESS_HEADER, HostingEnvironment::active());

        assert_eq!(source.header("X-CloudScheduler"), Some("true"));
        assert!(source.has_header("X-CLOUDSCHEDULER"));
        assert!(!source.has_header("x-appengine-cron"));
        assert!(source.has_hosting_signal());
    }

    #[test]
    fn platform_address_header_wins_over_peer() {
        let map = headers(&[(ADDRESS_HEADER, "0.1.0.2")]);
        let source = AxumRequestSource::new(&map, ADDRESS_HEADER, HostingEnvironment::inactive())
            .with_peer(peer());

        assert_eq!(source.source_address(), Some("0.1.0.2"));
        assert!(!source.has_hosting_signal());
    }

    #[test]
    fn peer_address_is_the_fallback() {
        let map = HeaderMap::new();
        let source = AxumRequestSource::new(&map, ADDRESS_HEADER, HostingEnvironment::inactive())
            .with_peer(peer());

        assert_eq!(source.source_address(), Some("10.0.0.7"));
    }

    #[test]
    fn no_address_without_header_or_peer() {
        let map = HeaderMap::new();
        let source = AxumRequestSource::new(&map, ADDRESS_HEADER, HostingEnvironment::inactive());

        assert_eq!(source.source_address(), None);
    }

    #[test]
    fn rejection_body_is_problem_json() {
        let body: serde_json::Value = serde_json::from_str(UNAUTHORIZED_BODY).unwrap();
        assert_eq!(body["status"], 401);

        let response = unauthorized();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );
    }
}
