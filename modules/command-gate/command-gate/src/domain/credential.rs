//! Building a [`TrustContext`] from a request.

use command_gate_sdk::{RequestSource, TrustContext};

const BEARER_PREFIX: &str = "bearer ";

/// Pull the credential out of the configured header.
///
/// With the conventional `Authorization` header a `Bearer` value wins;
/// otherwise, or when no bearer value is present, the raw header value is
/// used so deployments can carry the token in a custom header.
#[must_use]
pub fn extract_credential(source: &dyn RequestSource, header_name: &str) -> Option<String> {
    let raw = source.header(header_name)?;

    if header_name.eq_ignore_ascii_case(http::header::AUTHORIZATION.as_str())
        && let Some(token) = bearer_value(raw)
    {
        return Some(token.to_owned());
    }

    let raw = raw.trim();
    (!raw.is_empty()).then(|| raw.to_owned())
}

fn bearer_value(header: &str) -> Option<&str> {
    let scheme = header.get(..BEARER_PREFIX.len())?;
    if !scheme.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }
    let token = header[BEARER_PREFIX.len()..].trim();
    (!token.is_empty()).then_some(token)
}

/// Snapshot everything the decision needs from `source`.
///
/// Only the headers named in `signal_headers` are recorded for presence.
#[must_use]
pub fn capture<'a>(
    source: &dyn RequestSource,
    authorization_header: &str,
    signal_headers: impl IntoIterator<Item = &'a str>,
) -> TrustContext {
    let mut builder =
        TrustContext::builder().hosting_environment_active(source.has_hosting_signal());

    if let Some(address) = source.source_address() {
        builder = builder.source_address(address);
    }
    for name in signal_headers {
        if source.has_header(name) {
            builder = builder.header(name);
        }
    }
    if let Some(credential) = extract_credential(source, authorization_header) {
        builder = builder.credential(credential);
    }

    builder.build()
}
