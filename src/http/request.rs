//! Request preparation for the backend hop.
//!
//! # Responsibilities
//! - Point the request at the fixed backend authority
//! - Keep method, path and query byte-for-byte (tenant routing relies on
//!   the `/t/{tenantId}/...` prefix surviving untouched)
//! - Drop hop-by-hop and framing headers so the client can regenerate them

use axum::body::Body;
use axum::http::uri::{Authority, InvalidUri, PathAndQuery, Scheme};
use axum::http::{header, Extensions, HeaderMap, HeaderName, Request, Uri, Version};

use crate::http::response::ForwardError;

/// Headers that only describe a single connection and must not be relayed.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "proxy-authorization",
    "proxy-authenticate",
];

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Build the `host:port` authority for the backend, bracketing IPv6 literals.
pub fn backend_authority(host: &str, port: u16) -> Result<Authority, InvalidUri> {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}").parse()
    } else {
        format!("{host}:{port}").parse()
    }
}

/// Rewrite an inbound request into the request sent to the backend.
///
/// `Host` is dropped so the client derives it from the backend authority,
/// and `Content-Length` is dropped so it is recomputed from the body that
/// is actually streamed.
pub fn prepare_forward(
    request: Request<Body>,
    backend: &Authority,
) -> Result<Request<Body>, ForwardError> {
    let (mut parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    parts.uri = Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(backend.clone())
        .path_and_query(path_and_query)
        .build()?;
    parts.version = Version::HTTP_11;
    parts.extensions = Extensions::new();

    strip_hop_by_hop(&mut parts.headers);
    parts.headers.remove(header::HOST);
    parts.headers.remove(header::CONTENT_LENGTH);

    Ok(Request::from_parts(parts, body))
}
