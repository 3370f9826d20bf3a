//! Response handling and transformation.
//!
//! # Responsibilities
//! - Relay backend responses to the client as a stream
//! - Synthesize admission rejections
//! - Map backend failures to 5xx responses
//!
//! # Design Decisions
//! - Only proxy-synthesized rejections carry the `x-limiting-proxy` marker,
//!   so clients can tell "proxy said no" from "backend said no"
//! - Backend `Content-Length` is kept: the body is relayed unchanged
//! - A forward stays in flight until its relayed body has been fully sent

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use axum::{BoxError, Json};
use hyper::body::{Body as HttpBody, Frame, SizeHint};
use serde::Serialize;
use thiserror::Error;

use crate::admission::{Rejection, REJECTION_MARKER_HEADER, REJECTION_MARKER_VALUE};
use crate::http::request::strip_hop_by_hop;
use crate::net::connection::InFlightGuard;

/// Failure while forwarding an admitted request.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// Connecting to or exchanging with the backend failed.
    #[error("backend {backend} unreachable: {source}")]
    BackendUnreachable {
        backend: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    /// The outbound request could not be assembled.
    #[error("could not build backend request: {0}")]
    InvalidRequest(#[from] axum::http::Error),
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ForwardError::BackendUnreachable { .. } => {
                (StatusCode::BAD_GATEWAY, "Backend unreachable").into_response()
            }
            ForwardError::InvalidRequest(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Could not forward request").into_response()
            }
        }
    }
}

/// JSON body of a rejection, shaped like the registry's own error payloads.
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error_code: u16,
    message: &'a str,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorBody {
            error_code: self.status.as_u16(),
            message: self.message,
        };
        (
            self.status,
            [(REJECTION_MARKER_HEADER, REJECTION_MARKER_VALUE)],
            Json(body),
        )
            .into_response()
    }
}

/// Turn a backend response into the client response without buffering it.
///
/// `guard` is released when the relayed body finishes or is dropped.
pub fn relay<B>(response: Response<B>, guard: InFlightGuard) -> axum::response::Response
where
    B: HttpBody<Data = Bytes> + Unpin + Send + 'static,
    B::Error: Into<BoxError>,
{
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(
        parts,
        Body::new(TrackedBody {
            inner: body,
            _guard: guard,
        }),
    )
}

/// Response body that holds an in-flight slot until it is dropped.
struct TrackedBody<B> {
    inner: B,
    _guard: InFlightGuard,
}

impl<B> HttpBody for TrackedBody<B>
where
    B: HttpBody + Unpin,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
