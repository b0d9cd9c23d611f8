use super::error::{ApiError, HandlerPanicked};
use crate::error::ErrorCode;
use axum::body::HttpBody;
use axum::extract::{ConnectInfo, Request};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const REAL_IP_HEADER: &str = "x-real-ip";

/// Correlation id of the request being served, available to handlers as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Reuses the caller's `X-Request-ID` or generates one, echoes it on the
/// response and logs one line per request.
///
/// A response marked by the panic handler is replaced here, where the
/// request id is known, so a panicking handler still answers with the
/// usual error body.
pub async fn request_context(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let query = request.uri().query().map(str::to_owned);
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_ip = client_ip(request.headers(), peer);
    let span = info_span!(
        "request",
        request_id = %request_id,
        %method,
        %path,
        query = query.as_deref(),
        client_ip = client_ip.as_deref(),
    );
    let start = Instant::now();

    let mut response = next.run(request).instrument(span.clone()).await;

    if response.extensions().get::<HandlerPanicked>().is_some() {
        response =
            ApiError::new(RequestId(request_id.clone()), ErrorCode::Internal, "").into_response();
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let status = response.status().as_u16();
    let bytes = HttpBody::size_hint(response.body()).exact();
    let latency_ms = start.elapsed().as_millis() as u64;
    span.in_scope(|| {
        if response.status().is_server_error() {
            error!(status, bytes, latency_ms, "request failed");
        } else {
            info!(status, bytes, latency_ms, "request completed");
        }
    });

    response
}

/// Originating client address: the first `X-Forwarded-For` hop, then
/// `X-Real-IP`, then the socket peer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    };

    header(FORWARDED_FOR_HEADER)
        .and_then(|chain| {
            chain
                .split(',')
                .next()
                .map(str::trim)
                .filter(|hop| !hop.is_empty())
                .map(str::to_owned)
        })
        .or_else(|| header(REAL_IP_HEADER))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}
