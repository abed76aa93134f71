//! Request middleware: client address resolution, request ids, access log

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::info;
use uuid::Uuid;

/// Header carrying the request id in both directions
pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Resolved address of the submitting client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

/// Id assigned to the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Optional headers included in the access log
#[derive(Debug, Clone, Copy)]
pub struct LoggerOptions {
    pub with_referer: bool,
    pub with_user_agent: bool,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            with_referer: true,
            with_user_agent: true,
        }
    }
}

/// Client address: `True-Client-IP`, then `X-Real-IP`, then the first
/// `X-Forwarded-For` entry, then the peer
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let forwarded = || {
        header("x-forwarded-for")
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header("true-client-ip")
        .or_else(|| header("x-real-ip"))
        .or_else(forwarded)
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Attach [`RequestId`] and [`ClientAddr`] to the request
pub async fn identify(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_address(req.headers(), peer);

    req.extensions_mut().insert(RequestId(request_id.clone()));
    req.extensions_mut().insert(ClientAddr(client));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

/// Emit one "Served" line per request
pub async fn log_requests(
    State(options): State<LoggerOptions>,
    req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let proto = format!("{:?}", req.version());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let request_id = req.extensions().get::<RequestId>().map(|id| id.0.clone());
    let referer = options
        .with_referer
        .then(|| header_string(req.headers(), "referer"))
        .flatten();
    let user_agent = options
        .with_user_agent
        .then(|| header_string(req.headers(), "user-agent"))
        .flatten();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let size = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    observability::record_http_request(&route, status);

    info!(
        proto = %proto,
        method = %method,
        path = %path,
        req_id = request_id.as_deref(),
        lat_ms = started.elapsed().as_secs_f64() * 1000.0,
        status,
        size,
        referer = referer.as_deref(),
        ua = user_agent.as_deref(),
        "Served"
    );

    response
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
