//! Request routing dispatch module
//!
//! Entry point for HTTP request processing, responsible for method validation, route matching,
//! dispatching and access logging.

use crate::config::{AppState, RoutesConfig};
use crate::handler::{health, time, HandlerError};
use crate::http;
use crate::logger::{self, AccessLogEntry, LogRecord, LogSink};
use chrono::{DateTime, Utc};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, REFERER, USER_AGENT};
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Registered routes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    TimeAndIp,
    Health,
}

/// Match a request path against the registered routes (exact match, query ignored)
pub fn match_route(path: &str, routes: &RoutesConfig) -> Option<Route> {
    if path == "/" {
        return Some(Route::TimeAndIp);
    }
    if routes.health.enabled && path == routes.health.liveness_path {
        return Some(Route::Health);
    }
    None
}

/// Main entry point for HTTP request handling
#[allow(clippy::unused_async)]
pub async fn handle_request<B>(
    req: Request<B>,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(dispatch(&req, peer_addr, &state))
}

/// Route a request and produce its response
pub fn dispatch<B>(req: &Request<B>, peer_addr: SocketAddr, state: &AppState) -> Response<Full<Bytes>> {
    let started = Instant::now();
    let received_at = Utc::now();
    let client_ip = time::resolve_client_ip(req.headers(), peer_addr);
    let sink = state.sink.as_ref();

    let response = match match_route(req.uri().path(), &state.config.routes) {
        Some(route) => respond(route, req.method(), &client_ip, received_at, sink),
        None => http::build_404_response(),
    };

    if state.access_log_enabled() {
        log_access(req, &response, client_ip, received_at, started, state);
    }

    response
}

fn respond(
    route: Route,
    method: &Method,
    client_ip: &str,
    now: DateTime<Utc>,
    sink: &dyn LogSink,
) -> Response<Full<Bytes>> {
    match *method {
        Method::GET => run_route(route, client_ip, now, sink),
        Method::HEAD => http::strip_body(run_route(route, client_ip, now, sink)),
        Method::OPTIONS => http::build_options_response(),
        _ => {
            sink.emit(LogRecord::new(
                logger::LogLevel::Warn,
                format!("Method not allowed: {method}"),
            ));
            http::build_405_response()
        }
    }
}

fn run_route(
    route: Route,
    client_ip: &str,
    now: DateTime<Utc>,
    sink: &dyn LogSink,
) -> Response<Full<Bytes>> {
    match route {
        Route::TimeAndIp => time::handle_time_and_ip(client_ip, now, sink)
            .unwrap_or_else(|e| internal_error(&e, sink)),
        Route::Health => health::handle_health(),
    }
}

/// Log the cause and answer with the generic 500 body
pub fn internal_error(err: &HandlerError, sink: &dyn LogSink) -> Response<Full<Bytes>> {
    sink.emit(LogRecord::error(format!("Error processing request: {err}")));
    http::build_500_response()
}

fn log_access<B>(
    req: &Request<B>,
    response: &Response<Full<Bytes>>,
    client_ip: String,
    received_at: DateTime<Utc>,
    started: Instant,
    state: &AppState,
) {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
    };

    let mut entry = AccessLogEntry::new(
        client_ip,
        received_at,
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = http_version(req.version()).to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .body()
        .size_hint()
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0);
    entry.referer = header(REFERER);
    entry.user_agent = header(USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    state
        .sink
        .access(&entry.format(&state.config.logging.access_log_format));
}

const fn http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
