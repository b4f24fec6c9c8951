//! HTTP response building module
//!
//! Provides builders for the JSON responses the service emits, decoupled from handler logic.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, ALLOW, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Methods accepted on every registered route
pub const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Fixed body for the generic 500 response
pub const INTERNAL_ERROR_BODY: &str = r#"{"error":"Internal server error"}"#;

/// Generic JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse<'a> {
    pub error: &'a str,
}

/// Serialize `body` and build a JSON response with the given status
pub fn json_response<T: Serialize>(
    status: StatusCode,
    body: &T,
) -> Result<Response<Full<Bytes>>, crate::handler::HandlerError> {
    let json = serde_json::to_vec(body)?;
    let response = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
        .header(CONTENT_LENGTH, json.len())
        .body(Full::new(Bytes::from(json)))?;
    Ok(response)
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
        .body(Full::new(Bytes::from_static(INTERNAL_ERROR_BODY.as_bytes())))
        .unwrap_or_else(|e| {
            log_build_error("500", &e);
            let mut response = Response::new(Full::new(Bytes::from_static(
                INTERNAL_ERROR_BODY.as_bytes(),
            )));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    error_response(StatusCode::NOT_FOUND, "Not found", None)
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<Full<Bytes>> {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "Method not allowed",
        Some(ALLOWED_METHODS),
    )
}

/// Build OPTIONS response
pub fn build_options_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ALLOW, ALLOWED_METHODS)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("OPTIONS", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Drop the body of a GET response so it can answer a HEAD request.
/// Status and headers, including `Content-Length`, are kept.
pub fn strip_body(response: Response<Full<Bytes>>) -> Response<Full<Bytes>> {
    let (parts, _) = response.into_parts();
    Response::from_parts(parts, Full::new(Bytes::new()))
}

fn error_response(
    status: StatusCode,
    message: &str,
    allow: Option<&'static str>,
) -> Response<Full<Bytes>> {
    match json_response(status, &ErrorResponse { error: message }) {
        Ok(mut response) => {
            if let Some(allow) = allow {
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_static(allow));
            }
            response
        }
        Err(e) => {
            crate::logger::log_error(&format!("Failed to build {status} response: {e}"));
            build_500_response()
        }
    }
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
