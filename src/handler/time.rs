//! Time-and-IP endpoint
//!
//! Resolves the caller's address and reports it together with the current UTC time.

use chrono::{DateTime, Utc};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{HeaderMap, Response, StatusCode};
use serde::Serialize;
use std::net::SocketAddr;

use super::HandlerError;
use crate::http::json_response;
use crate::logger::{LogRecord, LogSink};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Body of a successful time-and-IP response
#[derive(Debug, Serialize)]
pub struct TimeResponse {
    pub timestamp: String,
    pub ip: String,
}

/// Resolve the client address for a request.
///
/// The first comma-separated entry of a non-empty `X-Forwarded-For` wins, trimmed
/// but otherwise unvalidated. Without one, the connection's peer IP is used.
pub fn resolve_client_ip(headers: &HeaderMap, peer_addr: SocketAddr) -> String {
    forwarded_client(headers).unwrap_or_else(|| peer_addr.ip().to_string())
}

fn forwarded_client(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(X_FORWARDED_FOR)?;
    if value.is_empty() {
        return None;
    }
    let value = String::from_utf8_lossy(value.as_bytes());
    let first = value.split(',').next().unwrap_or_default();
    Some(first.trim().to_string())
}

/// Format as `YYYY-MM-DDTHH:MM:SS.ffffff` with a literal `Z` appended
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    format!("{}Z", now.format("%Y-%m-%dT%H:%M:%S%.6f"))
}

/// Build the time-and-IP response for an already resolved client address
pub fn handle_time_and_ip(
    client_ip: &str,
    now: DateTime<Utc>,
    sink: &dyn LogSink,
) -> Result<Response<Full<Bytes>>, HandlerError> {
    let body = TimeResponse {
        timestamp: format_timestamp(now),
        ip: client_ip.to_string(),
    };

    sink.emit(LogRecord::info(format!("Request from {client_ip}")).with_field("ip", client_ip));

    json_response(StatusCode::OK, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{LogLevel, MemorySink};
    use chrono::{NaiveDateTime, TimeZone};
    use http_body_util::BodyExt;
    use hyper::header::HeaderValue;

    fn peer() -> SocketAddr {
        "192.0.2.10:54321".parse().unwrap()
    }

    fn headers_with_forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_peer_address_without_forwarded_header() {
        assert_eq!(resolve_client_ip(&HeaderMap::new(), peer()), "192.0.2.10");
    }

    #[test]
    fn test_ipv6_peer_address() {
        let v6: SocketAddr = "[::1]:8080".parse().unwrap();
        assert_eq!(resolve_client_ip(&HeaderMap::new(), v6), "::1");
    }

    #[test]
    fn test_first_forwarded_entry() {
        let headers = headers_with_forwarded("1.2.3.4, 5.6.7.8");
        assert_eq!(resolve_client_ip(&headers, peer()), "1.2.3.4");
    }

    #[test]
    fn test_forwarded_entry_irregular_spacing() {
        let headers = headers_with_forwarded("1.2.3.4  ,5.6.7.8");
        assert_eq!(resolve_client_ip(&headers, peer()), "1.2.3.4");
    }

    #[test]
    fn test_single_forwarded_entry() {
        let headers = headers_with_forwarded("203.0.113.7");
        assert_eq!(resolve_client_ip(&headers, peer()), "203.0.113.7");
    }

    #[test]
    fn test_empty_forwarded_header_falls_back_to_peer() {
        let headers = headers_with_forwarded("");
        assert_eq!(resolve_client_ip(&headers, peer()), "192.0.2.10");
    }

    #[test]
    fn test_malformed_forwarded_value_is_not_validated() {
        let headers = headers_with_forwarded("not-an-ip , 1.2.3.4");
        assert_eq!(resolve_client_ip(&headers, peer()), "not-an-ip");

        let headers = headers_with_forwarded(" , 1.2.3.4");
        assert_eq!(resolve_client_ip(&headers, peer()), "");
    }

    #[test]
    fn test_format_timestamp_shape() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(format_timestamp(now), "2024-01-15T10:30:00.000000Z");

        let now = Utc
            .with_ymd_and_hms(2024, 1, 15, 10, 30, 0)
            .unwrap()
            .checked_add_signed(chrono::Duration::microseconds(123_456))
            .unwrap();
        assert_eq!(format_timestamp(now), "2024-01-15T10:30:00.123456Z");
    }

    #[test]
    fn test_format_timestamp_tracks_now() {
        let before = Utc::now();
        let formatted = format_timestamp(Utc::now());
        let after = Utc::now();

        let naive = formatted.strip_suffix('Z').unwrap();
        let parsed = NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
            .unwrap()
            .and_utc();
        assert!(parsed >= before - chrono::Duration::microseconds(1));
        assert!(parsed <= after);
    }

    #[tokio::test]
    async fn test_handle_time_and_ip_body_and_log() {
        let sink = MemorySink::default();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();

        let response = handle_time_and_ip("203.0.113.7", now, &sink).unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"timestamp": "2024-01-15T10:30:00.000000Z", "ip": "203.0.113.7"})
        );

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, LogLevel::Info);
        assert_eq!(records[0].message, "Request from 203.0.113.7");
        assert_eq!(records[0].field("ip"), Some("203.0.113.7"));
    }
}
