//! Liveness probe endpoint

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Response, StatusCode};

const HEALTHY_BODY: &str = r#"{"status":"healthy"}"#;

/// Build the constant liveness response
pub fn handle_health() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, HEALTHY_BODY.len())
        .body(Full::new(Bytes::from_static(HEALTHY_BODY.as_bytes())))
        .unwrap_or_else(|e| {
            crate::logger::log_error(&format!("Failed to build health response: {e}"));
            Response::new(Full::new(Bytes::from_static(HEALTHY_BODY.as_bytes())))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_health_payload() {
        let response = handle_health();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({"status": "healthy"}));
    }
}
