use axum::body::Bytes;
use chrono::Utc;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::WebhookConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Webhook request timed out after {secs} seconds")]
    Timeout { secs: u64 },
    #[error("Webhook request failed: {0}")]
    Network(String),
}

/// One file to hand to the extraction webhook.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub url: String,
    pub file_id: i64,
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Any HTTP response, 2xx or not. The body is kept for diagnostics.
#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status: StatusCode,
    pub body: String,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Sends raw documents to the extraction webhook. A single attempt per call;
/// the client timeout is the only cancellation.
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    client: Client,
    timeout: Duration,
}

impl WebhookTransport {
    pub fn new(config: &WebhookConfig) -> Result<Self, TransportError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn send(&self, request: &WebhookRequest) -> Result<WebhookResponse, TransportError> {
        let request_id = format!("{}-{}", Utc::now().timestamp_millis(), &Uuid::new_v4().simple().to_string()[..9]);
        let encoded_name = urlencoding::encode(&request.original_name).into_owned();
        let plain_name = header_safe_name(&request.original_name, &encoded_name);
        let mime_type = if request.mime_type.is_empty() {
            "application/octet-stream"
        } else {
            request.mime_type.as_str()
        };

        info!(
            "Sending {} ({} bytes, {}) to webhook {}",
            request.original_name,
            request.bytes.len(),
            mime_type,
            request.url
        );
        debug!("Webhook request id {} for file {}", request_id, request.file_id);

        // Content-Length is derived from the body by reqwest.
        let response = self
            .client
            .post(&request.url)
            .header(header::CONTENT_TYPE, mime_type)
            .header("X-Original-Name", encoded_name.as_str())
            .header("X-Filename", plain_name)
            .header("X-File-Name", plain_name)
            .header("filename", plain_name)
            .header("original-filename", plain_name)
            .header("X-File-Type", mime_type)
            .header("X-Request-ID", request_id.as_str())
            .header("X-File-ID", request.file_id.to_string())
            .header("X-Timestamp", Utc::now().to_rfc3339())
            .header(header::ACCEPT, "application/json, text/plain, */*")
            .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(header::PRAGMA, "no-cache")
            .body(request.bytes.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        info!("Webhook response for {}: {}", request.original_name, status);

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Err(self.timeout_error()),
            Err(e) => {
                warn!("Could not read webhook response body: {}", e);
                String::new()
            }
        };

        debug!(
            "Webhook body for {} ({} chars): {}",
            request.original_name,
            body.len(),
            body.chars().take(1000).collect::<String>()
        );

        Ok(WebhookResponse { status, body })
    }

    fn classify(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            self.timeout_error()
        } else {
            TransportError::Network(err.to_string())
        }
    }

    fn timeout_error(&self) -> TransportError {
        TransportError::Timeout { secs: self.timeout.as_secs() }
    }
}

/// Raw filename headers carry the name as-is when it is printable ASCII,
/// the percent-encoded form otherwise.
fn header_safe_name<'a>(name: &'a str, encoded: &'a str) -> &'a str {
    if name.bytes().all(|b| (0x20..0x7f).contains(&b)) {
        name
    } else {
        encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn config(timeout_secs: u64) -> WebhookConfig {
        WebhookConfig {
            default_url: "https://hooks.example.com/webhook".to_string(),
            timeout_secs,
            user_agent: "docgrid-rs-test/1.0".to_string(),
        }
    }

    fn request(url: String) -> WebhookRequest {
        WebhookRequest {
            url,
            file_id: 12,
            original_name: "PO 25906562.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            bytes: Bytes::from_static(b"%PDF-1.4 test"),
        }
    }

    #[test]
    fn test_header_safe_name() {
        assert_eq!(header_safe_name("a b.pdf", "a%20b.pdf"), "a b.pdf");
        assert_eq!(header_safe_name("Rechnung-ä.pdf", "Rechnung-%C3%A4.pdf"), "Rechnung-%C3%A4.pdf");
    }

    #[tokio::test]
    async fn test_send_posts_bytes_with_filename_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/webhook")
                    .header("content-type", "application/pdf")
                    .header("x-original-name", "PO%2025906562.pdf")
                    .header("x-filename", "PO 25906562.pdf")
                    .header("x-file-name", "PO 25906562.pdf")
                    .header("filename", "PO 25906562.pdf")
                    .header("original-filename", "PO 25906562.pdf")
                    .header("x-file-id", "12")
                    .header("cache-control", "no-cache, no-store, must-revalidate")
                    .header("user-agent", "docgrid-rs-test/1.0")
                    .header_exists("x-request-id")
                    .header_exists("x-timestamp")
                    .body("%PDF-1.4 test");
                then.status(200).body(r#"[["a"]]"#);
            })
            .await;

        let transport = WebhookTransport::new(&config(5)).unwrap();
        let response = transport.send(&request(server.url("/webhook"))).await.unwrap();

        mock.assert_async().await;
        assert!(response.is_success());
        assert_eq!(response.body, r#"[["a"]]"#);
    }

    #[tokio::test]
    async fn test_non_success_status_is_returned_not_raised() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/webhook");
                then.status(500).body("workflow crashed");
            })
            .await;

        let transport = WebhookTransport::new(&config(5)).unwrap();
        let response = transport.send(&request(server.url("/webhook"))).await.unwrap();

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body, "workflow crashed");
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_slow_webhook_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/webhook");
                then.status(200).delay(Duration::from_secs(3)).body("[]");
            })
            .await;

        let transport = WebhookTransport::new(&config(1)).unwrap();
        let result = transport.send(&request(server.url("/webhook"))).await;

        assert_eq!(result.unwrap_err(), TransportError::Timeout { secs: 1 });
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_network_error() {
        let transport = WebhookTransport::new(&config(5)).unwrap();
        let result = transport.send(&request("http://127.0.0.1:1/webhook".to_string())).await;

        assert!(matches!(result, Err(TransportError::Network(_))));
    }
}
