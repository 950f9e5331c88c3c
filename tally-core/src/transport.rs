//! Remote transport for the dashboard service.
//!
//! Provides a `Transport` trait with an HTTP implementation speaking the
//! dashboard's JSON protocol:
//! - `POST /generate`   — allocate a session id (plain-text integer reply)
//! - `POST /update`     — push a snapshot, receive directives
//! - `POST /state`      — announce a lifecycle transition
//! - `POST /notify`     — one-shot notification
//! - `POST /screenshot` — base64 PNG upload

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

use crate::config::TallyConfig;
use crate::models::{NotificationPayload, ScreenshotPayload, SessionDetails, UpdateReply};

// ============================================================================
// Transport trait
// ============================================================================

/// Abstraction over the remote dashboard endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Ask the endpoint for a new session id.
    async fn open_session(&self, details: &SessionDetails) -> Result<u64, TransmissionError>;

    /// Push the latest snapshot and return the operator's directives.
    async fn push_update(&self, details: &SessionDetails)
        -> Result<UpdateReply, TransmissionError>;

    /// Announce the lifecycle state carried in `details.state`.
    async fn push_state(&self, details: &SessionDetails) -> Result<(), TransmissionError>;

    async fn notify(&self, payload: &NotificationPayload<'_>) -> Result<(), TransmissionError>;

    async fn upload_screenshot(
        &self,
        payload: &ScreenshotPayload<'_>,
    ) -> Result<(), TransmissionError>;

    /// Transport name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum TransmissionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("All {attempts} attempts failed")]
    RetryExhausted { attempts: usize },
}

// ============================================================================
// HttpTransport
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Retries for session allocation only. Updates, signals and
    /// notifications are sent once.
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl From<&TallyConfig> for HttpTransportConfig {
    fn from(config: &TallyConfig) -> Self {
        Self {
            base_url: config.service.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.reporting.request_timeout_seconds),
            max_retries: config.reporting.max_retries,
            retry_delay_ms: config.reporting.retry_delay_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, TransmissionError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn from_config(config: &TallyConfig) -> Result<Self, TransmissionError> {
        Self::new(HttpTransportConfig::from(config))
    }

    async fn post<B: Serialize + ?Sized + Sync>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<reqwest::Response, TransmissionError> {
        let url = format!("{}{}", self.config.base_url, endpoint);
        tracing::debug!(url = %url, "Sending request to dashboard");

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::debug!(code = status.as_u16(), message = %message, "Dashboard returned an error");
            return Err(TransmissionError::Api {
                code: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn post_text<B: Serialize + ?Sized + Sync>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<String, TransmissionError> {
        let response = self.post(endpoint, body).await?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open_session(&self, details: &SessionDetails) -> Result<u64, TransmissionError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(self.config.max_retries);

        let attempts = self.config.max_retries + 1;
        let body = Retry::spawn(retry_strategy, || self.post_text("/generate", details))
            .await
            .map_err(|e| {
                tracing::warn!(attempts, error = %e, "Session allocation failed");
                TransmissionError::RetryExhausted { attempts }
            })?;

        body.trim()
            .parse::<u64>()
            .map_err(|_| TransmissionError::InvalidResponse(format!("session id {:?}", body.trim())))
    }

    async fn push_update(
        &self,
        details: &SessionDetails,
    ) -> Result<UpdateReply, TransmissionError> {
        let response = self.post("/update", details).await?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| TransmissionError::InvalidResponse(format!("update reply: {}", e)))
    }

    async fn push_state(&self, details: &SessionDetails) -> Result<(), TransmissionError> {
        self.post("/state", details).await?;
        Ok(())
    }

    async fn notify(&self, payload: &NotificationPayload<'_>) -> Result<(), TransmissionError> {
        self.post("/notify", payload).await?;
        Ok(())
    }

    async fn upload_screenshot(
        &self,
        payload: &ScreenshotPayload<'_>,
    ) -> Result<(), TransmissionError> {
        self.post("/screenshot", payload).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "http"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricSnapshot;
    use crate::models::{Notification, SessionState, Severity};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_transport(server: &MockServer) -> HttpTransport {
        HttpTransport::new(HttpTransportConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(2),
            max_retries: 2,
            retry_delay_ms: 10,
        })
        .expect("Failed to create transport")
    }

    fn test_details() -> SessionDetails {
        let mut custom = MetricSnapshot::new();
        custom.insert("Kills", 3i64);
        SessionDetails {
            token: "T".to_string(),
            developer_username: "dev".to_string(),
            client_username: "client".to_string(),
            client_name: "tally".to_string(),
            script_name: "Fighter".to_string(),
            session_id: 7,
            status: "Fighting".to_string(),
            state: SessionState::Running,
            login_username: "alias".to_string(),
            custom,
            custom_setup: Vec::new(),
            runtime: 1500,
        }
    }

    #[tokio::test]
    async fn test_open_session_parses_plain_text_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(body_partial_json(serde_json::json!({ "token": "T" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("42\r\n"))
            .expect(1)
            .mount(&server)
            .await;

        let id = test_transport(&server)
            .open_session(&test_details())
            .await
            .expect("session should open");
        assert_eq!(id, 42);
    }

    #[tokio::test]
    async fn test_open_session_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("9"))
            .mount(&server)
            .await;

        let id = test_transport(&server).open_session(&test_details()).await;
        assert_eq!(id.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_open_session_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .expect(3)
            .mount(&server)
            .await;

        let result = test_transport(&server).open_session(&test_details()).await;
        match result {
            Err(TransmissionError::RetryExhausted { attempts }) => assert_eq!(attempts, 3),
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_session_rejects_non_numeric_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not-a-number"))
            .mount(&server)
            .await;

        let result = test_transport(&server).open_session(&test_details()).await;
        assert!(matches!(result, Err(TransmissionError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_push_update_sends_details_and_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/update"))
            .and(body_partial_json(serde_json::json!({
                "token": "T",
                "session_id": 7,
                "state": "run",
                "status": "Fighting",
                "login_username": "alias",
                "custom": { "Kills": 3 },
                "runtime": 1500
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "state": "run",
                "screenshot": false,
                "action": { "name": "Food", "action": "Salmon" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = test_transport(&server)
            .push_update(&test_details())
            .await
            .expect("update should succeed");
        assert_eq!(reply.state, SessionState::Running);
        assert_eq!(reply.action.map(|a| a.action).as_deref(), Some("Salmon"));
    }

    #[tokio::test]
    async fn test_push_update_maps_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/update"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let result = test_transport(&server).push_update(&test_details()).await;
        match result {
            Err(TransmissionError::Api { code, message }) => {
                assert_eq!(code, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_notify_sends_opcode_title_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .and(body_partial_json(serde_json::json!({
                "token": "T",
                "type": 3,
                "title": "Level up!",
                "message": "Attack is now 50"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let details = test_details();
        let notification = Notification::new("Level up!", "Attack is now 50", Severity::Information);
        test_transport(&server)
            .notify(&NotificationPayload::new(&details, &notification))
            .await
            .expect("notify should succeed");
    }

    #[tokio::test]
    async fn test_push_state_sends_state_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/state"))
            .and(body_partial_json(serde_json::json!({ "state": "pause" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut details = test_details();
        details.state = SessionState::Paused;
        test_transport(&server)
            .push_state(&details)
            .await
            .expect("state push should succeed");
    }
}
