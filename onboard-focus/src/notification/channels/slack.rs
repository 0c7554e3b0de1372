//! Slack notification channel.
//!
//! Posts plain-text messages to one channel through `chat.postMessage`.
//! Slack answers HTTP 200 with `{"ok": false}` on API errors, so the body
//! is checked as well as the status. 429 responses are retried after the
//! `Retry-After` delay.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::NotificationChannel;
use crate::Result;
use crate::notification::events::FocusEvent;
use crate::utils::http_client::{USER_AGENT, install_rustls_provider, join_url};

/// Maximum number of retries for rate-limited requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Slack channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Whether the channel is enabled.
    pub enabled: bool,
    /// Bot token (`xoxb-...`).
    pub token: String,
    /// Destination channel id.
    pub channel_id: String,
    /// Web API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            token: String::new(),
            channel_id: String::new(),
            api_base_url: default_api_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Slack notification channel.
pub struct SlackChannel {
    config: SlackConfig,
    client: Client,
}

impl SlackChannel {
    /// Create a new Slack channel.
    pub fn new(config: SlackConfig) -> Self {
        install_rustls_provider();
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self { config, client }
    }

    fn build_payload(&self, event: &FocusEvent) -> serde_json::Value {
        json!({
            "channel": self.config.channel_id,
            "text": event.message(),
        })
    }

    async fn send_with_retry(&self, payload: &serde_json::Value) -> Result<()> {
        let url = join_url(&self.config.api_base_url, "chat.postMessage");
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.config.token)
                .json(payload)
                .send()
                .await?;

            let status = response.status();

            if status.as_u16() == 429 {
                let retry_after = Self::parse_retry_after(&response);

                if attempts >= MAX_RATE_LIMIT_RETRIES {
                    warn!(
                        "Slack rate limit: max retries ({}) exceeded, last retry_after was {:?}",
                        MAX_RATE_LIMIT_RETRIES, retry_after
                    );
                    return Err(crate::Error::upstream_status(
                        "slack",
                        429,
                        format!("rate limited after {} attempts", attempts),
                    ));
                }

                let wait_duration = retry_after.unwrap_or(Duration::from_secs(1));
                debug!(
                    "Slack rate limited (429), waiting {:?} before retry (attempt {}/{})",
                    wait_duration, attempts, MAX_RATE_LIMIT_RETRIES
                );
                tokio::time::sleep(wait_duration).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(crate::Error::upstream_status(
                    "slack",
                    status.as_u16(),
                    body,
                ));
            }

            let body: SlackResponse = response.json().await?;
            if !body.ok {
                return Err(crate::Error::Other(format!(
                    "Slack API error: {}",
                    body.error.as_deref().unwrap_or("unknown")
                )));
            }

            return Ok(());
        }
    }

    fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
        let secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)?
            .to_str()
            .ok()?
            .parse::<f64>()
            .ok()?;
        Some(Duration::from_secs_f64(secs.max(0.0)))
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn channel_type(&self) -> &'static str {
        "slack"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.token.is_empty() && !self.config.channel_id.is_empty()
    }

    async fn send(&self, event: &FocusEvent) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let payload = self.build_payload(event);
        self.send_with_retry(&payload).await?;

        debug!(
            stream_key = %event.stream_key(),
            "Slack notification sent: {}",
            event.event_type()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owners::StreamOwner;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn config(api_base_url: String) -> SlackConfig {
        SlackConfig {
            enabled: true,
            token: "xoxb-test".to_string(),
            channel_id: "C123".to_string(),
            api_base_url,
            timeout_secs: 2,
        }
    }

    #[test]
    fn test_slack_config_default() {
        let config = SlackConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.api_base_url, "https://slack.com/api");
        assert!(!SlackChannel::new(config).is_enabled());
    }

    #[test]
    fn test_build_payload() {
        let channel = SlackChannel::new(config("http://unused".to_string()));
        let event = FocusEvent::lost(&StreamOwner::new("key", "U1"));

        let payload = channel.build_payload(&event);

        assert_eq!(payload["channel"], "C123");
        assert_eq!(payload["text"], "Hey <@U1>, you're no longer in focus!");
    }

    #[tokio::test]
    async fn test_send_posts_message_with_bearer_token() {
        let seen: Arc<Mutex<Vec<(String, serde_json::Value)>>> = Arc::default();
        let recorder = seen.clone();
        let app = Router::new().route(
            "/chat.postMessage",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| {
                let recorder = recorder.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    recorder.lock().unwrap().push((auth, body));
                    Json(json!({"ok": true}))
                }
            }),
        );
        let channel = SlackChannel::new(config(serve(app).await));

        channel
            .send(&FocusEvent::gained(&StreamOwner::new("key", "U9")))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "Bearer xoxb-test");
        assert_eq!(seen[0].1["channel"], "C123");
    }

    #[tokio::test]
    async fn test_send_surfaces_api_error() {
        let app = Router::new().route(
            "/chat.postMessage",
            post(|| async { Json(json!({"ok": false, "error": "channel_not_found"})) }),
        );
        let channel = SlackChannel::new(config(serve(app).await));

        let err = channel
            .send(&FocusEvent::gained(&StreamOwner::new("key", "U9")))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("channel_not_found"));
    }

    #[tokio::test]
    async fn test_send_retries_after_rate_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/chat.postMessage",
            post(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "0")]).into_response()
                    } else {
                        Json(json!({"ok": true})).into_response()
                    }
                }
            }),
        );
        let channel = SlackChannel::new(config(serve(app).await));

        channel
            .send(&FocusEvent::lost(&StreamOwner::new("key", "U9")))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disabled_channel_sends_nothing() {
        let channel = SlackChannel::new(SlackConfig::default());
        channel
            .send(&FocusEvent::lost(&StreamOwner::new("key", "U9")))
            .await
            .unwrap();
    }
}
