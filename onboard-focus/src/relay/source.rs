//! Where the supervisor reads the focus from.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::Result;
use crate::engine::FocusHandle;
use crate::utils::http_client::build_client;

/// Read-only view of the current focus.
#[async_trait]
pub trait FocusSource: Send + Sync {
    /// Current focus name, or an empty string when nothing is in focus.
    async fn current_focus(&self) -> Result<String>;
}

/// Reads the focus from the engine's `active_stream` endpoint.
pub struct HttpFocusSource {
    url: String,
    client: Client,
}

impl HttpFocusSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            client: build_client(timeout)?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FocusSource for HttpFocusSource {
    async fn current_focus(&self) -> Result<String> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(crate::Error::upstream_status(
                "focus api",
                status.as_u16(),
                body,
            ));
        }

        let body = response.text().await?;
        Ok(body.trim().to_string())
    }
}

/// In-process reads, used when the supervisor runs inside the engine.
#[async_trait]
impl FocusSource for FocusHandle {
    async fn current_focus(&self) -> Result<String> {
        if !self.is_running() {
            return Err(crate::Error::EngineStopped);
        }
        Ok(self.focus_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_reads_plain_text_focus() {
        let app = Router::new().route("/api/v1/active_stream", get(|| async { "abc\n" }));
        let base = serve(app).await;

        let source =
            HttpFocusSource::new(format!("{}/api/v1/active_stream", base), Duration::from_secs(2))
                .unwrap();

        assert_eq!(source.current_focus().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_empty_body_means_no_focus() {
        let app = Router::new().route("/focus", get(|| async { "" }));
        let base = serve(app).await;

        let source = HttpFocusSource::new(format!("{}/focus", base), Duration::from_secs(2)).unwrap();

        assert_eq!(source.current_focus().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_error_status_is_an_error() {
        let app = Router::new().route(
            "/focus",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let base = serve(app).await;

        let source = HttpFocusSource::new(format!("{}/focus", base), Duration::from_secs(2)).unwrap();

        assert!(source.current_focus().await.is_err());
    }
}
