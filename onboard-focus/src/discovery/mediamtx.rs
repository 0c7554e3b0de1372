//! MediaMTX control API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::SourceDiscovery;
use crate::Result;
use crate::domain::SourcePath;
use crate::utils::http_client::{build_client, join_url};

/// Items requested per page from `/v3/paths/list`.
const PAGE_SIZE: u32 = 100;

/// Upper bound on pages walked in one poll.
const MAX_PAGES: u32 = 100;

/// MediaMTX API configuration.
#[derive(Debug, Clone)]
pub struct MediaMtxConfig {
    /// Base URL of the control API, e.g. `http://mediamtx:9997`.
    pub api_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for MediaMtxConfig {
    fn default() -> Self {
        Self {
            api_url: "http://mediamtx:9997".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathList {
    #[serde(default)]
    page_count: u32,
    #[serde(default)]
    items: Vec<SourcePath>,
}

/// Client for the MediaMTX v3 control API.
pub struct MediaMtxClient {
    config: MediaMtxConfig,
    client: Client,
}

impl MediaMtxClient {
    pub fn new(config: MediaMtxConfig) -> Result<Self> {
        let client = build_client(config.request_timeout)?;
        Ok(Self { config, client })
    }

    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    async fn fetch_page(&self, page: u32) -> Result<PathList> {
        let url = join_url(
            &self.config.api_url,
            &format!("v3/paths/list?page={}&itemsPerPage={}", page, PAGE_SIZE),
        );
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(crate::Error::upstream_status(
                "mediamtx",
                status.as_u16(),
                body,
            ));
        }

        Ok(response.json::<PathList>().await?)
    }

    /// Add a path named `key` to the server configuration.
    pub async fn register_path(&self, key: &str) -> Result<()> {
        let url = join_url(
            &self.config.api_url,
            &format!("v3/config/paths/add/{}", urlencoding::encode(key)),
        );
        let response = self
            .client
            .post(&url)
            .json(&json!({ "name": key }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(crate::Error::upstream_status(
                "mediamtx",
                status.as_u16(),
                body,
            ));
        }

        debug!(key = %key, "Registered MediaMTX path");
        Ok(())
    }

    /// Register every key, logging failures. Returns how many succeeded.
    ///
    /// MediaMTX rejects paths that already exist, so a failure here is
    /// usually harmless.
    pub async fn register_paths(&self, keys: &[String]) -> usize {
        let mut registered = 0;
        for key in keys {
            match self.register_path(key).await {
                Ok(()) => registered += 1,
                Err(e) => warn!(key = %key, "Failed to register MediaMTX path: {}", e),
            }
        }
        info!(
            registered,
            total = keys.len(),
            "MediaMTX path registration finished"
        );
        registered
    }
}

#[async_trait]
impl SourceDiscovery for MediaMtxClient {
    async fn list_paths(&self) -> Result<Vec<SourcePath>> {
        let first = self.fetch_page(0).await?;
        if first.page_count > MAX_PAGES {
            // A partial list would make the missing paths look offline.
            return Err(crate::Error::Other(format!(
                "mediamtx reported {} path pages, more than the {} this client reads",
                first.page_count, MAX_PAGES
            )));
        }
        let mut paths = first.items;

        for page in 1..first.page_count {
            paths.extend(self.fetch_page(page).await?.items);
        }

        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(api_url: String) -> MediaMtxClient {
        MediaMtxClient::new(MediaMtxConfig {
            api_url,
            request_timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[test]
    fn test_path_list_ignores_unknown_fields() {
        let body = r#"{
            "pageCount": 1,
            "itemCount": 2,
            "items": [
                {"name": "abc", "ready": true, "readyTime": "2024-01-01T00:00:00Z", "tracks": ["H264"]},
                {"name": "def", "ready": false, "source": null}
            ]
        }"#;
        let list: PathList = serde_json::from_str(body).unwrap();
        assert_eq!(list.page_count, 1);
        assert_eq!(
            list.items,
            vec![SourcePath::ready("abc"), SourcePath::idle("def")]
        );
    }

    #[tokio::test]
    async fn test_list_paths_walks_all_pages() {
        let app = Router::new().route(
            "/v3/paths/list",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let page = params.get("page").cloned().unwrap_or_default();
                let name = format!("path-{}", page);
                Json(serde_json::json!({
                    "pageCount": 2,
                    "items": [{"name": name, "ready": true}]
                }))
            }),
        );
        let base = serve(app).await;

        let paths = client(base).list_paths().await.unwrap();

        assert_eq!(
            paths,
            vec![SourcePath::ready("path-0"), SourcePath::ready("path-1")]
        );
    }

    #[tokio::test]
    async fn test_list_paths_refuses_partial_listing() {
        let app = Router::new().route(
            "/v3/paths/list",
            get(|| async {
                Json(serde_json::json!({
                    "pageCount": MAX_PAGES + 1,
                    "items": [{"name": "abc", "ready": true}]
                }))
            }),
        );
        let base = serve(app).await;

        let err = client(base).list_paths().await.unwrap_err();

        assert!(err.to_string().contains("pages"));
    }

    #[tokio::test]
    async fn test_list_paths_reports_server_errors() {
        let app = Router::new().route(
            "/v3/paths/list",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = serve(app).await;

        let err = client(base).list_paths().await.unwrap_err();

        assert!(err.is_transient());
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_list_paths_fails_when_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{}", addr))
            .list_paths()
            .await
            .unwrap_err();

        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_register_paths_posts_each_key() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let recorder = seen.clone();
        let app = Router::new().route(
            "/v3/config/paths/add/{key}",
            post(move |Path(key): Path<String>, Json(body): Json<serde_json::Value>| {
                let recorder = recorder.clone();
                async move {
                    assert_eq!(body["name"], key.as_str());
                    recorder.lock().unwrap().push(key.clone());
                    if key == "dup" {
                        StatusCode::BAD_REQUEST
                    } else {
                        StatusCode::OK
                    }
                }
            }),
        );
        let base = serve(app).await;

        let keys = vec!["one".to_string(), "dup".to_string(), "two".to_string()];
        let registered = client(base).register_paths(&keys).await;

        assert_eq!(registered, 2);
        assert_eq!(*seen.lock().unwrap(), keys);
    }

    #[tokio::test]
    async fn test_register_path_encodes_key() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let recorder = seen.clone();
        let app = Router::new().route(
            "/v3/config/paths/add/{key}",
            post(move |Path(key): Path<String>| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().unwrap().push(key);
                    StatusCode::OK
                }
            }),
        );
        let base = serve(app).await;

        client(base).register_path("team/a b").await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["team/a b".to_string()]);
    }
}
