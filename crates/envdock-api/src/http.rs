//! HTTP implementation of [`EnvdockApi`] over the backend's REST and
//! server-sent-event surface

use crate::error::{ApiError, Result};
use crate::sse::SseDecoder;
use crate::types::*;
use crate::{EnvdockApi, StreamHandle};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Response, StatusCode};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Client for the envdock backend.
///
/// Plain requests carry a per-request timeout; the two streaming
/// endpoints (logs, image pull) are exempt so long-lived connections
/// are not cut off.
pub struct HttpApi {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = reqwest::Url::parse(base_url)
            .map_err(|e| ApiError::BadUrl(format!("{}: {}", base_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::BadUrl(format!(
                "{}: expected http or https",
                base_url
            )));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-2xx response into an [`ApiError::Server`], pulling the
    /// message out of a `{"detail": ...}` body when the server sent one.
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
            .unwrap_or_else(|| {
                if body.is_empty() {
                    format!("Server returned {}", status)
                } else {
                    body.clone()
                }
            });

        debug!("Request rejected: {} {}", status, detail);
        Err(ApiError::Server {
            status: status.as_u16(),
            detail,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http
            .get(self.url(path))
            .timeout(self.timeout)
            .send()
            .await?;
        Self::check(response).await?.json().await.map_err(Into::into)
    }

    /// Existence-style probe: 2xx means yes, 400/404 mean no, anything
    /// else is a real error.
    async fn probe(&self, builder: reqwest::RequestBuilder) -> Result<bool> {
        let response = builder.timeout(self.timeout).send().await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND => Ok(false),
            _ => {
                Self::check(response).await?;
                Ok(false)
            }
        }
    }

    /// Open a server-sent-event connection, exempt from the per-request
    /// timeout.
    async fn open_stream(&self, path: &str) -> Result<Response> {
        let response = self.http.get(self.url(path)).send().await?;
        Self::check(response).await
    }
}

#[async_trait]
impl EnvdockApi for HttpApi {
    async fn list_environments(&self, folder_id: Option<&str>) -> Result<Vec<Environment>> {
        let mut request = self
            .http
            .get(self.url("/environments"))
            .timeout(self.timeout);
        if let Some(folder) = folder_id {
            request = request.query(&[("folderId", folder)]);
        }
        let response = Self::check(request.send().await?).await?;
        response.json().await.map_err(Into::into)
    }

    async fn create_environment(&self, input: &EnvironmentInput) -> Result<Environment> {
        debug!("Creating environment '{}' from {}", input.name, input.image);
        let response = self
            .http
            .post(self.url("/environments"))
            .timeout(self.timeout)
            .json(input)
            .send()
            .await?;
        Self::check(response).await?.json().await.map_err(Into::into)
    }

    async fn update_environment(
        &self,
        id: &str,
        patch: &EnvironmentUpdate,
    ) -> Result<Environment> {
        let response = self
            .http
            .put(self.url(&format!("/environments/{}", id)))
            .timeout(self.timeout)
            .json(patch)
            .send()
            .await?;
        Self::check(response).await?.json().await.map_err(Into::into)
    }

    async fn delete_environment(&self, id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/environments/{}", id)))
            .timeout(self.timeout)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn duplicate_environment(
        &self,
        id: &str,
        input: &EnvironmentInput,
    ) -> Result<Environment> {
        debug!("Duplicating environment {} as '{}'", id, input.name);
        let response = self
            .http
            .post(self.url(&format!("/environments/{}/duplicate", id)))
            .timeout(self.timeout)
            .json(input)
            .send()
            .await?;
        Self::check(response).await?.json().await.map_err(Into::into)
    }

    async fn activate_environment(&self, id: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url(&format!("/environments/{}/activate", id)))
            .timeout(self.timeout)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn deactivate_environment(&self, id: &str) -> Result<()> {
        let response = self
            .http
            .post(self.url(&format!("/environments/{}/deactivate", id)))
            .timeout(self.timeout)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn stream_logs(
        &self,
        id: &str,
        chunks: mpsc::UnboundedSender<String>,
    ) -> Result<StreamHandle> {
        let response = self
            .open_stream(&format!("/environments/{}/logs", id))
            .await?;
        let id = id.to_string();

        let task = tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = body.next().await {
                let bytes = match chunk {
                    Ok(b) => b,
                    Err(e) => {
                        warn!("Log stream for {} dropped: {}", id, e);
                        break;
                    }
                };
                for event in decoder.feed(&bytes) {
                    if chunks.send(event.data).is_err() {
                        return;
                    }
                }
            }
            debug!("Log stream for {} ended", id);
        });

        Ok(StreamHandle::new(task))
    }

    async fn valid_comfyui_path(&self, path: &str) -> Result<bool> {
        let request = self
            .http
            .post(self.url("/valid-comfyui-path"))
            .json(&serde_json::json!({ "path": path }));
        self.probe(request).await
    }

    async fn install_comfyui(&self, path: &str, branch: &str) -> Result<()> {
        debug!("Installing ComfyUI {} at {}", branch, path);
        let response = self
            .http
            .post(self.url("/install-comfyui"))
            .json(&serde_json::json!({ "path": path, "branch": branch }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn user_settings(&self) -> Result<UserSettings> {
        self.get_json("/user-settings").await
    }

    async fn update_user_settings(&self, settings: &UserSettings) -> Result<UserSettings> {
        let response = self
            .http
            .put(self.url("/user-settings"))
            .timeout(self.timeout)
            .json(settings)
            .send()
            .await?;
        Self::check(response).await?.json().await.map_err(Into::into)
    }

    async fn image_tags(&self) -> Result<Vec<String>> {
        let value: serde_json::Value = self.get_json("/images/tags").await?;
        normalize_tags(&value)
            .ok_or_else(|| ApiError::InvalidResponse(format!("unrecognized tags shape: {}", value)))
    }

    async fn image_exists(&self, image: &str) -> Result<bool> {
        let request = self
            .http
            .get(self.url("/images/exists"))
            .query(&[("image", image)]);
        self.probe(request).await
    }

    async fn pull_image(&self, image: &str, progress: mpsc::UnboundedSender<f64>) -> Result<()> {
        debug!("Pulling image {}", image);
        let response = self
            .http
            .get(self.url("/images/pull"))
            .query(&[("image", image)])
            .send()
            .await?;
        let response = Self::check(response).await?;

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        while let Some(chunk) = body.next().await {
            let bytes = chunk?;
            for event in decoder.feed(&bytes) {
                let payload: serde_json::Value = match serde_json::from_str(&event.data) {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                if let Some(message) = payload.get("error").and_then(|e| e.as_str()) {
                    return Err(ApiError::Stream(message.to_string()));
                }
                if payload.get("status").and_then(|s| s.as_str()) == Some("completed") {
                    debug!("Pull of {} completed", image);
                    return Ok(());
                }
                if let Some(value) = payload.get("progress").and_then(|p| p.as_f64()) {
                    // Receiver gone means the pull was cancelled.
                    if progress.send(value).is_err() {
                        return Ok(());
                    }
                }
            }
        }

        Err(ApiError::Stream(
            "pull stream ended before completion".to_string(),
        ))
    }

    async fn create_folder(&self, input: &FolderInput) -> Result<Folder> {
        let response = self
            .http
            .post(self.url("/folders"))
            .timeout(self.timeout)
            .json(input)
            .send()
            .await?;
        Self::check(response).await?.json().await.map_err(Into::into)
    }

    async fn update_folder(&self, id: &str, input: &FolderInput) -> Result<Folder> {
        let response = self
            .http
            .put(self.url(&format!("/folders/{}", id)))
            .timeout(self.timeout)
            .json(input)
            .send()
            .await?;
        Self::check(response).await?.json().await.map_err(Into::into)
    }

    async fn delete_folder(&self, id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.url(&format!("/folders/{}", id)))
            .timeout(self.timeout)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// Accept the tag list in any of the shapes backends have shipped: a
/// bare array, `{"tags": [...]}`, or a map keyed by tag name.
fn normalize_tags(value: &serde_json::Value) -> Option<Vec<String>> {
    let from_array = |arr: &Vec<serde_json::Value>| {
        arr.iter()
            .filter_map(|t| t.as_str().map(String::from))
            .collect::<Vec<_>>()
    };

    match value {
        serde_json::Value::Array(arr) => Some(from_array(arr)),
        serde_json::Value::Object(map) => match map.get("tags") {
            Some(serde_json::Value::Array(arr)) => Some(from_array(arr)),
            Some(serde_json::Value::Object(tags)) => {
                Some(tags.keys().cloned().collect())
            }
            _ => Some(map.keys().cloned().collect()),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_bad_url() {
        assert!(HttpApi::new("not a url", Duration::from_secs(30)).is_err());
        assert!(HttpApi::new("ftp://host", Duration::from_secs(30)).is_err());
        assert!(HttpApi::new("http://localhost:5172", Duration::from_secs(30)).is_ok());
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let api = HttpApi::new("http://localhost:5172/", Duration::from_secs(30)).unwrap();
        assert_eq!(api.url("/environments"), "http://localhost:5172/environments");
    }

    #[test]
    fn test_normalize_tags_shapes() {
        let arr = serde_json::json!(["v0.3.1", "latest"]);
        assert_eq!(
            normalize_tags(&arr),
            Some(vec!["v0.3.1".to_string(), "latest".to_string()])
        );

        let wrapped = serde_json::json!({"tags": ["v0.3.1"]});
        assert_eq!(normalize_tags(&wrapped), Some(vec!["v0.3.1".to_string()]));

        let map = serde_json::json!({"tags": {"v0.2.0": "sha256:aa", "v0.3.1": "sha256:bb"}});
        let tags = normalize_tags(&map).unwrap();
        assert!(tags.contains(&"v0.2.0".to_string()));
        assert!(tags.contains(&"v0.3.1".to_string()));

        assert_eq!(normalize_tags(&serde_json::json!(42)), None);
    }
}
