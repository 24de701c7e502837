//! Minimal client for Gradio apps hosted as Hugging Face Spaces.
//!
//! A prediction is a two step exchange: `POST <prefix>/call/<api>` queues the
//! job and returns an `event_id`, then `GET <prefix>/call/<api>/<event_id>`
//! streams server-sent events until a `complete` or `error` event arrives.

use reqwest::{Client, RequestBuilder, multipart};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::{Duration, timeout};

use crate::error::AppError;

const HF_SPACES_API: &str = "https://huggingface.co/api/spaces";
const DEFAULT_TIMEOUT_MS: u64 = 5 * 60 * 1_000;
const CONNECT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Deserialize)]
struct SpaceHost {
    host: Option<String>,
    subdomain: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppConfigPayload {
    api_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueuedCall {
    event_id: Option<String>,
}

/// One parsed server-sent event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

pub struct GradioClient {
    client: Client,
    space: String,
    root: String,
    api_prefix: String,
    hf_token: Option<String>,
}

impl GradioClient {
    pub async fn connect(space: &str, hf_token: Option<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS))
            .build()
            .map_err(|err| AppError::Internal(format!("build http client failed: {err}")))?;

        if hf_token.is_some() {
            tracing::info!(space = %space, "connecting to Space with Hugging Face token");
        } else {
            tracing::warn!(space = %space, "no Hugging Face token; using anonymous access with limited quota");
        }

        let root = match literal_root(space) {
            Some(root) => root,
            None => resolve_space_host(&client, space, hf_token.as_deref()).await?,
        };
        let api_prefix = fetch_api_prefix(&client, &root, hf_token.as_deref()).await;
        tracing::info!(space = %space, root = %root, api_prefix = %api_prefix, "connected to Space");

        Ok(Self::with_root(client, space, root, api_prefix, hf_token))
    }

    /// A client for a known root URL, skipping host and config discovery.
    pub fn with_root(
        client: Client,
        space: &str,
        root: String,
        api_prefix: String,
        hf_token: Option<String>,
    ) -> Self {
        Self {
            client,
            space: space.to_string(),
            root: root.trim_end_matches('/').to_string(),
            api_prefix,
            hf_token,
        }
    }

    pub fn space(&self) -> &str {
        &self.space
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.root, self.api_prefix, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        // An empty bearer value is an illegal header, so anonymous calls send none.
        match self.hf_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Uploads a file to the Space and returns its server-side path.
    pub async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, AppError> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("image/png")
            .map_err(|err| AppError::Internal(format!("multipart error: {err}")))?;
        let form = multipart::Form::new().part("files", part);

        let response = self
            .authorize(self.client.post(self.endpoint("/upload")))
            .multipart(form)
            .send()
            .await
            .map_err(|err| self.upstream("upload failed", err))?;
        let response = assert_ok_response(&self.space, response).await?;
        let paths: Vec<String> = response
            .json()
            .await
            .map_err(|err| self.upstream("invalid upload response", err))?;
        paths
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Upstream(format!("{} returned no upload path", self.space)))
    }

    /// Runs `api_name` with positional `data` and returns the output array.
    pub async fn predict(&self, api_name: &str, data: Vec<Value>) -> Result<Vec<Value>, AppError> {
        let api_name = api_name.trim_start_matches('/');
        let response = self
            .authorize(self.client.post(self.endpoint(&format!("/call/{api_name}"))))
            .json(&json!({ "data": data }))
            .send()
            .await
            .map_err(|err| self.upstream("queueing prediction failed", err))?;
        let response = assert_ok_response(&self.space, response).await?;
        let queued: QueuedCall = response
            .json()
            .await
            .map_err(|err| self.upstream("invalid queue response", err))?;
        let event_id = queued
            .event_id
            .ok_or_else(|| AppError::Upstream(format!("{} returned no event_id", self.space)))?;
        tracing::info!(space = %self.space, api = %api_name, event_id = %event_id, "prediction queued");

        let stream_url = self.endpoint(&format!("/call/{api_name}/{event_id}"));
        let body = timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS), async {
            let response = self
                .authorize(self.client.get(&stream_url))
                .send()
                .await
                .map_err(|err| self.upstream("reading prediction stream failed", err))?;
            let response = assert_ok_response(&self.space, response).await?;
            response
                .text()
                .await
                .map_err(|err| self.upstream("reading prediction stream failed", err))
        })
        .await
        .map_err(|_| {
            AppError::Upstream(format!(
                "{} prediction timed out (event_id={event_id})",
                self.space
            ))
        })??;

        let outputs = completed_outputs(&self.space, &parse_sse(&body))?;
        tracing::info!(space = %self.space, api = %api_name, outputs = outputs.len(), "prediction completed");
        Ok(outputs)
    }

    /// Fetches the bytes of a FileData value returned by [`predict`](Self::predict).
    pub async fn download(&self, file_data: &Value) -> Result<Vec<u8>, AppError> {
        let url = self.file_url(file_data).ok_or_else(|| {
            AppError::Upstream(format!("{} returned no result file", self.space))
        })?;
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|err| self.upstream("downloading result failed", err))?;
        let response = assert_ok_response(&self.space, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|err| self.upstream("downloading result failed", err))?;
        Ok(bytes.to_vec())
    }

    pub fn file_url(&self, file_data: &Value) -> Option<String> {
        // Some apps return a bare path string, newer ones a FileData object.
        if let Some(path) = file_data.as_str() {
            return Some(self.endpoint(&format!("/file={path}")));
        }
        if let Some(url) = file_data.get("url").and_then(Value::as_str) {
            if !url.is_empty() {
                return Some(url.to_string());
            }
        }
        file_data
            .get("path")
            .and_then(Value::as_str)
            .map(|path| self.endpoint(&format!("/file={path}")))
    }

    fn upstream(&self, context: &str, err: reqwest::Error) -> AppError {
        AppError::Upstream(format!("{} {context}: {err}", self.space))
    }
}

/// Input reference for a file previously sent with [`GradioClient::upload_file`].
pub fn file_data(path: &str) -> Value {
    json!({
        "path": path,
        "meta": { "_type": "gradio.FileData" },
    })
}

fn literal_root(space: &str) -> Option<String> {
    let trimmed = space.trim();
    (trimmed.starts_with("http://") || trimmed.starts_with("https://"))
        .then(|| trimmed.trim_end_matches('/').to_string())
}

/// `owner/name` → `owner-name` with the characters hf.space subdomains drop.
pub fn space_subdomain(space: &str) -> String {
    space
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

async fn resolve_space_host(
    client: &Client,
    space: &str,
    hf_token: Option<&str>,
) -> Result<String, AppError> {
    let mut request = client.get(format!("{HF_SPACES_API}/{space}/host"));
    if let Some(token) = hf_token {
        request = request.bearer_auth(token);
    }
    let fallback = format!("https://{}.hf.space", space_subdomain(space));
    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(space = %space, error = %err, "Space host lookup failed, using default host");
            return Ok(fallback);
        }
    };
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(AppError::Upstream(format!("Space {space} not found")));
    }
    let response = assert_ok_response(space, response).await?;
    let host: SpaceHost = response
        .json()
        .await
        .map_err(|err| AppError::Upstream(format!("{space} invalid host response: {err}")))?;
    Ok(match (host.host, host.subdomain) {
        (Some(host), _) if !host.is_empty() => host.trim_end_matches('/').to_string(),
        (_, Some(subdomain)) if !subdomain.is_empty() => format!("https://{subdomain}.hf.space"),
        _ => fallback,
    })
}

async fn fetch_api_prefix(client: &Client, root: &str, hf_token: Option<&str>) -> String {
    let mut request = client.get(format!("{root}/config"));
    if let Some(token) = hf_token {
        request = request.bearer_auth(token);
    }
    let payload = match request.send().await {
        Ok(response) if response.status().is_success() => {
            response.json::<AppConfigPayload>().await.ok()
        }
        Ok(response) => {
            tracing::warn!(root = %root, status = %response.status(), "Space config unavailable");
            None
        }
        Err(err) => {
            tracing::warn!(root = %root, error = %err, "Space config unavailable");
            None
        }
    };
    payload
        .and_then(|config| config.api_prefix)
        .map(|prefix| prefix.trim_end_matches('/').to_string())
        .unwrap_or_default()
}

async fn assert_ok_response(
    space: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, AppError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    Err(AppError::Upstream(format!("{space} request failed: {status} {text}")))
}

pub fn parse_sse(body: &str) -> Vec<SseEvent> {
    let mut events = Vec::new();
    let mut event = String::new();
    let mut data: Vec<&str> = Vec::new();

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            if !event.is_empty() || !data.is_empty() {
                events.push(SseEvent {
                    event: std::mem::take(&mut event),
                    data: data.join("\n"),
                });
                data.clear();
            }
            continue;
        }
        if let Some(value) = line.strip_prefix("event:") {
            event = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.trim_start());
        }
    }
    if !event.is_empty() || !data.is_empty() {
        events.push(SseEvent {
            event,
            data: data.join("\n"),
        });
    }
    events
}

pub fn completed_outputs(space: &str, events: &[SseEvent]) -> Result<Vec<Value>, AppError> {
    for event in events {
        match event.event.as_str() {
            "complete" => {
                return serde_json::from_str::<Vec<Value>>(&event.data).map_err(|err| {
                    AppError::Upstream(format!("{space} returned malformed outputs: {err}"))
                });
            }
            "error" => {
                let message = match event.data.trim() {
                    "" | "null" => "unknown error".to_string(),
                    other => other.trim_matches('"').to_string(),
                };
                return Err(AppError::Upstream(format!("{space} prediction failed: {message}")));
            }
            _ => {}
        }
    }
    Err(AppError::Upstream(format!(
        "{space} closed the stream without a result"
    )))
}
