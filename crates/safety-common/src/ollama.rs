use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone, Debug)]
pub struct OllamaClientConfig {
    pub base_url: String,
    pub model: String,
    pub default_timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_error_body_bytes: usize,
}

impl OllamaClientConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("OLLAMA_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());

        let model =
            std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.1:8b".to_string());

        let default_timeout = std::env::var("OLLAMA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(30));

        let max_retries = std::env::var("OLLAMA_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(2);

        let initial_backoff = std::env::var("OLLAMA_RETRY_INITIAL_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(200));

        let max_backoff = std::env::var("OLLAMA_RETRY_MAX_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or_else(|| Duration::from_millis(5_000));

        let max_error_body_bytes = std::env::var("OLLAMA_MAX_ERROR_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8 * 1024);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            default_timeout,
            max_retries,
            initial_backoff,
            max_backoff,
            max_error_body_bytes,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OllamaClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("ollama returned error: status={status} body={body}")]
    Upstream { status: StatusCode, body: String },

    #[error("streaming response ended without a final chunk")]
    StreamEnded,
}

impl OllamaClientError {
    /// Timeouts are surfaced distinctly so callers can label the degraded
    /// response accurately.
    pub fn is_timeout(&self) -> bool {
        matches!(self, OllamaClientError::Request(e) if e.is_timeout())
    }
}

#[derive(Clone)]
pub struct OllamaClient {
    config: OllamaClientConfig,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: OllamaClientConfig) -> Result<Self, OllamaClientError> {
        let http = reqwest::Client::builder()
            .user_agent("road-safety-mcp")
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &OllamaClientConfig {
        &self.config
    }

    /// GET /api/tags — the names of locally pulled models.
    pub async fn list_models(&self) -> Result<Vec<String>, OllamaClientError> {
        let url = format!("{}/api/tags", self.config.base_url);
        let tags: TagsResponse = self
            .request_with_retry(|| async {
                let resp = self
                    .http
                    .get(&url)
                    .timeout(self.config.default_timeout)
                    .send()
                    .await?;
                Self::parse_json_response(resp, self.config.max_error_body_bytes).await
            })
            .await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Whether the configured model is pulled on the Ollama host. Any
    /// transport failure reads as "not available".
    pub async fn is_model_available(&self) -> bool {
        match self.list_models().await {
            Ok(names) => {
                let want = self.config.model.to_ascii_lowercase();
                names.iter().any(|n| n.to_ascii_lowercase().contains(&want))
            }
            Err(e) => {
                warn!(error = %e, "ollama tags probe failed");
                false
            }
        }
    }

    /// POST /api/generate with `stream: false`. Returns the completed text.
    pub async fn generate(
        &self,
        request: GenerateRequest,
        timeout_override: Option<Duration>,
    ) -> Result<String, OllamaClientError> {
        let url = format!("{}/api/generate", self.config.base_url);
        let timeout = timeout_override.unwrap_or(self.config.default_timeout);
        let response: GenerateResponse = self
            .request_with_retry(|| {
                let mut req = request.clone();
                req.stream = Some(false);
                let url = url.clone();
                async move {
                    let resp = self
                        .http
                        .post(&url)
                        .timeout(timeout)
                        .json(&req)
                        .send()
                        .await?;
                    Self::parse_json_response(resp, self.config.max_error_body_bytes).await
                }
            })
            .await?;
        Ok(response.response)
    }

    /// POST /api/generate with `stream: true`, aggregating the NDJSON
    /// chunks into the final text. Ollama streams one JSON object per
    /// line; the last carries `done: true`.
    pub async fn generate_streaming_aggregate(
        &self,
        request: GenerateRequest,
        timeout_override: Option<Duration>,
    ) -> Result<String, OllamaClientError> {
        let url = format!("{}/api/generate", self.config.base_url);
        let timeout = timeout_override.unwrap_or(self.config.default_timeout);
        self.request_with_retry(|| {
            let mut req = request.clone();
            req.stream = Some(true);
            let url = url.clone();
            async move {
                let resp = self
                    .http
                    .post(&url)
                    .timeout(timeout)
                    .json(&req)
                    .send()
                    .await?;

                if !resp.status().is_success() {
                    return Err(Self::to_upstream_error(resp, self.config.max_error_body_bytes).await);
                }

                let mut stream = resp.bytes_stream();
                let mut buffer = String::new();
                let mut out = String::new();
                while let Some(next) = stream.next().await {
                    let chunk = next?;
                    buffer.push_str(&String::from_utf8_lossy(&chunk));
                    while let Some(idx) = buffer.find('\n') {
                        let line = buffer[..idx].trim().to_string();
                        buffer = buffer[idx + 1..].to_string();
                        if line.is_empty() {
                            continue;
                        }
                        let chunk: GenerateStreamChunk = serde_json::from_str(&line)?;
                        out.push_str(&chunk.response);
                        if chunk.done {
                            return Ok(out);
                        }
                    }
                }
                Err(OllamaClientError::StreamEnded)
            }
        })
        .await
    }

    async fn parse_json_response<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> Result<T, OllamaClientError> {
        if resp.status().is_success() {
            let json = resp.json::<T>().await?;
            return Ok(json);
        }
        Err(Self::to_upstream_error(resp, max_error_body_bytes).await)
    }

    async fn to_upstream_error(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> OllamaClientError {
        let status = resp.status();
        let body = read_limited_text(resp, max_error_body_bytes).await;
        OllamaClientError::Upstream { status, body }
    }

    async fn request_with_retry<T, Fut, F>(&self, mut f: F) -> Result<T, OllamaClientError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, OllamaClientError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let result = f().await;
            match result {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt > self.config.max_retries || !should_retry(&e) {
                        return Err(e);
                    }
                    let delay = backoff_delay(
                        self.config.initial_backoff,
                        self.config.max_backoff,
                        attempt - 1,
                    );
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "ollama request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

fn should_retry(err: &OllamaClientError) -> bool {
    match err {
        OllamaClientError::Request(e) => {
            e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
        }
        OllamaClientError::Upstream { status, .. } => {
            *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
        }
        OllamaClientError::InvalidJson(_) | OllamaClientError::StreamEnded => false,
    }
}

fn backoff_delay(initial: Duration, max: Duration, exponent: u32) -> Duration {
    let mult = 1u128.checked_shl(exponent).unwrap_or(u128::MAX);
    let base_ms = initial.as_millis().saturating_mul(mult);
    let capped_ms = std::cmp::min(base_ms, max.as_millis()) as u64;
    let jitter_cap = std::cmp::max(1, capped_ms / 4);
    let jitter_ms = pseudo_jitter_ms(jitter_cap);
    Duration::from_millis(capped_ms.saturating_add(jitter_ms))
}

fn pseudo_jitter_ms(max_inclusive: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let nanos = now.subsec_nanos() as u64;
    nanos % (max_inclusive + 1)
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read ollama error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl GenerateOptions {
    /// Low-temperature defaults used for standards-citing answers.
    pub fn deterministic() -> Self {
        Self {
            temperature: Some(0.1),
            top_p: Some(0.9),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct GenerateStreamChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}
