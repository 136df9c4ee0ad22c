//! Client for the remote prompt generation service.
//!
//! The service itself is an external collaborator; this module only knows
//! its HTTP surface (`/generate`, `/analyze`, `/`) and how to turn its
//! failures into a message fit for the user.

pub mod models;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use self::models::{AnalyzeResponse, ErrorBody, GenerateRequest, GenerationResult};

/// Shown when the service gave us nothing better to say.
pub const CONNECTIVITY_MESSAGE: &str =
    "Failed to reach the generation service. Make sure the backend is running.";

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Connection refused, DNS failure, timeout, etc.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("service returned {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Remote {
        status: StatusCode,
        detail: Option<String>,
    },

    /// A 2xx response whose body did not match the expected schema.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ServiceError {
    /// Message for the user: the server's `detail` verbatim when it sent
    /// one, otherwise a generic connectivity hint.
    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Remote {
                detail: Some(detail),
                ..
            } => detail.clone(),
            _ => CONNECTIVITY_MESSAGE.to_string(),
        }
    }
}

/// Anything that can turn a prompt into a structured result.
#[async_trait]
pub trait PromptService: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<GenerationResult, ServiceError>;
}

/// `reqwest`-backed implementation talking to the FastAPI backend.
#[derive(Debug, Clone)]
pub struct HttpPromptService {
    client: Client,
    base_url: String,
}

impl HttpPromptService {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Score a prompt and get an optimized rewrite (`POST /analyze`).
    pub async fn analyze(&self, prompt: &str) -> Result<AnalyzeResponse, ServiceError> {
        self.post_json("/analyze", prompt).await
    }

    /// Hit the root route and return its welcome message.
    pub async fn ping(&self) -> Result<String, ServiceError> {
        let url = format!("{}/", self.base_url);
        let resp = self.client.get(&url).send().await?;
        let resp = check_status(resp).await?;
        let body: serde_json::Value = resp.json().await.map_err(|e| decode_error(&url, e))?;
        Ok(body
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("ok")
            .to_string())
    }

    async fn post_json<T>(&self, path: &str, prompt: &str) -> Result<T, ServiceError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, prompt_len = prompt.len(), "sending request");

        let resp = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                prompt: prompt.to_string(),
            })
            .send()
            .await?;

        let resp = check_status(resp).await?;
        resp.json::<T>().await.map_err(|e| decode_error(&url, e))
    }
}

#[async_trait]
impl PromptService for HttpPromptService {
    async fn generate(&self, prompt: &str) -> Result<GenerationResult, ServiceError> {
        self.post_json("/generate", prompt).await
    }
}

/// Pass 2xx responses through; turn anything else into `ServiceError::Remote`,
/// pulling `detail` out of the body when it is there.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message());
    warn!(%status, ?detail, "generation service returned an error");

    Err(ServiceError::Remote { status, detail })
}

fn decode_error(url: &str, e: reqwest::Error) -> ServiceError {
    if e.is_decode() {
        ServiceError::Decode(format!("{}: {}", url, e))
    } else {
        ServiceError::Transport(e)
    }
}
