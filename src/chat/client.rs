//! `OpenAI`-compatible chat completion client (`OpenRouter` by default)

use super::error::ChatError;
use super::stream::StreamHandle;
use super::types::{ChatRequest, ConversationHistory};
use super::ChatBackend;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-r1-0528:free";

/// Connection parameters for [`OpenRouterClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub connect_timeout: Duration,
    /// Longest silence tolerated between body chunks
    pub read_timeout: Option<Duration>,
    /// Sent as `HTTP-Referer` for `OpenRouter` attribution
    pub app_url: Option<String>,
    /// Sent as `X-Title` for `OpenRouter` attribution
    pub app_title: Option<String>,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Some(Duration::from_secs(60)),
            app_url: None,
            app_title: None,
        }
    }
}

/// Chat completion client speaking the `OpenAI` wire format
pub struct OpenRouterClient {
    client: Client,
    endpoint: Url,
    config: ClientConfig,
}

impl OpenRouterClient {
    pub fn new(config: ClientConfig) -> Result<Self, ChatError> {
        if config.api_key.trim().is_empty() {
            return Err(ChatError::config("API token is empty"));
        }
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            ChatError::config(format!("Invalid endpoint {:?}: {e}", config.endpoint))
        })?;

        // No overall deadline: streams stay open as long as data keeps coming
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ChatError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    /// Open a streamed completion for `history`
    pub async fn begin(&self, history: &ConversationHistory) -> Result<StreamHandle, ChatError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: history.turns(),
            stream: true,
        };
        let response = self.send(&request).await?;

        let body = response
            .bytes_stream()
            .map_err(|e| ChatError::transport(format!("Stream interrupted: {e}")))
            .boxed();
        Ok(StreamHandle::new(body, self.config.read_timeout))
    }

    /// Request a complete, non-streamed answer for `history`
    pub async fn complete(&self, history: &ConversationHistory) -> Result<String, ChatError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: history.turns(),
            stream: false,
        };
        let response = self.send(&request).await?;

        let body = self
            .within_read_timeout("response body", response.text())
            .await?
            .map_err(|e| ChatError::transport(format!("Failed to read response: {e}")))?;

        let completion: CompletionResponse = serde_json::from_str(&body).map_err(|e| {
            ChatError::decode(format!("Failed to parse response: {e} - body: {body}"))
        })?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::decode("No choices in response"))?;
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response, ChatError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            model = %request.model,
            turns = request.messages.len(),
            stream = request.stream,
            "Sending chat completion request"
        );

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.config.api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(request);
        if request.stream {
            builder = builder.header(ACCEPT, "text/event-stream");
        }
        if let Some(url) = &self.config.app_url {
            builder = builder.header("HTTP-Referer", url);
        }
        if let Some(title) = &self.config.app_title {
            builder = builder.header("X-Title", title);
        }

        let response = self
            .within_read_timeout("response headers", builder.send())
            .await?
            .map_err(|e| {
                if e.is_timeout() {
                    ChatError::connection(format!("Connect timeout: {e}"))
                } else if e.is_connect() {
                    ChatError::connection(format!("Connection failed: {e}"))
                } else {
                    ChatError::connection(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // The status decides the error; a stalled body only loses the message
        let body = self
            .within_read_timeout("error body", response.text())
            .await
            .ok()
            .and_then(Result::ok)
            .unwrap_or_default();
        Err(status_error(status.as_u16(), &body))
    }

    /// Await `fut`, giving up after the configured read timeout
    async fn within_read_timeout<T>(
        &self,
        what: &str,
        fut: impl Future<Output = T>,
    ) -> Result<T, ChatError> {
        match self.config.read_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                ChatError::timeout(format!("No {what} within {}s", limit.as_secs_f32()))
            }),
            None => Ok(fut.await),
        }
    }
}

fn status_error(status: u16, body: &str) -> ChatError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map_or_else(|_| body.trim().to_string(), |resp| resp.error.message);
    match status {
        401 | 403 => ChatError::auth(format!("Authentication failed: {message}")).with_status(status),
        _ => ChatError::unexpected_status(status, format!("HTTP {status}: {message}")),
    }
}

#[async_trait]
impl ChatBackend for OpenRouterClient {
    async fn begin(&self, history: &ConversationHistory) -> Result<StreamHandle, ChatError> {
        OpenRouterClient::begin(self, history).await
    }

    async fn complete(&self, history: &ConversationHistory) -> Result<String, ChatError> {
        OpenRouterClient::complete(self, history).await
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
