use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{lines, ChatBackend, FragmentStream};
use crate::config::{CloudConfig, DEFAULT_REQUEST_TIMEOUT_MS};
use crate::error::{ProviderError, Result};
use crate::provider::ProviderKind;
use crate::state::ChatMessage;

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
}

#[derive(Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

/// One server-sent event line, decoded.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Content(String),
    Done,
    /// Comments, keep-alives and chunks without text.
    Skip,
}

#[derive(Clone)]
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    base_url: String,
    request_timeout: Duration,
}

impl OpenAIClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }

    /// Bounds each request, streamed body included.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let request = OpenAIRequest {
            model,
            messages,
            max_tokens,
            temperature,
            stream: false,
        };

        let response = self.send(&request).await?;
        let text = response.text().await?;
        let openai_response: OpenAIResponse = serde_json::from_str(&text)?;

        openai_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::Malformed("no choices in completion".to_string()))
    }

    pub fn chat_stream<'a>(
        &'a self,
        model: &'a str,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        temperature: f32,
    ) -> FragmentStream<'a> {
        async_stream::stream! {
            let request = OpenAIRequest {
                model,
                messages: &messages,
                max_tokens,
                temperature,
                stream: true,
            };

            match self.send(&request).await {
                Ok(response) => {
                    let mut body = Box::pin(lines::lines(response));
                    while let Some(line) = body.next().await {
                        match line.and_then(|line| parse_event(&line)) {
                            Ok(SseEvent::Content(text)) => {
                                yield Ok(text);
                            }
                            Ok(SseEvent::Done) => break,
                            Ok(SseEvent::Skip) => {}
                            Err(e) => {
                                yield Err(e);
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(e);
                }
            }
        }
        .boxed()
    }

    async fn send(&self, request: &OpenAIRequest<'_>) -> Result<reqwest::Response> {
        let response = self.client
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(self.request_timeout)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        Ok(response)
    }

    pub fn list_models() -> Vec<String> {
        vec![
            "gpt-4o".to_string(),
            "gpt-4o-mini".to_string(),
            "gpt-4-turbo".to_string(),
            "gpt-4".to_string(),
            "gpt-3.5-turbo".to_string(),
        ]
    }
}

fn parse_event(line: &str) -> Result<SseEvent> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }

    let chunk: OpenAIStreamChunk = serde_json::from_str(data).map_err(|e| {
        tracing::warn!("failed to parse chunk: {e}, data: {data}");
        ProviderError::Malformed(e.to_string())
    })?;

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|text| !text.is_empty())
        .map(SseEvent::Content)
        .unwrap_or(SseEvent::Skip))
}

/// Cloud backend answering through an OpenAI-compatible chat completions API.
pub struct OpenAIBackend {
    client: OpenAIClient,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIBackend {
    /// Fails when no usable API key is configured.
    pub fn new(config: &CloudConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(ProviderError::Config(
                "OpenAI API key is not set; add it to the settings file or OPENAI_API_KEY".to_string(),
            ));
        }
        if config.model.trim().is_empty() {
            return Err(ProviderError::Config("cloud model is empty".to_string()));
        }

        Ok(Self {
            client: OpenAIClient::new(config.api_key.trim(), &config.endpoint)
                .with_request_timeout(config.request_timeout()),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ChatBackend for OpenAIBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cloud
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.client
            .chat(&self.model, messages, self.max_tokens, self.temperature)
            .await
    }

    fn complete_stream<'a>(&'a self, messages: Vec<ChatMessage>) -> FragmentStream<'a> {
        self.client
            .chat_stream(&self.model, messages, self.max_tokens, self.temperature)
    }
}
