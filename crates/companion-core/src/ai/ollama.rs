use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{lines, ChatBackend, FragmentStream};
use crate::config::{LocalConfig, DEFAULT_REQUEST_TIMEOUT_MS};
use crate::error::{ProviderError, Result};
use crate::provider::ProviderKind;
use crate::state::ChatMessage;

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Deserialize)]
struct OllamaChatMessage {
    #[serde(default)]
    content: String,
}

/// One response object; streaming sends one per line.
#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaChatMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaModel {
    name: String,
}

#[derive(Deserialize)]
struct OllamaModelsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

/// HTTP client for a local Ollama server.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }

    /// Bounds each chat request, streamed body included.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Liveness check against the control endpoint. Never fails: anything but
    /// a success status within `timeout` counts as unavailable.
    pub async fn is_available(&self, timeout: Duration) -> bool {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).timeout(timeout).send().await {
            Ok(response) => {
                tracing::debug!(endpoint = %self.base_url, status = %response.status(), "ollama reachable");
                response.status().is_success()
            }
            Err(e) => {
                tracing::debug!(endpoint = %self.base_url, "ollama unreachable: {e}");
                false
            }
        }
    }

    pub async fn list_models(&self, timeout: Duration) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self.client.get(&url).timeout(timeout).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }

        let text = response.text().await?;
        let models_response: OllamaModelsResponse = serde_json::from_str(&text)?;
        let model_names: Vec<String> = models_response
            .models
            .into_iter()
            .map(|model| model.name)
            .collect();

        Ok(model_names)
    }

    pub async fn has_model(&self, name: &str, timeout: Duration) -> Result<bool> {
        let models = self.list_models(timeout).await?;
        tracing::debug!(wanted = name, available = models.len(), "checking ollama catalog");
        Ok(models.iter().any(|m| model_matches(m, name)))
    }

    pub async fn chat(&self, model: &str, messages: &[ChatMessage], max_tokens: u32) -> Result<String> {
        let response = self.send_chat(model, messages, max_tokens, false).await?;
        let text = response.text().await?;
        let chat: OllamaChatResponse = serde_json::from_str(&text)?;

        if let Some(error) = chat.error {
            return Err(ProviderError::Api { status: 200, body: error });
        }
        chat.message
            .map(|m| m.content)
            .ok_or_else(|| ProviderError::Malformed("missing message in ollama response".to_string()))
    }

    pub fn chat_stream<'a>(
        &'a self,
        model: &'a str,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
    ) -> FragmentStream<'a> {
        async_stream::stream! {
            match self.send_chat(model, &messages, max_tokens, true).await {
                Ok(response) => {
                    let mut body = Box::pin(lines::lines(response));
                    while let Some(line) = body.next().await {
                        match line.and_then(|line| parse_chunk(&line)) {
                            Ok(chunk) => {
                                if let Some(error) = chunk.error {
                                    yield Err(ProviderError::Api { status: 200, body: error });
                                    break;
                                }
                                if let Some(message) = chunk.message {
                                    yield Ok(message.content);
                                }
                                if chunk.done {
                                    break;
                                }
                            }
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

    async fn send_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);

        let request = OllamaChatRequest {
            model,
            messages,
            stream,
            options: OllamaOptions { num_predict: max_tokens },
        };

        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status,
                body: format!("{body} (make sure Ollama is running with: ollama serve)"),
            });
        }

        Ok(response)
    }
}

fn parse_chunk(line: &str) -> Result<OllamaChatResponse> {
    serde_json::from_str(line).map_err(|e| {
        tracing::warn!("failed to parse ollama chunk: {e}, data: {line}");
        ProviderError::Malformed(e.to_string())
    })
}

/// Catalog names carry a tag (`phi3:mini`); a bare name matches any tag.
pub fn model_matches(available: &str, wanted: &str) -> bool {
    let available = available.to_lowercase();
    let wanted = wanted.to_lowercase();
    available == wanted || available.starts_with(&format!("{wanted}:"))
}

/// Local backend answering through Ollama's chat endpoint.
pub struct OllamaBackend {
    client: OllamaClient,
    model: String,
    max_tokens: u32,
}

impl OllamaBackend {
    pub fn new(client: OllamaClient, model: &str, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.to_string(),
            max_tokens,
        }
    }

    pub fn from_config(config: &LocalConfig) -> Self {
        let client = OllamaClient::new(&config.endpoint).with_request_timeout(config.request_timeout());
        Self::new(client, &config.model, config.max_tokens)
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.client.chat(&self.model, messages, self.max_tokens).await
    }

    fn complete_stream<'a>(&'a self, messages: Vec<ChatMessage>) -> FragmentStream<'a> {
        self.client.chat_stream(&self.model, messages, self.max_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_matches_exact_and_tagged() {
        assert!(model_matches("phi3:mini", "phi3:mini"));
        assert!(model_matches("phi3:mini", "PHI3"));
        assert!(model_matches("llama3.2:latest", "llama3.2"));
        assert!(!model_matches("phi3:mini", "phi"));
        assert!(!model_matches("llama3.2:latest", "llama3"));
    }

    #[test]
    fn test_request_serializes_history() {
        let messages = vec![ChatMessage::system("S"), ChatMessage::user("hi")];
        let request = OllamaChatRequest {
            model: "phi3:mini",
            messages: &messages,
            stream: true,
            options: OllamaOptions { num_predict: 500 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["options"]["num_predict"], 500);
    }

    #[test]
    fn test_parse_stream_chunks() {
        let chunk = parse_chunk(r#"{"message":{"role":"assistant","content":"Hel"},"done":false}"#)
            .unwrap();
        assert_eq!(chunk.message.unwrap().content, "Hel");
        assert!(!chunk.done);

        let last = parse_chunk(r#"{"done":true,"total_duration":123}"#).unwrap();
        assert!(last.done);
        assert!(last.message.is_none());

        assert!(parse_chunk("not json").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable_every_time() {
        let client = OllamaClient::new("http://127.0.0.1:1");
        for _ in 0..2 {
            assert!(!client.is_available(Duration::from_millis(500)).await);
        }
        assert!(client.has_model("phi3", Duration::from_millis(500)).await.is_err());
    }
}
