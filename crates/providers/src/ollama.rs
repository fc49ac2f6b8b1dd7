//! Ollama provider — talks to a local Ollama server.
//!
//! Uses the native `/api/chat` endpoint, which streams newline-delimited
//! JSON objects rather than SSE. `generate()` accumulates the stream into a
//! single string; `generate_stream()` forwards the deltas.

use async_trait::async_trait;
use futures::StreamExt;
use hearth_core::context::Context;
use hearth_core::error::ProviderError;
use hearth_core::provider::{Provider, StreamChunk};
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// A provider backed by a local Ollama server.
pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a new Ollama provider.
    ///
    /// Completion calls are long-running streams, so the client is built
    /// without a request timeout; backpressure is handled by the caller
    /// consuming the stream incrementally.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
        }
    }

    /// The model this provider sends requests to.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Same server, different model.
    pub fn with_model(&self, model: impl Into<String>) -> Self {
        Self {
            base_url: self.base_url.clone(),
            model: model.into(),
            client: self.client.clone(),
        }
    }

    fn chat_body(&self, context: &Context, stream: bool) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = context
            .formatted_messages()
            .into_iter()
            .map(|(role, content)| serde_json::json!({"role": role, "content": content}))
            .collect();

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
            "options": {
                "temperature": context.temperature,
                "num_predict": context.max_tokens,
            },
        })
    }

    async fn send_chat(
        &self,
        context: &Context,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);

        debug!(model = %self.model, stream, "Sending chat request to Ollama");

        let response = self
            .client
            .post(&url)
            .json(&self.chat_body(context, stream))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 404 {
            return Err(ProviderError::ModelNotFound(self.model.clone()));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Ollama returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

/// One NDJSON line from `/api/chat`.
#[derive(Debug, Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<ChatLineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatLineMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, context: &Context) -> Result<String, ProviderError> {
        // Stream and accumulate; Ollama's non-streaming mode buffers the
        // whole generation server-side and times out long completions.
        let response = self.send_chat(context, true).await?;

        let mut byte_stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut full_response = String::new();

        while let Some(chunk_result) = byte_stream.next().await {
            let bytes =
                chunk_result.map_err(|e| ProviderError::StreamInterrupted(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(line_end) = buffer.find('\n') {
                let line = buffer[..line_end].trim().to_string();
                buffer = buffer[line_end + 1..].to_string();
                if line.is_empty() {
                    continue;
                }

                match serde_json::from_str::<ChatLine>(&line) {
                    Ok(chat_line) => {
                        if let Some(error) = chat_line.error {
                            // In-band error token: treat as an error outcome.
                            return Err(ProviderError::ApiError {
                                status_code: 200,
                                message: error,
                            });
                        }
                        if let Some(message) = chat_line.message {
                            full_response.push_str(&message.content);
                        }
                        if chat_line.done {
                            return Ok(full_response);
                        }
                    }
                    Err(e) => {
                        trace!(line = %line, error = %e, "Ignoring unparseable NDJSON line");
                    }
                }
            }
        }

        // Stream ended without a `done` marker — return what we have.
        Ok(full_response)
    }

    async fn generate_stream(
        &self,
        context: &Context,
    ) -> Result<
        tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>,
        ProviderError,
    > {
        let response = self.send_chat(context, true).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(64);

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();
                    if line.is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<ChatLine>(&line) {
                        Ok(chat_line) => {
                            if let Some(error) = chat_line.error {
                                let _ = tx
                                    .send(Err(ProviderError::ApiError {
                                        status_code: 200,
                                        message: error,
                                    }))
                                    .await;
                                return;
                            }

                            let content = chat_line
                                .message
                                .map(|m| m.content)
                                .unwrap_or_default();
                            let done = chat_line.done;

                            if !content.is_empty() || done {
                                if tx.send(Ok(StreamChunk { content, done })).await.is_err() {
                                    return; // receiver dropped
                                }
                            }
                            if done {
                                return;
                            }
                        }
                        Err(e) => {
                            trace!(line = %line, error = %e, "Ignoring unparseable NDJSON line");
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Ok(Vec::new());
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let mut models: Vec<String> = body["models"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|m| m["name"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        models.sort();

        Ok(models)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::message::Role;

    #[test]
    fn base_url_trailing_slash_stripped() {
        let provider = OllamaProvider::new("http://localhost:11434/", "gemma3:12b");
        assert_eq!(provider.base_url, "http://localhost:11434");
    }

    #[test]
    fn chat_body_shape() {
        let provider = OllamaProvider::new("http://localhost:11434", "gemma3:12b");
        let mut ctx = Context::with_system("Be brief.");
        ctx.add_message(Role::User, "Hi");

        let body = provider.chat_body(&ctx, true);
        assert_eq!(body["model"], "gemma3:12b");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Be brief.");
        assert_eq!(body["messages"][1]["role"], "user");
        assert!((body["options"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn chat_line_parses_delta() {
        let line: ChatLine =
            serde_json::from_str(r#"{"message":{"content":"Hel"},"done":false}"#).unwrap();
        assert_eq!(line.message.unwrap().content, "Hel");
        assert!(!line.done);
    }

    #[test]
    fn chat_line_parses_error() {
        let line: ChatLine = serde_json::from_str(r#"{"error":"model not loaded"}"#).unwrap();
        assert_eq!(line.error.as_deref(), Some("model not loaded"));
    }

    #[test]
    fn with_model_keeps_server() {
        let provider = OllamaProvider::new("http://localhost:11434", "gemma3:12b");
        let other = provider.with_model("llama3:8b");
        assert_eq!(other.model(), "llama3:8b");
        assert_eq!(other.base_url, provider.base_url);
    }
}
