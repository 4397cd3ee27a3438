//! OpenAI API Provider
//!
//! This module implements the LLMProvider trait for OpenAI-compatible
//! chat-completion endpoints.

use crate::config::LlmConfig;
use crate::error::{AgentError, Result};
use crate::llm::client::LLMHttpClient;
use crate::llm::provider::{GenerationParams, LLMProvider, LLMResponse, Message};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// OpenAI GPT API provider
pub struct OpenAIProvider {
    /// API key for authentication
    api_key: String,
    /// Model to use (e.g., "gpt-4o-mini")
    model: String,
    /// Chat-completions endpoint
    base_url: String,
    /// HTTP client for making requests
    client: LLMHttpClient,
}

impl fmt::Debug for OpenAIProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIProvider")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("client", &self.client)
            .finish()
    }
}

impl OpenAIProvider {
    /// Create a provider from the `LLM_*`/`OPENAI_*` settings
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            client: LLMHttpClient::with_timeout(config.timeout)?,
        })
    }

    /// Convert our Message format to OpenAI format
    fn convert_messages_to_openai(&self, messages: &[Message]) -> Vec<OpenAIMessage> {
        messages
            .iter()
            .map(|msg| OpenAIMessage {
                role: msg.role.as_str().to_string(),
                content: msg.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    /// Generate a response from the chat-completions API
    async fn generate(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<LLMResponse> {
        let request = OpenAIRequest {
            model: self.model.clone(),
            messages: self.convert_messages_to_openai(messages),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let headers = LLMHttpClient::build_headers(&self.api_key)?;
        let response_text = self
            .client
            .post_json(&self.base_url, headers, &request)
            .await?;

        let openai_response: OpenAIResponse = serde_json::from_str(&response_text)
            .map_err(|e| AgentError::Generation(format!("failed to parse response: {}", e)))?;

        let choice = openai_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Generation("response contained no choices".to_string()))?;

        debug!(
            model = %openai_response.model,
            finish_reason = ?choice.finish_reason,
            "completion received"
        );

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            input_tokens: openai_response.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: openai_response.usage.as_ref().map(|u| u.completion_tokens),
            model: Some(openai_response.model),
            finish_reason: choice.finish_reason,
        })
    }

    /// Get provider name
    fn provider_name(&self) -> &str {
        "OpenAI"
    }

    /// Check if API key is set
    fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// OpenAI API request format
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// OpenAI API message format
#[derive(Debug, Serialize, Clone)]
struct OpenAIMessage {
    role: String,
    content: String,
}

/// OpenAI API response format
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    model: String,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

/// Choice in OpenAI response
#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

/// Message in OpenAI response
#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Token usage information
#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one HTTP request with a canned response and hand back the request body
    async fn serve_once(status: &'static str, body: String) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            let header_end = loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let headers = String::from_utf8_lossy(&request[..header_end]).to_lowercase();
            let content_length: usize = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse().unwrap())
                .unwrap_or(0);
            while request.len() < header_end + content_length {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = tx.send(String::from_utf8_lossy(&request[header_end..]).to_string());
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        (url, rx)
    }

    fn test_config(base_url: String) -> LlmConfig {
        LlmConfig {
            api_key: "test-key".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_openai_provider_from_config() {
        let provider =
            OpenAIProvider::from_config(&test_config("http://localhost:8080/v1/chat/completions".to_string()))
                .unwrap();
        assert_eq!(provider.model, "gpt-4o-mini");
        assert_eq!(provider.base_url, "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn test_debug_masks_api_key() {
        let mut config = test_config("http://localhost:8080/v1/chat/completions".to_string());
        config.api_key = "sk-live-secret-123".to_string();
        let provider = OpenAIProvider::from_config(&config).unwrap();

        let debug = format!("{:?}", provider);
        assert!(!debug.contains("sk-live-secret-123"));
        assert!(debug.contains("***"));
        assert!(debug.contains("gpt-4o-mini"));
    }

    #[test]
    fn test_message_conversion() {
        let provider = OpenAIProvider::from_config(&test_config(String::new())).unwrap();

        let messages = vec![
            Message::system("you are a database expert"),
            Message::user("How many customers are there?"),
        ];

        let openai_messages = provider.convert_messages_to_openai(&messages);
        assert_eq!(openai_messages.len(), 2);
        assert_eq!(openai_messages[0].role, "system");
        assert_eq!(openai_messages[0].content, "you are a database expert");
        assert_eq!(openai_messages[1].role, "user");
    }

    #[test]
    fn test_has_api_key() {
        let mut config = test_config(String::new());
        let provider = OpenAIProvider::from_config(&config).unwrap();
        assert!(provider.has_api_key());
        assert!(provider.validate_config().is_ok());

        config.api_key = String::new();
        let provider = OpenAIProvider::from_config(&config).unwrap();
        assert!(!provider.has_api_key());
        assert!(provider.validate_config().is_err());
    }

    #[tokio::test]
    async fn test_generate_sends_params_and_reads_content() {
        let body = serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "SELECT COUNT(*) FROM customers" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 40, "completion_tokens": 8, "total_tokens": 48 }
        })
        .to_string();
        let (url, request_rx) = serve_once("200 OK", body).await;

        let provider = OpenAIProvider::from_config(&test_config(url)).unwrap();
        let params = GenerationParams::new().with_max_tokens(200).with_temperature(0.1);
        let response = provider
            .generate(&[Message::user("How many customers?")], &params)
            .await
            .unwrap();

        assert_eq!(response.content, "SELECT COUNT(*) FROM customers");
        assert_eq!(response.total_tokens(), Some(48));
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));

        let sent: serde_json::Value = serde_json::from_str(&request_rx.await.unwrap()).unwrap();
        assert_eq!(sent["model"], "gpt-4o-mini");
        assert_eq!(sent["max_tokens"], 200);
        assert_eq!(sent["messages"][0]["role"], "user");
        assert!((sent["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_generate_reports_http_errors() {
        let body = r#"{"error":{"message":"Incorrect API key provided"}}"#.to_string();
        let (url, _request_rx) = serve_once("401 Unauthorized", body).await;

        let provider = OpenAIProvider::from_config(&test_config(url)).unwrap();
        let err = provider
            .generate(&[Message::user("hi")], &GenerationParams::new())
            .await
            .unwrap_err();

        match err {
            AgentError::Generation(message) => {
                assert!(message.contains("401"));
                assert!(message.contains("Incorrect API key"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_choices() {
        let body = r#"{"model":"gpt-4o-mini","choices":[]}"#.to_string();
        let (url, _request_rx) = serve_once("200 OK", body).await;

        let provider = OpenAIProvider::from_config(&test_config(url)).unwrap();
        let err = provider
            .generate(&[Message::user("hi")], &GenerationParams::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Generation(_)));
    }
}
