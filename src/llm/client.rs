//! LLM HTTP Client
//!
//! A thin JSON-over-HTTP client for LLM APIs. Every request carries a timeout;
//! failed requests are reported, never retried.

use crate::error::{AgentError, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Longest slice of an error body kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 500;

/// HTTP client for LLM API requests
#[derive(Clone, Debug)]
pub struct LLMHttpClient {
    /// Reqwest HTTP client
    client: Client,
    /// Request timeout
    timeout: Duration,
}

impl LLMHttpClient {
    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    /// Make a POST request with a JSON body
    ///
    /// # Returns
    /// Response body as string
    pub async fn post_json<T: Serialize>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &T,
    ) -> Result<String> {
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Generation(format!(
                        "request timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    AgentError::Http(e)
                }
            })?;

        let status = response.status();
        debug!(%status, url, "LLM API responded");

        if status.is_success() {
            return Ok(response.text().await?);
        }

        let response_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        Err(AgentError::Generation(format!(
            "API returned {}: {}",
            status.as_u16(),
            truncate(&response_text, MAX_ERROR_BODY_CHARS)
        )))
    }

    /// Build standard headers for bearer-token APIs
    pub fn build_headers(api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| AgentError::Config("API key contains invalid characters".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        let client = LLMHttpClient::with_timeout(Duration::from_secs(5)).unwrap();
        let headers = LLMHttpClient::build_headers("test-key").unwrap();
        let result = client
            .post_json("http://127.0.0.1:9/v1/chat/completions", headers, &serde_json::json!({}))
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_headers_building() {
        let headers = LLMHttpClient::build_headers("test-key").unwrap();
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
        assert_eq!(headers.get("authorization").unwrap(), "Bearer test-key");
        assert!(headers.get("authorization").unwrap().is_sensitive());

        assert!(LLMHttpClient::build_headers("bad\nkey").is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
