//! Text generation client.

use crate::config::types::TextGenerationConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("text generation returned status {0}")]
    Status(u16),

    #[error("malformed text generation response: {0}")]
    MalformedBody(String),

    #[error("text generation API key is not configured")]
    MissingApiKey,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Single attempt, no retries.
    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, FetchError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    endpoint: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: &TextGenerationConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            client,
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, FetchError> {
        let body = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let text = response.text().await?;
        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| FetchError::MalformedBody(e.to_string()))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .and_then(|part| part.text)
            .ok_or_else(|| FetchError::MalformedBody("no candidate text".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Base URL of a local port with nothing listening on it.
    fn closed_port_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}", port)
    }

    fn test_client(server: &MockServer) -> GeminiClient {
        GeminiClient::new(&TextGenerationConfig {
            endpoint: format!("{}/v1beta/models/test:generateContent", server.uri()),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_extracts_first_candidate() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/test:generateContent"))
            .and(query_param("key", "secret"))
            .and(body_json(serde_json::json!({
                "contents": [{"parts": [{"text": "the prompt"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": " 250 TL\n"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = test_client(&server).generate("secret", "the prompt").await.unwrap();
        assert_eq!(text, " 250 TL\n");
    }

    #[tokio::test]
    async fn test_non_200_is_a_status_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = test_client(&server).generate("secret", "p").await;
        assert!(matches!(result, Err(FetchError::Status(429))));
    }

    #[tokio::test]
    async fn test_missing_candidates_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"promptFeedback": {"blockReason": "SAFETY"}})),
            )
            .mount(&server)
            .await;

        let result = test_client(&server).generate("secret", "p").await;
        assert!(matches!(result, Err(FetchError::MalformedBody(_))));
    }

    #[tokio::test]
    async fn test_non_json_body_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let result = test_client(&server).generate("secret", "p").await;
        assert!(matches!(result, Err(FetchError::MalformedBody(_))));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "candidates": [{"content": {"parts": [{"text": "250 TL"}]}}]
                    }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::new(&TextGenerationConfig {
            endpoint: format!("{}/v1beta/models/test:generateContent", server.uri()),
            timeout: Duration::from_millis(100),
        })
        .unwrap();

        let result = client.generate("secret", "p").await;
        match result {
            Err(FetchError::Http(e)) => assert!(e.is_timeout()),
            other => panic!("expected a timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refused_connection_is_http_error() {
        let client = GeminiClient::new(&TextGenerationConfig {
            endpoint: format!("{}/v1beta/models/test:generateContent", closed_port_url()),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let result = client.generate("secret", "p").await;
        assert!(matches!(result, Err(FetchError::Http(_))));
    }
}
