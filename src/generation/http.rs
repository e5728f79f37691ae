//! Backend for a text-generation-inference style HTTP server.
//!
//! Sends `POST {endpoint}/generate` with
//! `{"inputs": ..., "parameters": {"max_new_tokens", "temperature", "do_sample", "return_full_text": false}}`
//! and reads `{"generated_text": ...}` back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{GenerationOptions, TextGenerator};
use crate::errors::GenerationError;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: GenerateParameters,
}

#[derive(Debug, Serialize)]
struct GenerateParameters {
    max_new_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    do_sample: bool,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    generated_text: String,
}

#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    api_token: Option<String>,
}

impl HttpGenerator {
    pub fn new(endpoint: &str, model: &str, timeout: Duration) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/generate", endpoint.trim_end_matches('/')),
            model: model.to_string(),
            api_token: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TextGenerator for HttpGenerator {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        // The server rejects a zero temperature; omit it and let greedy decoding apply.
        let temperature = (options.temperature > 0.0).then_some(options.temperature);
        let body = GenerateRequest {
            inputs: prompt,
            parameters: GenerateParameters {
                max_new_tokens: options.max_length,
                temperature,
                do_sample: options.do_sample,
                return_full_text: false,
            },
        };

        debug!(url = %self.url, model = %self.model, prompt_chars = prompt.chars().count(), "sending generate request");

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(ref token) = self.api_token {
            request = request.bearer_auth(token);
        }
        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = resp.json().await?;
        let text = parsed.generated_text.trim().to_string();
        if text.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(server: &MockServer) -> HttpGenerator {
        HttpGenerator::new(&server.uri(), "test-model", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_joins_endpoint() {
        let g = HttpGenerator::new("http://localhost:8080/", "m", Duration::from_secs(1)).unwrap();
        assert_eq!(g.url(), "http://localhost:8080/generate");
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(body_partial_json(serde_json::json!({
                "inputs": "Condense this.",
                "parameters": {"max_new_tokens": 512, "do_sample": true, "return_full_text": false}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "generated_text": "  Condensed.  "
            })))
            .mount(&server)
            .await;

        let out = generator(&server)
            .generate("Condense this.", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(out, "Condensed.");
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "generated_text": "ok"
            })))
            .mount(&server)
            .await;

        let out = generator(&server)
            .with_api_token(Some("secret".to_string()))
            .generate("hi", &GenerationOptions::default())
            .await
            .unwrap();
        assert_eq!(out, "ok");
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
            .mount(&server)
            .await;

        let err = generator(&server)
            .generate("hi", &GenerationOptions::default())
            .await
            .unwrap_err();
        match err {
            GenerationError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "model loading");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_completion_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "generated_text": ""
            })))
            .mount(&server)
            .await;

        let err = generator(&server)
            .generate("hi", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_connection_refused_is_http_error() {
        let g = HttpGenerator::new("http://127.0.0.1:1", "m", Duration::from_secs(2)).unwrap();
        let err = g
            .generate("hi", &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Http(_)));
    }
}
