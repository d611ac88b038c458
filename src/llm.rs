//! Generative-AI HTTP client.
//!
//! One trait for the three AI consumers (classifier, field extractor,
//! vision extraction strategy); production talks to an Ollama-compatible
//! endpoint, tests use `MockLlmClient`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Cannot connect to AI endpoint at {0}")]
    Connection(String),

    #[error("AI HTTP client error: {0}")]
    HttpClient(String),

    #[error("AI endpoint error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse AI endpoint response: {0}")]
    ResponseParsing(String),
}

/// One model completion, with token counts for cost accounting.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl LlmResponse {
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Generative-AI abstraction. One call per operation, no retries; failures
/// surface to the caller as-is.
pub trait LlmClient: Send + Sync {
    fn generate(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError>;

    /// Vision call: prompt plus base64-encoded page images.
    fn generate_with_images(
        &self,
        prompt: &str,
        images_base64: &[String],
    ) -> Result<LlmResponse, LlmError>;
}

/// HTTP client for an Ollama-compatible generation endpoint.
pub struct HttpLlmClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpLlmClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }

    fn post_generate(&self, body: &GenerateRequest<'_>) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self.client.post(&url).json(body).send().map_err(|e| {
            if e.is_connect() {
                LlmError::Connection(self.base_url.clone())
            } else if e.is_timeout() {
                LlmError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                LlmError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        Ok(LlmResponse {
            text: parsed.response,
            prompt_tokens: parsed.prompt_eval_count.unwrap_or(0),
            completion_tokens: parsed.eval_count.unwrap_or(0),
        })
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<&'a [String]>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    prompt_eval_count: Option<u64>,
    eval_count: Option<u64>,
}

impl LlmClient for HttpLlmClient {
    fn generate(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        self.post_generate(&GenerateRequest {
            model: &self.model,
            prompt,
            system,
            stream: false,
            images: None,
        })
    }

    fn generate_with_images(
        &self,
        prompt: &str,
        images_base64: &[String],
    ) -> Result<LlmResponse, LlmError> {
        self.post_generate(&GenerateRequest {
            model: &self.model,
            prompt,
            system: "",
            stream: false,
            images: Some(images_base64),
        })
    }
}

/// Mock LLM client for tests — queued responses plus a call counter so
/// tests can assert an operation made (or avoided) AI calls.
pub struct MockLlmClient {
    responses: Mutex<Vec<String>>,
    calls: AtomicUsize,
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            responses: Mutex::new(vec![response.to_string()]),
            calls: AtomicUsize::new(0),
            prompt_tokens: 120,
            completion_tokens: 40,
        }
    }

    /// Queue several responses, consumed in order; the last one repeats.
    pub fn with_responses(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            calls: AtomicUsize::new(0),
            prompt_tokens: 120,
            completion_tokens: 40,
        }
    }

    pub fn with_token_counts(mut self, prompt: u64, completion: u64) -> Self {
        self.prompt_tokens = prompt;
        self.completion_tokens = completion;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> LlmResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        let text = if responses.len() > 1 {
            responses.remove(0)
        } else {
            responses.first().cloned().unwrap_or_default()
        };
        LlmResponse {
            text,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
        }
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, _prompt: &str, _system: &str) -> Result<LlmResponse, LlmError> {
        Ok(self.next_response())
    }

    fn generate_with_images(
        &self,
        _prompt: &str,
        _images_base64: &[String],
    ) -> Result<LlmResponse, LlmError> {
        Ok(self.next_response())
    }
}

/// Mock that always fails — for surfacing-error tests.
pub struct FailingLlmClient;

impl LlmClient for FailingLlmClient {
    fn generate(&self, _prompt: &str, _system: &str) -> Result<LlmResponse, LlmError> {
        Err(LlmError::Connection("http://localhost:11434".into()))
    }

    fn generate_with_images(
        &self,
        _prompt: &str,
        _images_base64: &[String],
    ) -> Result<LlmResponse, LlmError> {
        Err(LlmError::Connection("http://localhost:11434".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_counts_calls() {
        let mock = MockLlmClient::new("hola");
        assert_eq!(mock.call_count(), 0);
        mock.generate("p", "s").unwrap();
        mock.generate_with_images("p", &[]).unwrap();
        assert_eq!(mock.call_count(), 2);
    }

    #[test]
    fn mock_queued_responses_consumed_in_order() {
        let mock = MockLlmClient::with_responses(&["first", "second"]);
        assert_eq!(mock.generate("p", "").unwrap().text, "first");
        assert_eq!(mock.generate("p", "").unwrap().text, "second");
        // Last response repeats
        assert_eq!(mock.generate("p", "").unwrap().text, "second");
    }

    #[test]
    fn response_totals_tokens() {
        let mock = MockLlmClient::new("x").with_token_counts(100, 25);
        let resp = mock.generate("p", "").unwrap();
        assert_eq!(resp.total_tokens(), 125);
    }

    #[test]
    fn generate_request_skips_empty_optionals() {
        let req = GenerateRequest {
            model: "llama3.2",
            prompt: "p",
            system: "",
            stream: false,
            images: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("system"));
        assert!(!json.contains("images"));
    }
}
