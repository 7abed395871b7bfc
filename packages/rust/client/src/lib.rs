//! Query client for OpenAI-compatible chat-completion services.
//!
//! The run pipeline only needs one thing from the upstream model: given a
//! prompt and a temperature, return the raw completion text. [`QueryClient`]
//! is that seam; [`OpenAiClient`] is the HTTP implementation.

use std::future::Future;
use std::time::Duration;

use brandlens_shared::{BrandLensError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

/// User-Agent string for upstream requests.
const USER_AGENT: &str = concat!("BrandLens/", env!("CARGO_PKG_VERSION"));

/// Maximum characters of an error body echoed into the error message.
const MAX_ERROR_BODY: usize = 300;

/// System prompt asking the model for a machine-readable answer.
const SYSTEM_PROMPT: &str = "You are a helpful assistant that recommends products and services. \
Respond with a single JSON object of the form \
{\"answer\": \"<your answer>\", \"sources\": [\"<url>\", ...]} \
where sources lists the URLs you relied on. Do not add any text outside the JSON object.";

// ---------------------------------------------------------------------------
// QueryClient
// ---------------------------------------------------------------------------

/// A generative-AI backend that turns one prompt into raw completion text.
pub trait QueryClient {
    /// Identifier of the model answering queries, recorded with each run.
    fn model_id(&self) -> &str;

    /// Issue one query. Transport, auth, and quota failures are returned as
    /// [`BrandLensError::Upstream`].
    fn query(&self, prompt: &str, temperature: f32)
    -> impl Future<Output = Result<String>> + Send;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// ---------------------------------------------------------------------------
// OpenAiClient
// ---------------------------------------------------------------------------

/// Settings for [`OpenAiClient`].
#[derive(Debug, Clone)]
pub struct OpenAiOptions {
    /// API base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: Url,
    /// Bearer token.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// [`QueryClient`] backed by `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    /// Build a client. Fails only if the HTTP stack cannot be initialized.
    pub fn new(opts: OpenAiOptions) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| BrandLensError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: chat_endpoint(&opts.base_url),
            api_key: opts.api_key,
            model: opts.model,
        })
    }
}

impl QueryClient for OpenAiClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model, temperature = temperature))]
    async fn query(&self, prompt: &str, temperature: f32) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| BrandLensError::Upstream(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(BrandLensError::Upstream(format!(
                "{}: HTTP {status}: {body}",
                self.endpoint
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            BrandLensError::Upstream(format!("{}: undecodable response: {e}", self.endpoint))
        })?;

        let choice = completion.choices.into_iter().next().ok_or_else(|| {
            BrandLensError::Upstream(format!("{}: response contained no choices", self.endpoint))
        })?;

        let text = choice.message.content.unwrap_or_default();
        debug!(chars = text.len(), "received completion");
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `{base}/chat/completions`, tolerating a trailing slash on the base.
fn chat_endpoint(base_url: &Url) -> String {
    format!("{}/chat/completions", base_url.as_str().trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(OpenAiOptions {
            base_url: Url::parse(&format!("{}/v1", server.uri())).unwrap(),
            api_key: "sk-test".into(),
            model: "test-model".into(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_chat_endpoint_trailing_slash() {
        let a = Url::parse("https://api.example.com/v1").unwrap();
        let b = Url::parse("https://api.example.com/v1/").unwrap();
        assert_eq!(chat_endpoint(&a), "https://api.example.com/v1/chat/completions");
        assert_eq!(chat_endpoint(&b), "https://api.example.com/v1/chat/completions");
    }

    #[tokio::test]
    async fn test_query_returns_message_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "temperature": 0.5,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "{\"answer\": \"Notion\"}"}}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.model_id(), "test-model");

        let text = client.query("best notes app?", 0.5).await.unwrap();
        assert_eq!(text, r#"{"answer": "Notion"}"#);
    }

    #[tokio::test]
    async fn test_query_null_content_is_empty_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let text = client_for(&server).query("hi", 0.0).await.unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_query_http_error_is_upstream() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let err = client_for(&server).query("hi", 0.7).await.unwrap_err();
        match err {
            BrandLensError::Upstream(msg) => {
                assert!(msg.contains("429"));
                assert!(msg.contains("quota exceeded"));
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_query_no_choices_is_upstream() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).query("hi", 0.7).await.unwrap_err();
        assert!(matches!(err, BrandLensError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_query_garbage_body_is_upstream() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).query("hi", 0.7).await.unwrap_err();
        assert!(err.to_string().contains("undecodable"));
    }
}
