use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;

use crate::error::{PipelineError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "default";
pub const DEFAULT_TIMEZONE: &str = "GMT+00";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_API_BASE_URL";

const TRANSCRIPT_REPORT_TOOL: &str = "transcript_report";

/// Summary text, absent when the generation service returned no choices
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryResult {
    pub text: Option<String>,
}

impl SummaryResult {
    pub fn is_absent(&self) -> bool {
        self.text.is_none()
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, artifact_url: &str) -> Result<SummaryResult>;
}

/// Summarizes a published transcript through an OpenAI-compatible
/// chat-completions endpoint that exposes a `transcript_report` tool.
#[derive(Debug, Clone)]
pub struct ChatSummarizer {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timezone: String,
}

impl ChatSummarizer {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: Some(api_key.to_string()),
            model: DEFAULT_MODEL.to_string(),
            timezone: DEFAULT_TIMEZONE.to_string(),
        }
    }

    /// Key from `OPENAI_API_KEY`, base URL from `OPENAI_API_BASE_URL` or
    /// `base_url`. A missing key is reported when a summary is requested.
    pub fn from_env(client: reqwest::Client, base_url: &str) -> Self {
        let base_url = std::env::var(BASE_URL_ENV).unwrap_or_else(|_| base_url.to_string());
        Self {
            api_key: std::env::var(API_KEY_ENV).ok(),
            ..Self::new(client, &base_url, "")
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_timezone(mut self, timezone: &str) -> Self {
        self.timezone = timezone.to_string();
        self
    }

    fn request_body(&self, artifact_url: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "tools": [
                { "type": TRANSCRIPT_REPORT_TOOL }
            ],
            "stream": false,
            "messages": [],
            "metadata": {
                "transcript_path": artifact_url,
                "timezone": self.timezone
            }
        })
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, artifact_url: &str) -> Result<SummaryResult> {
        let api_key = self.api_key.as_deref().ok_or_else(|| PipelineError::MissingApiKey {
            env_var: API_KEY_ENV.to_string(),
        })?;
        let url = format!("{}/chat/completions", self.base_url);
        debug!("Requesting transcript report for {artifact_url} with model {}", self.model);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.request_body(artifact_url))
            .send()
            .await
            .map_err(|e| PipelineError::Generation(format!("request to {url} failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Generation(format!("generation API returned {status}: {body}")));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PipelineError::Generation(format!("invalid generation response: {e}")))?;

        let summary = extract_first_choice(&json);
        if summary.is_absent() {
            warn!("Generation service returned no choices for {artifact_url}");
        }
        Ok(summary)
    }
}

fn extract_first_choice(json: &serde_json::Value) -> SummaryResult {
    let text = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(str::to_string);
    SummaryResult { text }
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_extract_first_choice() {
        let json = serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "Summary of the video." } },
                { "message": { "role": "assistant", "content": "Second choice." } }
            ]
        });
        assert_eq!(extract_first_choice(&json).text.as_deref(), Some("Summary of the video."));
    }

    #[test]
    fn test_extract_first_choice_empty() {
        let json = serde_json::json!({"choices": []});
        assert!(extract_first_choice(&json).is_absent());
    }

    #[test]
    fn test_request_body_shape() {
        let s = ChatSummarizer::new(reqwest::Client::new(), "http://localhost", "k");
        let body = s.request_body("https://cdn.example.com/t.txt");
        assert_eq!(body["tools"][0]["type"], "transcript_report");
        assert_eq!(body["messages"], serde_json::json!([]));
        assert_eq!(body["stream"], false);
        assert_eq!(body["metadata"]["transcript_path"], "https://cdn.example.com/t.txt");
        assert_eq!(body["metadata"]["timezone"], "GMT+00");
    }

    #[tokio::test]
    async fn test_summarize_posts_transcript_report_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .and(body_json(serde_json::json!({
                "model": "default",
                "tools": [{ "type": "transcript_report" }],
                "stream": false,
                "messages": [],
                "metadata": { "transcript_path": "https://cdn/x.txt", "timezone": "GMT+00" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "Talk about Rust." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let s = ChatSummarizer::new(reqwest::Client::new(), &server.uri(), "test-key");
        let summary = s.summarize("https://cdn/x.txt").await.unwrap();
        assert_eq!(summary.text.as_deref(), Some("Talk about Rust."));
    }

    #[tokio::test]
    async fn test_summarize_zero_choices_is_absent_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .mount(&server)
            .await;

        let s = ChatSummarizer::new(reqwest::Client::new(), &server.uri(), "k");
        let summary = s.summarize("https://cdn/x.txt").await.unwrap();
        assert!(summary.is_absent());
    }

    #[tokio::test]
    async fn test_summarize_without_key_is_missing_api_key() {
        let s = ChatSummarizer {
            api_key: None,
            ..ChatSummarizer::new(reqwest::Client::new(), "http://127.0.0.1:9", "")
        };
        let err = s.summarize("https://cdn/x.txt").await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingApiKey { ref env_var } if env_var == "OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn test_summarize_http_failure_is_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let s = ChatSummarizer::new(reqwest::Client::new(), &server.uri(), "k");
        let err = s.summarize("https://cdn/x.txt").await.unwrap_err();
        assert!(matches!(err, PipelineError::Generation(_)));
    }
}
