use async_trait::async_trait;
use log::{debug, info};

use crate::error::{PipelineError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.deepgram.com";
pub const DEFAULT_MODEL: &str = "nova-2";
pub const API_KEY_ENV: &str = "DEEPGRAM_API_KEY";

/// Quality options sent with every transcription request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionOptions {
    pub model: String,
    pub smart_format: bool,
    pub summarize: bool,
    pub diarize: bool,
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            smart_format: true,
            summarize: true,
            diarize: true,
        }
    }
}

impl TranscriptionOptions {
    fn query(&self) -> [(&'static str, String); 4] {
        [
            ("model", self.model.clone()),
            ("smart_format", self.smart_format.to_string()),
            ("summarize", self.summarize.to_string()),
            ("diarize", self.diarize.to_string()),
        ]
    }
}

/// Speech-to-text over a remotely reachable audio file.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Returns the service's result verbatim.
    async fn transcribe_url(&self, audio_url: &str, options: &TranscriptionOptions) -> Result<serde_json::Value>;
}

/// Deepgram pre-recorded transcription (`POST /v1/listen`)
#[derive(Debug, Clone)]
pub struct DeepgramTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl DeepgramTranscriber {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: Some(api_key.to_string()),
        }
    }

    /// Key from `DEEPGRAM_API_KEY`; a missing key is reported on first use.
    pub fn from_env(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).ok(),
            ..Self::new(client, base_url, "")
        }
    }
}

#[async_trait]
impl Transcriber for DeepgramTranscriber {
    async fn transcribe_url(&self, audio_url: &str, options: &TranscriptionOptions) -> Result<serde_json::Value> {
        let api_key = self.api_key.as_deref().ok_or_else(|| PipelineError::MissingApiKey {
            env_var: API_KEY_ENV.to_string(),
        })?;
        let url = format!("{}/v1/listen", self.base_url);
        debug!("Transcribing {audio_url} with model {}", options.model);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {api_key}"))
            .query(&options.query())
            .json(&serde_json::json!({ "url": audio_url }))
            .send()
            .await
            .map_err(|e| PipelineError::Transcription(format!("request to {url} failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Transcription(format!(
                "transcription API returned {status}: {body}"
            )));
        }

        let result: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PipelineError::Transcription(format!("invalid transcription response: {e}")))?;
        info!("Transcription finished for {audio_url}");
        Ok(result)
    }
}

/// First channel's best transcript, for display
pub fn transcript_text(result: &serde_json::Value) -> Option<&str> {
    result
        .pointer("/results/channels/0/alternatives/0/transcript")
        .and_then(|t| t.as_str())
}

/// Service-side summary, present when `summarize` was requested
pub fn summary_text(result: &serde_json::Value) -> Option<&str> {
    result
        .pointer("/results/summary/short")
        .and_then(|t| t.as_str())
}
