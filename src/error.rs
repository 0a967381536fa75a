use std::path::PathBuf;

use thiserror::Error;

/// Failures a pipeline stage can report.
///
/// An empty caption list and an absent summary are not errors; they are
/// ordinary outcomes and never surface through this type.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("unexpected upstream format: {0}")]
    UpstreamFormat(String),

    #[error("audio download failed for {video_id}: {reason}")]
    Download { video_id: String, reason: String },

    #[error("audio transcode failed for {input}: {reason}")]
    Transcode { input: PathBuf, reason: String },

    #[error("upload of {key} failed: {reason}")]
    Storage { key: String, reason: String },

    #[error("summary generation failed: {0}")]
    Generation(String),

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing API key: {env_var} environment variable is not set")]
    MissingApiKey { env_var: String },
}

impl PipelineError {
    pub(crate) fn network(url: &str, err: impl std::fmt::Display) -> Self {
        PipelineError::Network {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
