use std::path::PathBuf;

use eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_REGION: &str = "us-east-1";

pub const BUCKET_ENV: &str = "S3_BUCKET";
pub const REGION_ENV: &str = "AWS_REGION";
pub const CDN_ENV: &str = "AWS_CDN";
pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY";
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_KEY";

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub default_lang: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub request_timeout_secs: Option<u64>,
    pub storage: StorageConfig,
    pub generation: GenerationConfig,
    pub transcription: TranscriptionConfig,
    pub audio: AudioConfig,
}

/// Where artifacts are published. A bucket plus AWS credentials selects S3
/// (at `endpoint` when set); a bucket and `endpoint` alone selects a plain
/// HTTP PUT store; otherwise artifacts are written under `local_dir`.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub public_base_url: Option<String>,
    pub local_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    pub yt_dlp: Option<String>,
    pub ffmpeg: Option<String>,
    pub work_dir: Option<PathBuf>,
}

impl Config {
    /// Load config from ~/.config/ytbrief/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }

    /// Apply `S3_BUCKET`, `AWS_REGION` and `AWS_CDN` over the file values.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(bucket) = lookup(BUCKET_ENV) {
            self.storage.bucket = Some(bucket);
        }
        if let Some(region) = lookup(REGION_ENV) {
            self.storage.region = Some(region);
        }
        if let Some(cdn) = lookup(CDN_ENV) {
            self.storage.public_base_url = Some(cdn);
        }
    }

    pub fn storage_region(&self) -> &str {
        self.storage.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    pub fn request_timeout_secs(&self) -> u64 {
        self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    pub fn audio_work_dir(&self) -> PathBuf {
        self.audio
            .work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("ytbrief"))
    }

    pub fn local_storage_dir(&self) -> PathBuf {
        self.storage.local_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ytbrief")
                .join("artifacts")
        })
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytbrief")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
default_lang = "es"
output_dir = "/srv/briefs"
request_timeout_secs = 15

[storage]
endpoint = "https://storage.example.com"
bucket = "transcripts"
public_base_url = "https://cdn.example.com"

[generation]
base_url = "https://llm.example.com/v1"
model = "default"
timezone = "GMT+02"

[transcription]
model = "nova-3"

[audio]
ffmpeg = "/usr/local/bin/ffmpeg"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_lang.as_deref(), Some("es"));
        assert_eq!(config.output_dir, Some(PathBuf::from("/srv/briefs")));
        assert_eq!(config.request_timeout_secs(), 15);
        assert_eq!(config.storage.bucket.as_deref(), Some("transcripts"));
        assert_eq!(config.storage.public_base_url.as_deref(), Some("https://cdn.example.com"));
        assert_eq!(config.generation.timezone.as_deref(), Some("GMT+02"));
        assert_eq!(config.transcription.model.as_deref(), Some("nova-3"));
        assert_eq!(config.audio.ffmpeg.as_deref(), Some("/usr/local/bin/ffmpeg"));
        assert!(config.audio.yt_dlp.is_none());
    }

    #[test]
    fn test_parse_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.default_lang.is_none());
        assert!(config.storage.endpoint.is_none());
        assert_eq!(config.request_timeout_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str(r#"default_lang = "fr""#).unwrap();
        assert_eq!(config.default_lang.as_deref(), Some("fr"));
        assert!(config.generation.model.is_none());
    }

    #[test]
    fn test_env_overrides_storage() {
        let mut config: Config =
            toml::from_str("[storage]\nbucket = \"from-file\"\npublic_base_url = \"https://old.example.com\"").unwrap();
        config.apply_env_with(|name| match name {
            BUCKET_ENV => Some("from-env".to_string()),
            CDN_ENV => Some("https://d111.cloudfront.net".to_string()),
            REGION_ENV => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.storage.bucket.as_deref(), Some("from-env"));
        assert_eq!(config.storage.public_base_url.as_deref(), Some("https://d111.cloudfront.net"));
        assert_eq!(config.storage_region(), DEFAULT_REGION);
    }

    #[test]
    fn test_env_absent_keeps_file_values() {
        let mut config: Config = toml::from_str("[storage]\nbucket = \"b\"\nregion = \"eu-west-1\"").unwrap();
        config.apply_env_with(|_| None);
        assert_eq!(config.storage.bucket.as_deref(), Some("b"));
        assert_eq!(config.storage_region(), "eu-west-1");
    }

    #[test]
    fn test_local_storage_dir_override() {
        let config: Config = toml::from_str("[storage]\nlocal_dir = \"/tmp/artifacts\"").unwrap();
        assert_eq!(config.local_storage_dir(), PathBuf::from("/tmp/artifacts"));
    }
}
