use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use log::{debug, info};
use serde::Serialize;

use crate::error::{PipelineError, Result};

/// A published artifact and where it can be fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactReference {
    pub key: String,
    pub public_url: String,
    pub content_type: String,
}

/// Object storage that creates or overwrites one object per key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, returning the object's location.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}

/// Path-style HTTP object storage (`PUT {endpoint}/{bucket}/{key}`).
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(client: reqwest::Client, endpoint: &str, bucket: &str, token: Option<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.trim_matches('/').to_string(),
            token,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let url = self.object_url(key);
        debug!("Uploading {} bytes to {url}", bytes.len());

        let mut req = self
            .client
            .put(&url)
            .header("Content-Type", content_type)
            .body(bytes);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let storage_err = |reason: String| PipelineError::Storage {
            key: key.to_string(),
            reason,
        };

        let resp = req.send().await.map_err(|e| storage_err(e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(storage_err(format!("storage returned {status}: {body}")));
        }

        Ok(url)
    }
}

/// Static credentials and placement for an S3 bucket.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// Custom endpoint (MinIO, R2, a test server). `None` targets AWS.
    pub endpoint: Option<String>,
    pub timeout: Option<Duration>,
}

/// Amazon S3 (or an S3-compatible service) with SigV4 signing and
/// path-style addressing.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    base_url: String,
}

impl S3ObjectStore {
    pub fn new(settings: S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key,
            settings.secret_key,
            None,
            None,
            "ytbrief-env",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint.trim_end_matches('/'));
        }
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout_config(TimeoutConfig::builder().operation_timeout(timeout).build());
        }

        let base_url = match &settings.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://s3.{}.amazonaws.com", settings.region),
        };

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: settings.bucket,
            base_url,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, key.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        debug!("Uploading {} bytes to s3://{}/{key}", bytes.len(), self.bucket);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| PipelineError::Storage {
                key: key.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(self.object_url(key))
    }
}

/// Object storage backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        let path = self.root.join(key.trim_start_matches('/'));
        let storage_err = |e: std::io::Error| PipelineError::Storage {
            key: key.to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(storage_err)?;
        }
        tokio::fs::write(&path, bytes).await.map_err(storage_err)?;

        let absolute = std::path::absolute(&path).unwrap_or(path);
        Ok(format!("file://{}", absolute.display()))
    }
}

/// Publishes artifacts and computes their externally reachable URL.
pub struct Publisher {
    store: Box<dyn ObjectStore>,
    public_base_url: Option<String>,
}

impl Publisher {
    pub fn new(store: Box<dyn ObjectStore>, public_base_url: Option<String>) -> Self {
        Self {
            store,
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    /// Upload `bytes` under `key`; re-publishing a key overwrites the object.
    pub async fn publish(&self, bytes: Vec<u8>, key: &str, content_type: &str) -> Result<ArtifactReference> {
        let location = self.store.put(key, bytes, content_type).await?;
        let public_url = match &self.public_base_url {
            Some(base) => format!("{base}/{key}"),
            None => location.clone(),
        };
        info!("Published {key} at {location}");

        Ok(ArtifactReference {
            key: key.to_string(),
            public_url,
            content_type: content_type.to_string(),
        })
    }
}
