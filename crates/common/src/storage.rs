//! Object storage for submission assets (logos, screenshots)
//!
//! S3-compatible (AWS, R2, MinIO). Built once at startup from
//! [`StorageConfig`]; when no bucket is configured every upload fails with
//! `StorageNotConfigured` instead of reaching for ambient credentials.

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

/// Asset kinds accepted by the upload endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    Logo,
    Screenshot,
}

/// Result of a successful upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

struct S3Backend {
    client: Client,
    bucket: String,
}

/// S3-compatible object storage
pub struct ObjectStorage {
    backend: Option<S3Backend>,
    config: StorageConfig,
}

impl ObjectStorage {
    /// Build storage from configuration.
    ///
    /// Static credentials are used when both keys are set, otherwise the
    /// default AWS provider chain.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let Some(bucket) = config.bucket.clone().filter(|b| !b.trim().is_empty()) else {
            info!("Object storage not configured, uploads disabled");
            return Self::disabled(config.clone());
        };

        let region = Region::new(config.region.clone().unwrap_or_else(|| "us-east-1".to_string()));

        let s3_config = match (&config.access_key_id, &config.secret_access_key) {
            (Some(key_id), Some(secret)) => {
                let credentials = Credentials::new(key_id, secret, None, None, "linkdir-config");
                let mut builder = aws_sdk_s3::config::Builder::new()
                    .behavior_version(BehaviorVersion::latest())
                    .region(region)
                    .credentials_provider(credentials)
                    .force_path_style(true);
                if let Some(endpoint) = &config.endpoint {
                    builder = builder.endpoint_url(endpoint);
                }
                builder.build()
            }
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(true);
                if let Some(endpoint) = &config.endpoint {
                    builder = builder.endpoint_url(endpoint);
                }
                builder.build()
            }
        };

        info!(bucket = %bucket, endpoint = ?config.endpoint, "Object storage configured");

        Self {
            backend: Some(S3Backend {
                client: Client::from_conf(s3_config),
                bucket,
            }),
            config: config.clone(),
        }
    }

    /// Storage that rejects every upload
    pub fn disabled(config: StorageConfig) -> Self {
        Self { backend: None, config }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Content-addressed key: `<prefix>/<sha256 prefix>.<ext>`
    pub fn object_key(&self, kind: UploadKind, bytes: &[u8], extension: &str) -> String {
        let prefix = match kind {
            UploadKind::Logo => &self.config.logo_prefix,
            UploadKind::Screenshot => &self.config.screenshot_prefix,
        };
        let digest = hex::encode(Sha256::digest(bytes));
        format!("{}/{}.{}", prefix.trim_matches('/'), &digest[..32], extension)
    }

    /// Public URL an uploaded key is served from
    pub fn public_url(&self, key: &str) -> String {
        match (&self.config.public_base_url, &self.backend) {
            (Some(base), _) => format!("{}/{}", base.trim_end_matches('/'), key),
            (None, Some(backend)) => match &self.config.endpoint {
                Some(endpoint) => {
                    format!("{}/{}/{}", endpoint.trim_end_matches('/'), backend.bucket, key)
                }
                None => format!("https://{}.s3.amazonaws.com/{}", backend.bucket, key),
            },
            (None, None) => key.to_string(),
        }
    }

    /// Validate and upload an image asset
    pub async fn upload(
        &self,
        kind: UploadKind,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<StoredObject> {
        let backend = self.backend.as_ref().ok_or(AppError::StorageNotConfigured)?;

        let extension = image_extension(content_type).ok_or_else(|| {
            AppError::UnsupportedMediaType {
                content_type: content_type.to_string(),
            }
        })?;

        if bytes.is_empty() {
            return Err(AppError::Validation {
                message: "upload body is empty".to_string(),
                field: None,
            });
        }

        if bytes.len() > self.config.max_upload_bytes {
            return Err(AppError::PayloadTooLarge {
                size: bytes.len(),
                limit: self.config.max_upload_bytes,
            });
        }

        let key = self.object_key(kind, &bytes, extension);
        let size = bytes.len();

        backend
            .client
            .put_object()
            .bucket(&backend.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .cache_control("public, max-age=31536000, immutable")
            .send()
            .await
            .map_err(|e| AppError::Storage {
                message: e.to_string(),
            })?;

        info!(bucket = %backend.bucket, key = %key, size, "Uploaded object");

        Ok(StoredObject {
            url: self.public_url(&key),
            key,
        })
    }
}

/// File extension for accepted image types
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match mime.as_str() {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
