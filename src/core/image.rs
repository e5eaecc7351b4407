//! Image attachments: local validation and upload to an image host.

use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::debug;

pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

#[derive(Debug)]
pub enum UploadError {
    InvalidType(PathBuf),
    TooLarge { path: PathBuf, size: u64 },
    Io { path: PathBuf, source: io::Error },
    Transport(String),
    InvalidResponse(String),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::InvalidType(path) => {
                write!(f, "Please upload only image files ({})", path.display())
            }
            UploadError::TooLarge { path, size } => write!(
                f,
                "File size should be less than 5MB ({} is {size} bytes)",
                path.display()
            ),
            UploadError::Io { path, source } => {
                write!(f, "Failed to read {}: {source}", path.display())
            }
            UploadError::Transport(message) => write!(f, "Failed to upload image: {message}"),
            UploadError::InvalidResponse(message) => {
                write!(f, "Failed to upload image: invalid response format ({message})")
            }
        }
    }
}

impl Error for UploadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            UploadError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub fn is_remote_url(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Check type and size of a local image. Returns its size in bytes.
pub fn validate_image(path: &Path) -> Result<u64, UploadError> {
    if !has_image_extension(path) {
        return Err(UploadError::InvalidType(path.to_path_buf()));
    }

    let metadata = std::fs::metadata(path).map_err(|source| UploadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if !metadata.is_file() {
        return Err(UploadError::InvalidType(path.to_path_buf()));
    }

    let size = metadata.len();
    if size > MAX_IMAGE_BYTES {
        return Err(UploadError::TooLarge {
            path: path.to_path_buf(),
            size,
        });
    }
    Ok(size)
}

#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Host `bytes` and return the public URL.
    async fn upload(&self, bytes: Vec<u8>) -> Result<String, UploadError>;
}

/// Validate and read a local image, then hand it to `uploader`.
pub async fn upload_file(uploader: &dyn ImageUploader, path: &Path) -> Result<String, UploadError> {
    validate_image(path)?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    uploader.upload(bytes).await
}

pub struct HttpImageUploader {
    client: reqwest::Client,
    upload_url: String,
}

impl HttpImageUploader {
    pub fn new(client: reqwest::Client, upload_url: impl Into<String>) -> Self {
        Self {
            client,
            upload_url: upload_url.into(),
        }
    }
}

#[async_trait]
impl ImageUploader for HttpImageUploader {
    async fn upload(&self, bytes: Vec<u8>) -> Result<String, UploadError> {
        let part = Part::bytes(bytes).file_name("unnamed.png");
        let form = Form::new().part("image", part);

        debug!(url = %self.upload_url, "uploading image");
        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| UploadError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Transport(format!("HTTP {}", status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|err| UploadError::Transport(err.to_string()))?;
        parse_upload_response(&body)
    }
}

/// Pull `data.image` out of the host's reply, which may itself be a JSON-encoded string.
pub(crate) fn parse_upload_response(body: &str) -> Result<String, UploadError> {
    let mut value: serde_json::Value = serde_json::from_str(body)
        .map_err(|err| UploadError::InvalidResponse(err.to_string()))?;

    if let serde_json::Value::String(inner) = &value {
        value = serde_json::from_str(inner)
            .map_err(|err| UploadError::InvalidResponse(err.to_string()))?;
    }

    value
        .pointer("/data/image")
        .and_then(|image| image.as_str())
        .filter(|url| !url.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| UploadError::InvalidResponse("missing data.image".to_string()))
}
