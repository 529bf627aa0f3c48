//! Relocation of remote images into the managed media directory.
//!
//! Downloaded files are content-addressed (`<sha256>.<ext>`), so importing
//! the same image twice writes it once.

use std::path::PathBuf;

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;

use contentimport_shared::{DEFAULT_MAX_IMAGE_BYTES, ImportError, Result};

/// Downloads images and stores them under a public base URL.
#[derive(Debug, Clone)]
pub struct ImageRelocator {
    client: Client,
    media_dir: PathBuf,
    public_base_url: String,
    max_bytes: u64,
}

impl ImageRelocator {
    pub fn new(client: Client, media_dir: PathBuf, public_base_url: impl Into<String>) -> Self {
        Self {
            client,
            media_dir,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    /// Reject downloads larger than `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Whether `image` is a remote http(s) URL not already under the managed base.
    pub fn needs_relocation(&self, image: &str) -> bool {
        let remote = image.starts_with("http://") || image.starts_with("https://");
        let managed = format!("{}/", self.public_base_url);
        remote && !image.starts_with(&managed)
    }

    /// Download `image` into the media directory and return its managed URL.
    pub async fn relocate(&self, image: &str) -> Result<String> {
        let url = Url::parse(image)
            .map_err(|e| ImportError::validation(format!("invalid image URL '{image}': {e}")))?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ImportError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::Network(format!("{url}: HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(length) = response.content_length() {
            self.check_size(&url, length)?;
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImportError::Network(format!("{url}: body read failed: {e}")))?;
        self.check_size(&url, bytes.len() as u64)?;

        let file_name = format!(
            "{}.{}",
            compute_hash(&bytes),
            extension_for(&url, content_type.as_deref())
        );
        let path = self.media_dir.join(&file_name);

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(path = %path.display(), "image already stored");
        } else {
            tokio::fs::create_dir_all(&self.media_dir)
                .await
                .map_err(|e| ImportError::io(&self.media_dir, e))?;
            tokio::fs::write(&path, &bytes)
                .await
                .map_err(|e| ImportError::io(&path, e))?;
            info!(%url, path = %path.display(), bytes = bytes.len(), "image relocated");
        }

        Ok(format!("{}/{file_name}", self.public_base_url))
    }

    fn check_size(&self, url: &Url, size: u64) -> Result<()> {
        if size > self.max_bytes {
            return Err(ImportError::validation(format!(
                "{url}: image is {size} bytes, limit is {}",
                self.max_bytes
            )));
        }
        Ok(())
    }
}

/// File extension from the content type, falling back to the URL path.
fn extension_for(url: &Url, content_type: Option<&str>) -> &'static str {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    let from_mime = match mime.as_deref() {
        Some("image/png") => Some("png"),
        Some("image/jpeg") | Some("image/jpg") => Some("jpg"),
        Some("image/gif") => Some("gif"),
        Some("image/webp") => Some("webp"),
        Some("image/avif") => Some("avif"),
        Some("image/svg+xml") => Some("svg"),
        _ => None,
    };
    if let Some(ext) = from_mime {
        return ext;
    }

    let path_ext = url
        .path()
        .rsplit('.')
        .next()
        .map(|e| e.to_ascii_lowercase());
    match path_ext.as_deref() {
        Some("png") => "png",
        Some("jpg") | Some("jpeg") => "jpg",
        Some("gif") => "gif",
        Some("webp") => "webp",
        Some("avif") => "avif",
        Some("svg") => "svg",
        _ => "img",
    }
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
