//! On-disk storage for uploaded post images.
//!
//! Files live flat in one directory as `<uuid>-<original name>` and are
//! referenced from posts as `images/<file>`, the path also used to serve
//! them over HTTP.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// URL prefix recorded on posts and mounted on the router.
pub const URL_PREFIX: &str = "images";

const ALLOWED_MIME_TYPES: &[&str] = &["image/png", "image/jpg", "image/jpeg"];

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to write image {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create image directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file pulled off a multipart form, not yet written anywhere.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Only png and jpeg uploads are kept; anything else counts as no file.
    pub fn is_allowed(&self) -> bool {
        self.content_type.as_deref().map(is_allowed_mime).unwrap_or(false)
    }
}

pub fn is_allowed_mime(mime: &str) -> bool {
    let mime = mime.trim().to_ascii_lowercase();
    ALLOWED_MIME_TYPES.contains(&mime.as_str())
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<(), ImageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ImageError::CreateDir {
                path: self.dir.clone(),
                source,
            })
    }

    /// Write the upload and return the URL to store on the post.
    pub async fn save(&self, upload: &Upload) -> Result<String, ImageError> {
        self.ensure_dir().await?;

        let file_name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(&upload.file_name));
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|source| ImageError::Write { path: path.clone(), source })?;

        debug!("Stored image {} ({} bytes)", path.display(), upload.bytes.len());
        Ok(format!("{}/{}", URL_PREFIX, file_name))
    }

    /// Remove the file behind an image URL. Failures are only logged.
    pub async fn clear(&self, image_url: &str) {
        let Some(path) = self.resolve(image_url) else {
            warn!("Refusing to clear image outside the image directory: {}", image_url);
            return;
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("Removed image {}", path.display()),
            Err(e) => warn!("Failed to remove image {}: {}", path.display(), e),
        }
    }

    /// The `images/<file>` form of a client-supplied image path, as it is
    /// recorded on posts.
    pub fn canonical_url(&self, image_url: &str) -> Option<String> {
        file_component(image_url).map(|base| format!("{}/{}", URL_PREFIX, base))
    }

    /// Map an `images/<file>` URL to its location on disk. Only the final
    /// path component is used, so a URL can never point outside `dir`.
    fn resolve(&self, image_url: &str) -> Option<PathBuf> {
        file_component(image_url).map(|base| self.dir.join(base))
    }
}

fn file_component(image_url: &str) -> Option<String> {
    let normalized = image_url.trim().replace('\\', "/");
    let base = normalized.rsplit('/').next()?;
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

/// Keep the original name readable while stripping path separators and
/// characters that are awkward in URLs.
fn sanitize_file_name(name: &str) -> String {
    let base = name.replace('\\', "/");
    let base = base.rsplit('/').next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
