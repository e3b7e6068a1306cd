use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Malformed image: {0}")]
    Malformed(String),

    #[error("Image exceeds the {0} byte limit")]
    TooLarge(usize),

    #[error("Failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Recipe,
    Avatar,
}

impl ImageKind {
    const fn dir(self) -> &'static str {
        match self {
            Self::Recipe => "recipes",
            Self::Avatar => "avatars",
        }
    }
}

/// A decoded `data:image/<ext>;base64,<payload>` upload.
#[derive(Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

pub fn decode_data_url(data_url: &str, max_bytes: usize) -> Result<DecodedImage, ImageError> {
    let rest = data_url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| ImageError::Malformed("expected a data URL".to_string()))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ImageError::Malformed("missing payload".to_string()))?;

    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| ImageError::Malformed("payload must be base64".to_string()))?;

    let extension = match mime.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        other => {
            return Err(ImageError::Malformed(format!(
                "unsupported image type '{other}'"
            )));
        }
    };

    // Base64 grows data by 4/3; reject before decoding anything huge.
    if payload.len() / 4 * 3 > max_bytes.saturating_add(3) {
        return Err(ImageError::TooLarge(max_bytes));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| ImageError::Malformed(format!("invalid base64: {e}")))?;

    if bytes.is_empty() {
        return Err(ImageError::Malformed("image is empty".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(ImageError::TooLarge(max_bytes));
    }

    Ok(DecodedImage { extension, bytes })
}

/// Stores uploaded images under the media root and hands back paths
/// relative to it.
pub struct ImageService {
    media_root: PathBuf,
    max_bytes: usize,
}

impl ImageService {
    #[must_use]
    pub fn new(media_root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            media_root: media_root.into(),
            max_bytes,
        }
    }

    #[must_use]
    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// Decodes and writes the image. Returns e.g. `recipes/<uuid>.png`.
    pub async fn save(&self, data_url: &str, kind: ImageKind) -> Result<String, ImageError> {
        let image = decode_data_url(data_url, self.max_bytes)?;

        let dir = self.media_root.join(kind.dir());
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
        }

        let relative = format!("{}/{}.{}", kind.dir(), Uuid::new_v4(), image.extension);
        let path = self.media_root.join(&relative);
        fs::write(&path, &image.bytes).await?;

        info!(path = %path.display(), size = image.bytes.len(), "Image stored");
        Ok(relative)
    }

    /// Removes a stored image; failures are only logged.
    pub async fn remove(&self, relative: &str) {
        if relative.is_empty() || relative.contains("..") {
            return;
        }

        let path = self.media_root.join(relative);
        if let Err(e) = fs::remove_file(&path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %path.display(), error = %e, "Failed to remove image");
        }
    }
}
