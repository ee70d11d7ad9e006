use crate::{dto::ImageUpload, errors::AppError};
use std::{io::ErrorKind, path::PathBuf};
use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::{debug, info};
use uuid::Uuid;

/// Directory under the media root holding post images.
pub const POST_IMAGES_DIR: &str = "posts";
/// URL prefix uploaded files are served under.
pub const MEDIA_URL: &str = "/media";

const MAX_NAME_ATTEMPTS: usize = 8;

/// Uploaded files on local disk.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Writes a post image and returns its path relative to the root
    /// (`posts/<name>`). Taken names get a short random suffix.
    pub async fn save_post_image(&self, upload: &ImageUpload) -> Result<String, AppError> {
        let dir = self.root.join(POST_IMAGES_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::InternalError(format!("Creating {}: {}", dir.display(), e)))?;

        let base = sanitize_filename(&upload.filename);
        let mut name = base.clone();
        let mut attempts = 0;
        let mut file = loop {
            let path = dir.join(&name);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => break file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempts < MAX_NAME_ATTEMPTS => {
                    attempts += 1;
                    debug!("Upload name {} taken, retrying", name);
                    name = with_suffix(&base, &Uuid::new_v4().simple().to_string()[..7]);
                }
                Err(e) => {
                    return Err(AppError::InternalError(format!(
                        "Creating {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        };

        let path = dir.join(&name);
        let write_failed =
            |e: std::io::Error| AppError::InternalError(format!("Writing {}: {}", path.display(), e));
        file.write_all(&upload.data).await.map_err(write_failed)?;
        file.flush().await.map_err(write_failed)?;

        let relative = format!("{}/{}", POST_IMAGES_DIR, name);
        info!("Stored upload {} ({} bytes)", relative, upload.data.len());
        Ok(relative)
    }
}

/// Public URL of a stored file.
pub fn media_url(relative: &str) -> String {
    format!("{}/{}", MEDIA_URL, relative)
}

/// Keeps the basename only, restricted to `[A-Za-z0-9._-]`.
fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

fn with_suffix(name: &str, suffix: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_{}.{}", stem, suffix, ext),
        None => format!("{}_{}", name, suffix),
    }
}
