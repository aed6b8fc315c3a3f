//! Image store module
//!
//! A flat directory is the only persistent state. Nothing is cached: every
//! operation re-reads the file system, so each request sees the directory as
//! it is at that instant.

pub mod archive;

use chrono::{DateTime, Local, TimeZone};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

use crate::error::ImageError;
use crate::http::mime;

/// Extensions accepted by the listing filter (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 5] = [".png", ".jpg", ".jpeg", ".gif", ".bmp"];

/// A stored file loaded for a fetch request
#[derive(Debug)]
pub struct StoredImage {
    pub name: String,
    pub data: Vec<u8>,
    pub content_type: &'static str,
    pub modified: Option<SystemTime>,
}

/// Handle to the upload directory
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

/// Filename for an upload received at `time`: `image_<YYYYMMDDHHMMSS>.jpg`
///
/// One-second resolution; uploads within the same second share a name.
pub fn image_filename<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("image_{}.jpg", time.format("%Y%m%d%H%M%S"))
}

/// Whether a directory entry name passes the listing filter
pub fn is_image_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// A fetch name must be a single plain path component inside the store
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if it does not exist yet
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    /// Persist an upload under a timestamped name, returning the bare filename
    ///
    /// A file written earlier in the same second is overwritten.
    pub async fn save(&self, data: &[u8]) -> Result<String, ImageError> {
        if data.is_empty() {
            return Err(ImageError::ClientError("No image provided".to_string()));
        }

        let filename = image_filename(&Local::now());
        fs::write(self.dir.join(&filename), data).await?;
        Ok(filename)
    }

    /// Names of the stored images, in directory enumeration order
    pub async fn list_images(&self) -> Result<Vec<String>, ImageError> {
        let names = self.list_entries().await?;
        Ok(names.into_iter().filter(|n| is_image_name(n)).collect())
    }

    /// Every entry name in the upload directory, unfiltered
    pub async fn list_entries(&self) -> Result<Vec<String>, ImageError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            // Non UTF-8 names cannot be addressed through the HTTP surface
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Load one stored file by name
    pub async fn read_image(&self, name: &str) -> Result<StoredImage, ImageError> {
        let not_found = || ImageError::NotFound("Image not found!".to_string());

        if !is_plain_file_name(name) {
            return Err(not_found());
        }

        let path = self.dir.join(name);
        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(not_found());
        }

        let data = match fs::read(&path).await {
            Ok(d) => d,
            // Removed between the metadata check and the read
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };

        Ok(StoredImage {
            name: name.to_string(),
            content_type: mime::get_content_type(
                path.extension().and_then(|e| e.to_str()),
            ),
            modified: metadata.modified().ok(),
            data,
        })
    }

    /// Zip every regular file in the store
    ///
    /// Names that are not valid UTF-8 are stored lossily (`U+FFFD` for each
    /// bad sequence).
    ///
    /// Fails with `NotFound` before building anything when the directory is
    /// empty, and again if the finished archive has no bytes.
    pub async fn archive_all(&self) -> Result<Vec<u8>, ImageError> {
        // Raw names: entries that are not valid UTF-8 still count and still ship
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name());
        }
        if names.is_empty() {
            return Err(ImageError::NotFound("No images found".to_string()));
        }

        let dir = self.dir.clone();
        let buffer = tokio::task::spawn_blocking(move || archive::build_zip(&dir, &names)).await??;

        if buffer.is_empty() {
            return Err(ImageError::NotFound("No images found".to_string()));
        }
        Ok(buffer)
    }
}
