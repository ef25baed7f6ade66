//! Image uploads: validation, collision-resistant naming, and read-back.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use chrono::Utc;
use rand::Rng;

use crate::error::{AppError, AppResult};

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

/// URL prefix under which stored uploads are served.
pub const UPLOADS_URL_PREFIX: &str = "/static/uploads";

const MAX_NAME_ATTEMPTS: usize = 4;

/// A file received from a multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
}

impl MediaStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Store an image upload and return its public path.
    ///
    /// Returns `Ok(None)` when there is nothing usable to store: no upload, an
    /// empty filename, or an extension outside [`ALLOWED_IMAGE_EXTENSIONS`].
    pub fn save_image(&self, upload: Option<&Upload>) -> AppResult<Option<String>> {
        let Some(upload) = upload else {
            return Ok(None);
        };
        let Some((stem, ext)) = image_name_parts(&upload.filename) else {
            tracing::debug!(filename = %upload.filename, "Rejected upload");
            return Ok(None);
        };

        std::fs::create_dir_all(&self.dir)?;

        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = unique_name(&stem, &ext);
            let path = self.dir.join(&name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(&upload.bytes)?;
                    tracing::info!(path = %path.display(), bytes = upload.bytes.len(), "Stored upload");
                    return Ok(Some(format!("{}/{}", UPLOADS_URL_PREFIX, name)));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Internal("could not allocate an upload name".into()))
    }

    /// Remove a stored upload by the public path `save_image` returned.
    /// Paths outside the uploads prefix and already-missing files are ignored.
    pub fn discard(&self, url: &str) -> AppResult<()> {
        let Some(name) = url
            .strip_prefix(UPLOADS_URL_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            return Ok(());
        };
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Ok(());
        }
        match std::fs::remove_file(self.dir.join(name)) {
            Ok(()) => {
                tracing::debug!(name, "Discarded upload");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a stored upload back, with its guessed MIME type.
    pub fn open(&self, name: &str) -> AppResult<(Vec<u8>, String)> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(AppError::NotFound("File not found.".into()));
        }

        let path = self.dir.join(name);
        let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AppError::NotFound("File not found.".into()),
            _ => AppError::Io(e),
        })?;
        let mime = mime_guess::from_path(&path).first_or_octet_stream();
        Ok((bytes, mime.as_ref().to_string()))
    }
}

/// Reduce a client-supplied filename to a safe ASCII name.
pub fn secure_filename(filename: &str) -> String {
    let base = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();

    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// Split a sanitised filename into stem and lower-cased extension if it is an
/// accepted image type.
fn image_name_parts(filename: &str) -> Option<(String, String)> {
    let safe = secure_filename(filename);
    let (stem, ext) = safe.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    if stem.is_empty() || !ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    Some((stem.to_string(), ext))
}

fn unique_name(stem: &str, ext: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("{}_{}_{:08x}.{}", stem, Utc::now().timestamp(), suffix, ext)
}
