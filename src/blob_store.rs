use std::path::{Path, PathBuf};

use log::warn;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::constants::DEFAULT_VIDEO_EXTENSION;
use crate::error::AppError;

/// Filesystem blob store for uploaded videos, one file per session id.
/// Clients never see these paths; all access goes through the session
/// service by id.
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
    max_bytes: u64,
}

/// Location and size of a stored blob, as recorded on the session row.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub filename: String,
    pub filepath: String,
    pub size: i64,
}

/// A finished staging file waiting to be promoted to its final name.
#[derive(Debug)]
pub struct StagedBlob {
    temp_path: PathBuf,
    size: u64,
}

impl BlobStore {
    /// Open the store rooted at `root`, creating the directory if needed.
    /// `max_bytes` is the per-upload ceiling enforced while streaming.
    pub async fn open(root: impl Into<PathBuf>, max_bytes: u64) -> Result<Self, AppError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root, max_bytes })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Begin staging an upload. Bytes stream into a temporary file next to
    /// the final location so a failed upload never clobbers an existing
    /// blob for the same session.
    pub async fn stage(&self) -> Result<BlobWriter, AppError> {
        let temp_path = self.root.join(format!(".upload-{}.part", Uuid::new_v4()));
        let file = fs::File::create(&temp_path).await?;
        Ok(BlobWriter {
            file: Some(file),
            temp_path,
            written: 0,
            max_bytes: self.max_bytes,
        })
    }

    /// Move a finished staging file to its final name `{id}.{ext}`,
    /// overwriting any previous blob stored under the same session id.
    pub async fn promote(
        &self,
        staged: StagedBlob,
        id: &str,
        extension: &str,
    ) -> Result<StoredBlob, AppError> {
        let filename = format!("{}.{}", sanitize_for_filename(id), extension);
        let filepath = self.root.join(&filename);
        fs::rename(&staged.temp_path, &filepath).await?;
        Ok(StoredBlob {
            filename,
            filepath: filepath.to_string_lossy().into_owned(),
            size: staged.size as i64,
        })
    }

    /// Drop a staging file that will not be promoted (validation failed or
    /// the request was abandoned).
    pub async fn discard(&self, staged: StagedBlob) {
        if let Err(e) = fs::remove_file(&staged.temp_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "failed to remove staged upload {}: {}",
                    staged.temp_path.display(),
                    e
                );
            }
        }
    }

    /// Open a stored blob for streaming. A missing file surfaces as
    /// NotFound: the record may have outlived an externally removed file.
    pub async fn get(&self, filepath: &str) -> Result<(fs::File, u64), AppError> {
        match fs::File::open(filepath).await {
            Ok(file) => {
                let size = file.metadata().await?.len();
                Ok((file, size))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound("Video file not found".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Deleting a blob that is already gone counts as success.
    pub async fn delete(&self, filepath: &str) -> Result<(), AppError> {
        match fs::remove_file(filepath).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Streaming writer for one staged upload. The size ceiling is checked per
/// chunk so an oversized stream fails before it is fully on disk.
pub struct BlobWriter {
    file: Option<fs::File>,
    temp_path: PathBuf,
    written: u64,
    max_bytes: u64,
}

impl BlobWriter {
    pub async fn append(&mut self, chunk: &[u8]) -> Result<(), AppError> {
        self.written += chunk.len() as u64;
        if self.written > self.max_bytes {
            self.abort().await;
            return Err(AppError::PayloadTooLarge(format!(
                "Upload exceeds the maximum size of {} bytes",
                self.max_bytes
            )));
        }

        let file = match self.file.as_mut() {
            Some(file) => file,
            None => {
                return Err(AppError::Storage(
                    "upload writer is no longer open".to_string(),
                ))
            }
        };

        if let Err(e) = file.write_all(chunk).await {
            self.abort().await;
            return Err(e.into());
        }
        Ok(())
    }

    pub async fn finish(mut self) -> Result<StagedBlob, AppError> {
        let mut file = match self.file.take() {
            Some(file) => file,
            None => {
                return Err(AppError::Storage(
                    "upload writer is no longer open".to_string(),
                ))
            }
        };
        file.flush().await?;
        Ok(StagedBlob {
            temp_path: std::mem::take(&mut self.temp_path),
            size: self.written,
        })
    }

    /// Close and remove the partial file after a failed upload. Safe to call
    /// more than once.
    pub async fn abort(&mut self) {
        self.file.take();
        if self.temp_path.as_os_str().is_empty() {
            return;
        }
        if let Err(e) = fs::remove_file(&self.temp_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "failed to remove partial upload {}: {}",
                    self.temp_path.display(),
                    e
                );
            }
        }
    }
}

/// Session ids come from clients; strip anything that could escape the
/// uploads directory before the id becomes a file name.
pub fn sanitize_for_filename(id: &str) -> String {
    let safe: String = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect();
    if safe.is_empty() {
        "session".to_string()
    } else {
        safe
    }
}

/// Extension for a new blob: the uploaded file name wins, then the declared
/// content type, then the default video container.
pub fn extension_for_upload(file_name: Option<&str>, content_type: Option<&str>) -> String {
    if let Some(name) = file_name {
        if let Some((_, ext)) = name.rsplit_once('.') {
            let ext: String = ext
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .map(|c| c.to_ascii_lowercase())
                .collect();
            if !ext.is_empty() && ext.len() <= 5 {
                return ext;
            }
        }
    }

    let media_type = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim())
        .unwrap_or_default();
    match media_type {
        "video/webm" => "webm".to_string(),
        "video/mp4" => "mp4".to_string(),
        "video/quicktime" => "mov".to_string(),
        "video/x-matroska" => "mkv".to_string(),
        _ => DEFAULT_VIDEO_EXTENSION.to_string(),
    }
}

/// Content type for playback, derived from the stored file name.
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = filename.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match extension {
        "webm" => "video/webm",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}
