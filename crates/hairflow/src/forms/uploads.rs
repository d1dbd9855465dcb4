//! Patient photo/video uploads against an external storage collaborator.
//!
//! Every upload runs under a per-session [`UploadGate`]. The caller takes an [`UploadTicket`]
//! before handing files over; a second ticket is refused while one is held, and dropping the
//! ticket clears the flag whatever the storage call returned.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::TemplateId;

/// Storage folder a file lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    Photos,
    Videos,
}

impl UploadKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            UploadKind::Photos => "photos",
            UploadKind::Videos => "videos",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "photos" | "photo" => Some(UploadKind::Photos),
            "videos" | "video" => Some(UploadKind::Videos),
            _ => None,
        }
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to an uploaded file, stored in the answer set of a file field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    pub name: String,
    pub url: String,
    pub kind: UploadKind,
    pub size: u64,
}

/// Raw file handed to the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPayload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub public_url: String,
}

/// `patient-files/{form_id}/{kind}/{filename}`
pub fn upload_path(form_id: &TemplateId, kind: UploadKind, file_name: &str) -> String {
    format!("patient-files/{}/{}/{}", form_id, kind.as_str(), file_name)
}

/// Object storage collaborator. Writes overwrite any object at the same path.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn upload(&self, path: &str, payload: UploadPayload)
        -> Result<StoredObject, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage backend rejected upload: {0}")]
    Rejected(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("an upload is already in progress for this form")]
    InProgress,
    #[error("no files were provided")]
    Empty,
    #[error("file name must not be empty or contain path separators")]
    InvalidFileName,
    #[error("upload of '{file_name}' timed out after {timeout:?}")]
    TimedOut { file_name: String, timeout: Duration },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Uploading flag for one intake session.
#[derive(Debug, Default)]
pub struct UploadGate {
    uploading: AtomicBool,
}

impl UploadGate {
    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::Acquire)
    }

    pub fn try_begin(self: &Arc<Self>) -> Result<UploadTicket, UploadError> {
        self.uploading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| UploadError::InProgress)?;
        Ok(UploadTicket {
            gate: Arc::clone(self),
        })
    }
}

/// Held while an upload is in flight; clears the gate on drop.
#[derive(Debug)]
pub struct UploadTicket {
    gate: Arc<UploadGate>,
}

impl Drop for UploadTicket {
    fn drop(&mut self) {
        self.gate.uploading.store(false, Ordering::Release);
    }
}

/// Sends patient files to storage under the path convention with a bounded wait per file.
pub struct IntakeUploader {
    storage: Arc<dyn StorageProvider>,
    timeout: Duration,
}

impl IntakeUploader {
    pub fn new(storage: Arc<dyn StorageProvider>, timeout: Duration) -> Self {
        Self { storage, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Upload every file or none: the first failure aborts the batch and nothing is returned.
    pub async fn upload(
        &self,
        ticket: UploadTicket,
        form_id: &TemplateId,
        kind: UploadKind,
        files: Vec<UploadPayload>,
    ) -> Result<Vec<FileReference>, UploadError> {
        if files.is_empty() {
            return Err(UploadError::Empty);
        }
        if files.iter().any(|file| !is_valid_file_name(&file.file_name)) {
            return Err(UploadError::InvalidFileName);
        }

        let _ticket = ticket;
        let mut uploaded = Vec::with_capacity(files.len());

        for payload in files {
            let path = upload_path(form_id, kind, &payload.file_name);
            let name = payload.file_name.clone();
            let size = payload.bytes.len() as u64;

            let stored = match tokio::time::timeout(self.timeout, self.storage.upload(&path, payload)).await {
                Ok(Ok(stored)) => stored,
                Ok(Err(err)) => {
                    warn!(%form_id, %path, error = %err, "patient file upload failed");
                    return Err(err.into());
                }
                Err(_) => {
                    warn!(%form_id, %path, timeout = ?self.timeout, "patient file upload timed out");
                    return Err(UploadError::TimedOut {
                        file_name: name,
                        timeout: self.timeout,
                    });
                }
            };

            uploaded.push(FileReference {
                name,
                url: stored.public_url,
                kind,
                size,
            });
        }

        info!(%form_id, %kind, files = uploaded.len(), "patient files uploaded");
        Ok(uploaded)
    }
}

fn is_valid_file_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && !trimmed.contains('/') && !trimmed.contains('\\') && trimmed != ".."
}
