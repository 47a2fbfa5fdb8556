use std::{
    fmt,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use anyhow::{Context, Result};

/// Receives upload progress as a fraction in `0.0..=1.0`.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// In-memory file selected by the user for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Arc<[u8]>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let filename = filename.into();
        let mime_type = mime_guess::from_path(&filename)
            .first_raw()
            .map(str::to_string);
        Self {
            filename,
            mime_type,
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(filename, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Byte-level progress shared by every part of one upload request.
pub(crate) struct TransferProgress {
    sent: AtomicU64,
    total: u64,
    callback: ProgressCallback,
}

impl TransferProgress {
    pub(crate) fn new(total: u64, callback: ProgressCallback) -> Arc<Self> {
        Arc::new(Self {
            sent: AtomicU64::new(0),
            total,
            callback,
        })
    }

    pub(crate) fn advance(&self, bytes: usize) {
        let sent = self.sent.fetch_add(bytes as u64, Ordering::Relaxed) + bytes as u64;
        if self.total > 0 {
            (self.callback)((sent as f64 / self.total as f64).min(1.0));
        }
    }

    pub(crate) fn finish(&self) {
        (self.callback)(1.0);
    }
}
