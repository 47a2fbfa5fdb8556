//! Locally created, revocable preview handles for selected files.

use std::{collections::HashMap, fmt, sync::Arc};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::types::UploadFile;

const PREVIEW_SCHEME: &str = "blob:mosaic/";

/// Display handle for a file held in a [`PreviewRegistry`]. The empty handle
/// stands in when a preview could not be created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PreviewHandle(String);

impl PreviewHandle {
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PreviewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreviewError {
    #[error("cannot preview empty file '{0}'")]
    EmptyFile(String),
}

#[derive(Clone)]
pub struct PreviewSource {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Arc<[u8]>,
}

impl fmt::Debug for PreviewSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewSource")
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct PreviewRegistry {
    entries: HashMap<PreviewHandle, PreviewSource>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, file: &UploadFile) -> Result<PreviewHandle, PreviewError> {
        // Type checks are left to the service.
        if file.is_empty() {
            return Err(PreviewError::EmptyFile(file.filename.clone()));
        }

        let handle = PreviewHandle(format!("{PREVIEW_SCHEME}{}", Uuid::new_v4()));
        self.entries.insert(
            handle.clone(),
            PreviewSource {
                filename: file.filename.clone(),
                mime_type: file.mime_type.clone(),
                bytes: Arc::clone(&file.bytes),
            },
        );
        Ok(handle)
    }

    /// Like [`create`](Self::create), but yields the empty handle on failure.
    pub fn create_or_empty(&mut self, file: &UploadFile) -> PreviewHandle {
        self.create(file).unwrap_or_else(|err| {
            debug!(filename = %file.filename, "preview unavailable: {err}");
            PreviewHandle::empty()
        })
    }

    pub fn resolve(&self, handle: &PreviewHandle) -> Option<&PreviewSource> {
        self.entries.get(handle)
    }

    pub fn revoke(&mut self, handle: &PreviewHandle) -> bool {
        self.entries.remove(handle).is_some()
    }

    pub fn revoke_all<'a>(&mut self, handles: impl IntoIterator<Item = &'a PreviewHandle>) {
        for handle in handles {
            self.revoke(handle);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
