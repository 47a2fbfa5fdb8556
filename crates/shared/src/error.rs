use serde::{Deserialize, Serialize};

/// Error body returned by the mosaic service alongside a non-success status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub error: Option<String>,
}

impl ServiceError {
    /// The reported error text, ignoring blank values.
    pub fn message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
    }
}
