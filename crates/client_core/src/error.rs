use shared::error::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("mosaic service responded with status {status}")]
    Rejected { status: u16, body: ServiceError },
    #[error("request to mosaic service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid mosaic service url: {0}")]
    Url(#[from] url::ParseError),
    #[error("{0}")]
    Message(String),
}

impl ApiError {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn rejected(status: u16, error: Option<String>) -> Self {
        Self::Rejected {
            status,
            body: ServiceError { error },
        }
    }

    /// Message carried by the failure itself. Rejections only carry the
    /// service payload, so they have none.
    pub fn direct_message(&self) -> Option<String> {
        match self {
            ApiError::Rejected { .. } => None,
            other => Some(other.to_string()).filter(|message| !message.trim().is_empty()),
        }
    }

    /// Error text reported by the service in the response payload.
    pub fn service_error(&self) -> Option<&str> {
        match self {
            ApiError::Rejected { body, .. } => body.message(),
            _ => None,
        }
    }

    /// Best available user-facing description: the direct message, then the
    /// service-reported error, then `fallback`.
    pub fn describe(&self, fallback: &str) -> String {
        self.direct_message()
            .or_else(|| self.service_error().map(str::to_string))
            .unwrap_or_else(|| fallback.to_string())
    }
}
