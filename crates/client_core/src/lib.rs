//! Client-side orchestration of a mosaic generation session.
//!
//! [`SessionController`] owns the wizard state and mediates every call to the
//! remote mosaic service through the [`MosaicApi`] contract.

use async_trait::async_trait;
use shared::{
    domain::{DziMetadata, Requirements, SessionId},
    protocol::{GenerateOptions, RemoteSettings, TargetUploadResponse},
};

pub mod controller;
pub mod error;
pub mod preview;
pub mod state;
pub mod transport;
pub mod types;

pub use controller::{
    derive_generate_options, reduce, OperationKind, OperationTicket, SessionBeacon,
    SessionController, SessionEvent,
};
pub use error::ApiError;
pub use preview::{PreviewHandle, PreviewRegistry, PreviewSource};
pub use state::SessionState;
pub use transport::HttpMosaicApi;
pub use types::{ProgressCallback, UploadFile};

/// Remote mosaic service contract consumed by the session controller.
#[async_trait]
pub trait MosaicApi: Send + Sync {
    async fn create_session(&self) -> Result<SessionId, ApiError>;
    async fn delete_session(&self, session_id: &SessionId) -> Result<(), ApiError>;
    /// Fire-and-forget deletion signal for abrupt shutdown. Must not block
    /// and reports no outcome.
    fn send_termination_beacon(&self, session_id: &SessionId);
    async fn upload_target_image(
        &self,
        session_id: &SessionId,
        file: UploadFile,
    ) -> Result<TargetUploadResponse, ApiError>;
    async fn set_dimensions(
        &self,
        session_id: &SessionId,
        width: u32,
        height: u32,
    ) -> Result<Requirements, ApiError>;
    /// Returns the total number of tiles the service now holds for the
    /// session, which includes tiles from earlier uploads.
    async fn upload_tile_images(
        &self,
        session_id: &SessionId,
        files: Vec<UploadFile>,
        on_progress: Option<ProgressCallback>,
    ) -> Result<u32, ApiError>;
    async fn clear_tiles(&self, session_id: &SessionId) -> Result<(), ApiError>;
    async fn update_settings(
        &self,
        session_id: &SessionId,
        settings: &RemoteSettings,
    ) -> Result<(), ApiError>;
    async fn generate_mosaic(
        &self,
        session_id: &SessionId,
        options: &GenerateOptions,
    ) -> Result<DziMetadata, ApiError>;
}

/// Stand-in used when no service endpoint is configured; every call fails.
pub struct MissingMosaicApi;

#[async_trait]
impl MosaicApi for MissingMosaicApi {
    async fn create_session(&self) -> Result<SessionId, ApiError> {
        Err(ApiError::message("mosaic service is unavailable"))
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), ApiError> {
        Err(ApiError::message(format!(
            "mosaic service is unavailable; cannot delete session {session_id}"
        )))
    }

    fn send_termination_beacon(&self, _session_id: &SessionId) {}

    async fn upload_target_image(
        &self,
        _session_id: &SessionId,
        _file: UploadFile,
    ) -> Result<TargetUploadResponse, ApiError> {
        Err(ApiError::message("mosaic service is unavailable"))
    }

    async fn set_dimensions(
        &self,
        _session_id: &SessionId,
        _width: u32,
        _height: u32,
    ) -> Result<Requirements, ApiError> {
        Err(ApiError::message("mosaic service is unavailable"))
    }

    async fn upload_tile_images(
        &self,
        _session_id: &SessionId,
        _files: Vec<UploadFile>,
        _on_progress: Option<ProgressCallback>,
    ) -> Result<u32, ApiError> {
        Err(ApiError::message("mosaic service is unavailable"))
    }

    async fn clear_tiles(&self, _session_id: &SessionId) -> Result<(), ApiError> {
        Err(ApiError::message("mosaic service is unavailable"))
    }

    async fn update_settings(
        &self,
        _session_id: &SessionId,
        _settings: &RemoteSettings,
    ) -> Result<(), ApiError> {
        Err(ApiError::message("mosaic service is unavailable"))
    }

    async fn generate_mosaic(
        &self,
        _session_id: &SessionId,
        _options: &GenerateOptions,
    ) -> Result<DziMetadata, ApiError> {
        Err(ApiError::message("mosaic service is unavailable"))
    }
}
