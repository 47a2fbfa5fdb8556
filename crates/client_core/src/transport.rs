//! HTTP/JSON transport for the mosaic service.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{
    multipart::{Form, Part},
    Body, Client, Response,
};
use shared::{
    domain::{DziMetadata, Requirements, SessionId},
    error::ServiceError,
    protocol::{
        CreateSessionResponse, DimensionsRequest, GenerateOptions, RemoteSettings,
        TargetUploadResponse, TileUploadResponse,
    },
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::ApiError,
    types::{ProgressCallback, TransferProgress, UploadFile},
    MosaicApi,
};

const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

pub struct HttpMosaicApi {
    http: Client,
    base_url: Url,
}

impl HttpMosaicApi {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Self::with_client(http, base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim())?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::message(format!(
                "mosaic service url '{base_url}' cannot be used as a base"
            )));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::message("mosaic service url cannot be used as a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn session_url(&self, session_id: &SessionId, tail: &[&str]) -> Result<Url, ApiError> {
        let mut segments = vec!["session", session_id.as_str()];
        segments.extend_from_slice(tail);
        self.url(&segments)
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let raw = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<ServiceError>(&raw).unwrap_or_default();
    debug!(status = status.as_u16(), "mosaic service rejected request: {raw}");
    Err(ApiError::Rejected {
        status: status.as_u16(),
        body,
    })
}

fn file_part(file: &UploadFile) -> Result<Part, ApiError> {
    let part = Part::bytes(file.bytes.to_vec()).file_name(file.filename.clone());
    match &file.mime_type {
        Some(mime_type) => Ok(part.mime_str(mime_type)?),
        None => Ok(part),
    }
}

fn streamed_file_part(
    file: &UploadFile,
    progress: Arc<TransferProgress>,
) -> Result<Part, ApiError> {
    let data = Arc::clone(&file.bytes);
    let len = data.len();
    let chunks = futures::stream::iter((0..len).step_by(UPLOAD_CHUNK_BYTES).map(move |start| {
        let end = (start + UPLOAD_CHUNK_BYTES).min(len);
        Ok::<Vec<u8>, std::io::Error>(data[start..end].to_vec())
    }))
    .inspect(move |chunk| {
        if let Ok(chunk) = chunk {
            progress.advance(chunk.len());
        }
    });

    let part = Part::stream_with_length(Body::wrap_stream(chunks), len as u64)
        .file_name(file.filename.clone());
    match &file.mime_type {
        Some(mime_type) => Ok(part.mime_str(mime_type)?),
        None => Ok(part),
    }
}

#[async_trait]
impl MosaicApi for HttpMosaicApi {
    async fn create_session(&self) -> Result<SessionId, ApiError> {
        let response = self.http.post(self.url(&["session"])?).send().await?;
        let body: CreateSessionResponse = ensure_success(response).await?.json().await?;
        info!(session_id = %body.session_id, "mosaic session created");
        Ok(body.session_id)
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(self.session_url(session_id, &[])?)
            .send()
            .await?;
        ensure_success(response).await?;
        info!(%session_id, "mosaic session deleted");
        Ok(())
    }

    fn send_termination_beacon(&self, session_id: &SessionId) {
        let url = match self.session_url(session_id, &[]) {
            Ok(url) => url,
            Err(err) => {
                warn!(%session_id, "termination beacon dropped: {err}");
                return;
            }
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%session_id, "termination beacon dropped: no async runtime available");
            return;
        };

        let request = self.http.post(url).body(Vec::<u8>::new());
        let session_id = session_id.clone();
        runtime.spawn(async move {
            if let Err(err) = request.send().await {
                debug!(%session_id, "termination beacon not delivered: {err}");
            }
        });
    }

    async fn upload_target_image(
        &self,
        session_id: &SessionId,
        file: UploadFile,
    ) -> Result<TargetUploadResponse, ApiError> {
        let form = Form::new().part("image", file_part(&file)?);
        let response = self
            .http
            .post(self.session_url(session_id, &["target"])?)
            .multipart(form)
            .send()
            .await?;
        let body: TargetUploadResponse = ensure_success(response).await?.json().await?;
        info!(
            %session_id,
            width = body.width,
            height = body.height,
            "target image analysed"
        );
        Ok(body)
    }

    async fn set_dimensions(
        &self,
        session_id: &SessionId,
        width: u32,
        height: u32,
    ) -> Result<Requirements, ApiError> {
        let response = self
            .http
            .post(self.session_url(session_id, &["dimensions"])?)
            .json(&DimensionsRequest { width, height })
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn upload_tile_images(
        &self,
        session_id: &SessionId,
        files: Vec<UploadFile>,
        on_progress: Option<ProgressCallback>,
    ) -> Result<u32, ApiError> {
        let progress = on_progress.map(|callback| {
            let total: u64 = files.iter().map(|file| file.len() as u64).sum();
            TransferProgress::new(total, callback)
        });

        let mut form = Form::new();
        for file in &files {
            let part = match &progress {
                Some(progress) => streamed_file_part(file, Arc::clone(progress))?,
                None => file_part(file)?,
            };
            form = form.part("tiles", part);
        }

        let response = self
            .http
            .post(self.session_url(session_id, &["tiles"])?)
            .multipart(form)
            .send()
            .await?;
        let body: TileUploadResponse = ensure_success(response).await?.json().await?;
        if let Some(progress) = progress {
            progress.finish();
        }
        info!(
            %session_id,
            sent = files.len(),
            total = body.total_tiles,
            "tile images uploaded"
        );
        Ok(body.total_tiles)
    }

    async fn clear_tiles(&self, session_id: &SessionId) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(self.session_url(session_id, &["tiles"])?)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn update_settings(
        &self,
        session_id: &SessionId,
        settings: &RemoteSettings,
    ) -> Result<(), ApiError> {
        let response = self
            .http
            .put(self.session_url(session_id, &["settings"])?)
            .json(settings)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn generate_mosaic(
        &self,
        session_id: &SessionId,
        options: &GenerateOptions,
    ) -> Result<DziMetadata, ApiError> {
        let response = self
            .http
            .post(self.session_url(session_id, &["generate"])?)
            .json(options)
            .send()
            .await?;
        let metadata: DziMetadata = ensure_success(response).await?.json().await?;
        info!(%session_id, "mosaic generated");
        Ok(metadata)
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
