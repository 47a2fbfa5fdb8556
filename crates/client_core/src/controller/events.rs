//! Events applied to session state and the operation classes that emit them.

use shared::{
    domain::{ColorMode, DziMetadata, Requirements, Resolution, SessionId},
    protocol::{SettingsUpdate, TargetUploadResponse},
};

use crate::preview::PreviewHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    CreateSession,
    UploadTarget,
    SetDimensions,
    UploadTiles,
    ClearTiles,
    UpdateSettings,
    GenerateMosaic,
}

impl OperationKind {
    pub fn name(self) -> &'static str {
        match self {
            OperationKind::CreateSession => "create_session",
            OperationKind::UploadTarget => "upload_target",
            OperationKind::SetDimensions => "set_dimensions",
            OperationKind::UploadTiles => "upload_tiles",
            OperationKind::ClearTiles => "clear_tiles",
            OperationKind::UpdateSettings => "update_settings",
            OperationKind::GenerateMosaic => "generate_mosaic",
        }
    }

    /// User-facing message stored when an operation of this kind fails.
    pub fn failure_message(self) -> &'static str {
        match self {
            OperationKind::CreateSession => "Failed to create session",
            OperationKind::UploadTarget => {
                "Failed to upload target image. Please try a different image format."
            }
            OperationKind::SetDimensions => "Failed to set dimensions",
            OperationKind::UploadTiles => "Failed to upload tile images",
            OperationKind::ClearTiles => "Failed to clear tiles",
            OperationKind::UpdateSettings => "Failed to update settings",
            OperationKind::GenerateMosaic => "Failed to generate mosaic",
        }
    }

    /// Whether starting this operation clears the previous error.
    pub fn clears_error_on_start(self) -> bool {
        !matches!(self, OperationKind::CreateSession | OperationKind::ClearTiles)
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    SessionCreated(SessionId),
    OperationStarted(OperationKind),
    TargetUploaded {
        preview: PreviewHandle,
        response: TargetUploadResponse,
    },
    DimensionsSet {
        width: u32,
        height: u32,
        requirements: Requirements,
    },
    TilesUploaded {
        total_tiles: u32,
        previews: Vec<PreviewHandle>,
    },
    TilesCleared,
    SettingsApplied(SettingsUpdate),
    MosaicGenerated(DziMetadata),
    OperationFailed {
        kind: OperationKind,
        message: String,
        /// Previews created for the failed attempt; they never enter state.
        discarded_previews: Vec<PreviewHandle>,
    },
    TintPercentageSet(u8),
    TileSizeSet(u32),
    MaxRepeatsPerTileSet(u32),
    ColorModeSet(ColorMode),
    ResolutionSet(Resolution),
    UseAllTilesSet(bool),
    ManualModeSet(bool),
    NineXDetailSet(bool),
}

impl SessionEvent {
    /// Failure carrying the fixed message for `kind`.
    pub fn failed(kind: OperationKind) -> Self {
        Self::OperationFailed {
            kind,
            message: kind.failure_message().to_string(),
            discarded_previews: Vec::new(),
        }
    }

    pub fn with_discarded_previews(self, previews: Vec<PreviewHandle>) -> Self {
        match self {
            SessionEvent::OperationFailed { kind, message, .. } => SessionEvent::OperationFailed {
                kind,
                message,
                discarded_previews: previews,
            },
            other => other,
        }
    }
}
