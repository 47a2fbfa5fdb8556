use serde::Serialize;
use shared::domain::{
    ColorMode, Dimensions, DziMetadata, ImageAnalysis, Requirements, Resolution, SessionId,
};

use crate::preview::PreviewHandle;

/// Most tile previews kept in session state.
pub const MAX_TILE_PREVIEWS: usize = 50;

pub const STEP_UPLOAD_TARGET: u8 = 1;
pub const STEP_SET_DIMENSIONS: u8 = 2;
pub const STEP_UPLOAD_TILES: u8 = 3;
pub const STEP_RESULT: u8 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub session_id: Option<SessionId>,
    pub step: u8,

    pub target_image_preview: Option<PreviewHandle>,
    pub target_image_dimensions: Option<Dimensions>,
    pub image_analysis: Option<ImageAnalysis>,
    pub is_uploading_target: bool,
    pub manual_mode: bool,

    pub desired_width: u32,
    pub desired_height: u32,
    pub requirements: Option<Requirements>,

    pub tile_count: u32,
    pub tile_previews: Vec<PreviewHandle>,

    pub allow_duplicates: bool,
    pub allow_tinting: bool,
    pub tint_percentage: u8,
    pub tile_size: u32,
    pub max_repeats_per_tile: u32,
    pub color_mode: ColorMode,
    pub nine_x_detail: bool,
    pub selected_resolution: Resolution,
    pub use_all_tiles: bool,

    pub is_generating: bool,
    pub has_mosaic: bool,
    pub dzi_metadata: Option<DziMetadata>,
    pub error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            session_id: None,
            step: STEP_UPLOAD_TARGET,
            target_image_preview: None,
            target_image_dimensions: None,
            image_analysis: None,
            is_uploading_target: false,
            manual_mode: false,
            desired_width: 3000,
            desired_height: 2000,
            requirements: None,
            tile_count: 0,
            tile_previews: Vec::new(),
            allow_duplicates: true,
            allow_tinting: true,
            tint_percentage: 50,
            tile_size: 12,
            max_repeats_per_tile: 5,
            color_mode: ColorMode::Blend,
            nine_x_detail: false,
            selected_resolution: Resolution::Low,
            use_all_tiles: false,
            is_generating: false,
            has_mosaic: false,
            dzi_metadata: None,
            error: None,
        }
    }
}
