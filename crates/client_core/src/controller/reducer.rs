//! Pure state transition function applied by the session coordinator.

use shared::domain::Dimensions;

use crate::{
    controller::events::{OperationKind, SessionEvent},
    preview::PreviewHandle,
    state::{
        SessionState, MAX_TILE_PREVIEWS, STEP_RESULT, STEP_SET_DIMENSIONS, STEP_UPLOAD_TILES,
    },
};

/// Outcome of applying one event: the next state plus every preview handle
/// that left the state and must be revoked.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: SessionState,
    pub released: Vec<PreviewHandle>,
}

pub fn reduce(mut state: SessionState, event: SessionEvent) -> Transition {
    let mut released = Vec::new();

    match event {
        SessionEvent::SessionCreated(session_id) => {
            if state.session_id.is_none() {
                state.session_id = Some(session_id);
            }
        }
        SessionEvent::OperationStarted(kind) => {
            if kind.clears_error_on_start() {
                state.error = None;
            }
            match kind {
                OperationKind::UploadTarget => state.is_uploading_target = true,
                OperationKind::GenerateMosaic => state.is_generating = true,
                _ => {}
            }
        }
        SessionEvent::TargetUploaded { preview, response } => {
            if let Some(previous) = state.target_image_preview.replace(preview) {
                if state.target_image_preview.as_ref() != Some(&previous) {
                    released.push(previous);
                }
            }
            state.target_image_dimensions = Some(Dimensions {
                width: response.width,
                height: response.height,
            });
            state.image_analysis = Some(response.analysis);
            state.desired_width = response.width;
            state.desired_height = response.height;
            state.step = STEP_SET_DIMENSIONS;
            state.is_uploading_target = false;
        }
        SessionEvent::DimensionsSet {
            width,
            height,
            requirements,
        } => {
            state.desired_width = width;
            state.desired_height = height;
            state.requirements = Some(requirements);
            state.step = state.step.max(STEP_UPLOAD_TILES);
        }
        SessionEvent::TilesUploaded {
            total_tiles,
            previews,
        } => {
            state.tile_count = total_tiles;
            state.tile_previews.extend(previews);
            let overflow = state.tile_previews.len().saturating_sub(MAX_TILE_PREVIEWS);
            released.extend(state.tile_previews.drain(..overflow));
            state.step = state.step.max(STEP_UPLOAD_TILES);
        }
        SessionEvent::TilesCleared => {
            released.append(&mut state.tile_previews);
            state.tile_count = 0;
        }
        SessionEvent::SettingsApplied(update) => {
            if let Some(value) = update.allow_tinting {
                state.allow_tinting = value;
            }
            if let Some(value) = update.tint_percentage {
                state.tint_percentage = value;
            }
            if let Some(value) = update.tile_size {
                state.tile_size = value;
            }
            if let Some(value) = update.max_repeats_per_tile {
                state.max_repeats_per_tile = value;
            }
            if let Some(value) = update.color_mode {
                state.color_mode = value;
            }
            if let Some(value) = update.nine_x_detail {
                state.nine_x_detail = value;
            }
            state.allow_duplicates = if update.nine_x_detail == Some(true) {
                true
            } else {
                update.allow_duplicates.unwrap_or(state.allow_duplicates)
            };
        }
        SessionEvent::MosaicGenerated(metadata) => {
            state.dzi_metadata = Some(metadata);
            state.has_mosaic = true;
            state.is_generating = false;
            state.step = STEP_RESULT;
        }
        SessionEvent::OperationFailed {
            kind,
            message,
            discarded_previews,
        } => {
            state.error = Some(message);
            match kind {
                OperationKind::UploadTarget => state.is_uploading_target = false,
                OperationKind::GenerateMosaic => state.is_generating = false,
                _ => {}
            }
            released = discarded_previews;
        }
        SessionEvent::TintPercentageSet(value) => state.tint_percentage = value,
        SessionEvent::TileSizeSet(value) => state.tile_size = value,
        SessionEvent::MaxRepeatsPerTileSet(value) => state.max_repeats_per_tile = value,
        SessionEvent::ColorModeSet(mode) => state.color_mode = mode,
        SessionEvent::ResolutionSet(resolution) => state.selected_resolution = resolution,
        SessionEvent::UseAllTilesSet(value) => state.use_all_tiles = value,
        SessionEvent::ManualModeSet(value) => state.manual_mode = value,
        SessionEvent::NineXDetailSet(enabled) => {
            state.nine_x_detail = enabled;
            if enabled {
                state.allow_duplicates = true;
            }
        }
    }

    released.retain(|handle| !handle.is_empty());
    Transition { state, released }
}

#[cfg(test)]
#[path = "tests/reducer_tests.rs"]
mod tests;
