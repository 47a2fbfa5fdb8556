use shared::{domain::Resolution, protocol::GenerateOptions};

use crate::state::SessionState;

/// Derives generation options from a state snapshot.
///
/// Outside manual mode the tile budget follows the analysis recommendation for
/// the selected tier, capped by the tiles actually uploaded; at the high tier
/// a surplus of tiles switches to using all of them. In manual mode only an
/// explicit "use all tiles" at the high tier is forwarded.
pub fn derive_generate_options(state: &SessionState) -> GenerateOptions {
    let resolution = state.selected_resolution;
    let mut options = GenerateOptions::new(resolution);
    options.nine_x_detail = Some(state.nine_x_detail);
    options.tint_percentage = Some(state.tint_percentage);
    options.tile_size = Some(state.tile_size);
    options.max_repeats_per_tile = Some(state.max_repeats_per_tile);
    options.color_mode = Some(state.color_mode);

    if !state.manual_mode {
        let recommended = state
            .image_analysis
            .as_ref()
            .and_then(|analysis| analysis.recommended_for(resolution));
        if let Some(recommended) = recommended {
            if resolution == Resolution::High && state.tile_count > recommended {
                options.use_all_tiles = Some(true);
            } else {
                options.exact_tile_count = Some(recommended.min(state.tile_count));
            }
        }
    } else if state.use_all_tiles && resolution == Resolution::High {
        options.use_all_tiles = Some(true);
    }

    options
}
