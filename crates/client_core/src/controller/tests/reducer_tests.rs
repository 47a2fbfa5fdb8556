use super::*;
use shared::{
    domain::{ColorMode, DziMetadata, ImageAnalysis, Requirements, SessionId},
    protocol::{SettingsUpdate, TargetUploadResponse},
};

use crate::{preview::PreviewRegistry, types::UploadFile};

fn handles(registry: &mut PreviewRegistry, count: usize) -> Vec<PreviewHandle> {
    (0..count)
        .map(|index| {
            registry
                .create(&UploadFile::new(format!("tile-{index}.png"), vec![1]))
                .expect("preview")
        })
        .collect()
}

fn with_session() -> SessionState {
    SessionState {
        session_id: Some(SessionId::new("s-1")),
        ..SessionState::default()
    }
}

fn target_response(width: u32, height: u32) -> TargetUploadResponse {
    TargetUploadResponse {
        width,
        height,
        analysis: ImageAnalysis::default(),
    }
}

#[test]
fn session_id_is_established_only_once() {
    let first = reduce(SessionState::default(), SessionEvent::SessionCreated(SessionId::new("a")));
    let second = reduce(first.state, SessionEvent::SessionCreated(SessionId::new("b")));
    assert_eq!(second.state.session_id, Some(SessionId::new("a")));
}

#[test]
fn target_upload_resets_step_to_two_even_from_later_steps() {
    let mut state = with_session();
    state.step = 5;
    state.is_uploading_target = true;

    let next = reduce(
        state,
        SessionEvent::TargetUploaded {
            preview: PreviewHandle::empty(),
            response: target_response(4000, 2500),
        },
    )
    .state;

    assert_eq!(next.step, 2);
    assert_eq!(next.desired_width, 4000);
    assert_eq!(next.desired_height, 2500);
    assert_eq!(
        next.target_image_dimensions,
        Some(Dimensions {
            width: 4000,
            height: 2500
        })
    );
    assert!(!next.is_uploading_target);
    assert_eq!(next.target_image_preview, Some(PreviewHandle::empty()));
}

#[test]
fn new_target_upload_releases_superseded_preview() {
    let mut registry = PreviewRegistry::new();
    let mut previews = handles(&mut registry, 2);
    let second = previews.pop().expect("second");
    let first = previews.pop().expect("first");

    let mut state = with_session();
    state.target_image_preview = Some(first.clone());
    let transition = reduce(
        state,
        SessionEvent::TargetUploaded {
            preview: second.clone(),
            response: target_response(10, 10),
        },
    );

    assert_eq!(transition.released, vec![first]);
    assert_eq!(transition.state.target_image_preview, Some(second));
}

#[test]
fn dimensions_and_tiles_never_decrease_step() {
    for before in 1..=5u8 {
        let mut state = with_session();
        state.step = before;
        let after_dimensions = reduce(
            state.clone(),
            SessionEvent::DimensionsSet {
                width: 1200,
                height: 800,
                requirements: Requirements::default(),
            },
        )
        .state;
        assert_eq!(after_dimensions.step, before.max(3));

        let after_tiles = reduce(
            state,
            SessionEvent::TilesUploaded {
                total_tiles: 4,
                previews: Vec::new(),
            },
        )
        .state;
        assert_eq!(after_tiles.step, before.max(3));
    }
}

#[test]
fn tile_previews_keep_most_recent_fifty() {
    let mut registry = PreviewRegistry::new();
    let existing = handles(&mut registry, 40);
    let incoming = handles(&mut registry, 20);

    let mut state = with_session();
    state.tile_previews = existing.clone();
    let transition = reduce(
        state,
        SessionEvent::TilesUploaded {
            total_tiles: 60,
            previews: incoming.clone(),
        },
    );

    assert_eq!(transition.state.tile_count, 60);
    assert_eq!(transition.state.tile_previews.len(), 50);
    assert_eq!(transition.released, existing[..10].to_vec());
    assert_eq!(transition.state.tile_previews[..30], existing[10..]);
    assert_eq!(transition.state.tile_previews[30..], incoming[..]);
}

#[test]
fn clearing_tiles_releases_every_preview() {
    let mut registry = PreviewRegistry::new();
    let previews = handles(&mut registry, 3);
    let mut state = with_session();
    state.tile_count = 3;
    state.tile_previews = previews.clone();

    let transition = reduce(state, SessionEvent::TilesCleared);

    assert_eq!(transition.state.tile_count, 0);
    assert!(transition.state.tile_previews.is_empty());
    assert_eq!(transition.released, previews);
}

#[test]
fn enabling_detail_mode_in_settings_forces_duplicates() {
    let mut state = with_session();
    state.allow_duplicates = false;
    let update = SettingsUpdate {
        nine_x_detail: Some(true),
        allow_duplicates: Some(false),
        tile_size: Some(20),
        ..SettingsUpdate::default()
    };

    let next = reduce(state, SessionEvent::SettingsApplied(update)).state;

    assert!(next.nine_x_detail);
    assert!(next.allow_duplicates);
    assert_eq!(next.tile_size, 20);
}

#[test]
fn settings_without_detail_mode_take_provided_duplicates_or_keep_current() {
    let state = with_session();
    let next = reduce(
        state,
        SessionEvent::SettingsApplied(SettingsUpdate {
            allow_duplicates: Some(false),
            ..SettingsUpdate::default()
        }),
    )
    .state;
    assert!(!next.allow_duplicates);

    let next = reduce(
        next,
        SessionEvent::SettingsApplied(SettingsUpdate {
            color_mode: Some(ColorMode::Tint),
            nine_x_detail: Some(false),
            ..SettingsUpdate::default()
        }),
    )
    .state;
    assert!(!next.allow_duplicates);
    assert_eq!(next.color_mode, ColorMode::Tint);
}

#[test]
fn detail_mode_setter_only_forces_duplicates_when_enabling() {
    let mut state = with_session();
    state.allow_duplicates = false;

    let disabled = reduce(state, SessionEvent::NineXDetailSet(false)).state;
    assert!(!disabled.allow_duplicates);

    let enabled = reduce(disabled, SessionEvent::NineXDetailSet(true)).state;
    assert!(enabled.allow_duplicates);

    let disabled_again = reduce(enabled, SessionEvent::NineXDetailSet(false)).state;
    assert!(disabled_again.allow_duplicates);
    assert!(!disabled_again.nine_x_detail);
}

#[test]
fn starting_an_operation_clears_error_except_for_tile_clearing() {
    let mut state = with_session();
    state.error = Some("Failed to clear tiles".to_string());

    let unchanged = reduce(state, SessionEvent::OperationStarted(OperationKind::ClearTiles)).state;
    assert_eq!(unchanged.error.as_deref(), Some("Failed to clear tiles"));

    let cleared = reduce(
        unchanged,
        SessionEvent::OperationStarted(OperationKind::GenerateMosaic),
    )
    .state;
    assert_eq!(cleared.error, None);
    assert!(cleared.is_generating);
}

#[test]
fn failures_clear_busy_flags_and_release_discarded_previews() {
    let mut registry = PreviewRegistry::new();
    let discarded = handles(&mut registry, 1);
    let mut state = with_session();
    state.is_uploading_target = true;
    state.step = 3;

    let transition = reduce(
        state,
        SessionEvent::failed(OperationKind::UploadTarget)
            .with_discarded_previews(discarded.clone()),
    );

    assert!(!transition.state.is_uploading_target);
    assert_eq!(transition.state.step, 3);
    assert_eq!(transition.state.target_image_preview, None);
    assert_eq!(
        transition.state.error.as_deref(),
        Some("Failed to upload target image. Please try a different image format.")
    );
    assert_eq!(transition.released, discarded);
}

#[test]
fn generation_success_reaches_final_step() {
    let mut state = with_session();
    state.is_generating = true;
    let metadata = DziMetadata(serde_json::json!({
        "Image": { "TileSize": 256, "Size": { "Width": 9000, "Height": 6000 } }
    }));

    let next = reduce(state, SessionEvent::MosaicGenerated(metadata.clone())).state;

    assert_eq!(next.step, 5);
    assert!(next.has_mosaic);
    assert!(!next.is_generating);
    assert_eq!(next.dzi_metadata, Some(metadata));
}

#[test]
fn pure_setters_replace_exactly_their_field() {
    let base = with_session();
    let next = reduce(base.clone(), SessionEvent::TileSizeSet(32)).state;
    assert_eq!(
        next,
        SessionState {
            tile_size: 32,
            ..base.clone()
        }
    );

    let next = reduce(
        base.clone(),
        SessionEvent::ResolutionSet(shared::domain::Resolution::High),
    )
    .state;
    assert_eq!(
        next,
        SessionState {
            selected_resolution: shared::domain::Resolution::High,
            ..base
        }
    );
}
