use serde::{Deserialize, Serialize};

use crate::domain::{ColorMode, ImageAnalysis, Resolution, SessionId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub session_id: SessionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetUploadResponse {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub analysis: ImageAnalysis,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DimensionsRequest {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileUploadResponse {
    pub total_tiles: u32,
}

/// Partial update of generation settings.
///
/// `nine_x_detail` is a local-only preference: it is applied to session state
/// but never forwarded to the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_duplicates: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_tinting: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint_percentage: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_repeats_per_tile: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_mode: Option<ColorMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nine_x_detail: Option<bool>,
}

impl SettingsUpdate {
    /// Fields the service understands, i.e. everything except `nine_x_detail`.
    pub fn remote_subset(&self) -> RemoteSettings {
        RemoteSettings {
            allow_duplicates: self.allow_duplicates,
            allow_tinting: self.allow_tinting,
            tint_percentage: self.tint_percentage,
            tile_size: self.tile_size,
            max_repeats_per_tile: self.max_repeats_per_tile,
            color_mode: self.color_mode,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_duplicates: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_tinting: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint_percentage: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_repeats_per_tile: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_mode: Option<ColorMode>,
}

impl RemoteSettings {
    pub fn is_empty(&self) -> bool {
        self.allow_duplicates.is_none()
            && self.allow_tinting.is_none()
            && self.tint_percentage.is_none()
            && self.tile_size.is_none()
            && self.max_repeats_per_tile.is_none()
            && self.color_mode.is_none()
    }
}

/// Options sent with a generation request. Absent options are omitted from
/// the payload so the service falls back to its own defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOptions {
    pub resolution: Resolution,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_all_tiles: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact_tile_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nine_x_detail: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tint_percentage: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_repeats_per_tile: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_mode: Option<ColorMode>,
}

impl GenerateOptions {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            use_all_tiles: None,
            exact_tile_count: None,
            nine_x_detail: None,
            tint_percentage: None,
            tile_size: None,
            max_repeats_per_tile: None,
            color_mode: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_subset_drops_detail_flag() {
        let update = SettingsUpdate {
            nine_x_detail: Some(true),
            ..SettingsUpdate::default()
        };
        assert!(update.remote_subset().is_empty());
    }

    #[test]
    fn remote_settings_serialize_only_present_fields() {
        let update = SettingsUpdate {
            tile_size: Some(16),
            color_mode: Some(ColorMode::Tint),
            nine_x_detail: Some(false),
            ..SettingsUpdate::default()
        };
        let json = serde_json::to_value(update.remote_subset()).expect("serialize");
        assert_eq!(json, serde_json::json!({ "tileSize": 16, "colorMode": "tint" }));
    }

    #[test]
    fn generate_options_omit_absent_directives() {
        let mut options = GenerateOptions::new(Resolution::High);
        options.use_all_tiles = Some(true);
        let json = serde_json::to_value(&options).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({ "resolution": "high", "useAllTiles": true })
        );
    }

    #[test]
    fn target_upload_response_reads_recommendations() {
        let body = r##"{
            "width": 4000,
            "height": 3000,
            "analysis": { "recommendedTiles": { "low": 20, "high": 80 }, "dominantColor": "#aabbcc" }
        }"##;
        let parsed: TargetUploadResponse = serde_json::from_str(body).expect("parse");
        assert_eq!(parsed.analysis.recommended_for(Resolution::Low), Some(20));
        assert_eq!(parsed.analysis.recommended_for(Resolution::High), Some(80));
        assert!(parsed.analysis.extra.contains_key("dominantColor"));
    }
}
