use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Opaque session identifier issued by the mosaic service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    Low,
    High,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Low => "low",
            Resolution::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    #[default]
    Blend,
    Tint,
    Original,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Analysis of the target image computed by the service.
///
/// Only the per-tier tile recommendation is interpreted locally; every other
/// field is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    #[serde(default)]
    pub recommended_tiles: BTreeMap<String, u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ImageAnalysis {
    pub fn recommended_for(&self, resolution: Resolution) -> Option<u32> {
        self.recommended_tiles.get(resolution.as_str()).copied()
    }
}

/// Constraints computed by the service once output dimensions are known.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Requirements(pub serde_json::Value);

/// Deep-zoom description of a generated mosaic, kept exactly as the service
/// returned it for the viewer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DziMetadata(pub serde_json::Value);
