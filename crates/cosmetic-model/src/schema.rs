//! Serde mirror of the Bedrock geometry JSON schema
//!
//! Only the fields the engine consumes are declared; unknown fields are
//! ignored so newer format versions still load.

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct GeometryFile {
    #[serde(default)]
    pub format_version: Option<String>,
    #[serde(rename = "minecraft:geometry", default)]
    pub geometry: Vec<GeometryDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeometryDef {
    pub description: GeometryDescription,
    #[serde(default)]
    pub bones: Vec<BoneDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeometryDescription {
    pub identifier: String,
    #[serde(default = "default_texture_size")]
    pub texture_width: u32,
    #[serde(default = "default_texture_size")]
    pub texture_height: u32,
}

fn default_texture_size() -> u32 {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct BoneDef {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub pivot: [f32; 3],
    #[serde(default)]
    pub rotation: [f32; 3],
    #[serde(default)]
    pub mirror: bool,
    #[serde(default)]
    pub inflate: f32,
    #[serde(default)]
    pub cubes: Vec<CubeDef>,
    #[serde(default)]
    pub locators: BTreeMap<String, LocatorDef>,
    /// Which side of a multi-sided cosmetic the bone belongs to
    #[serde(default)]
    pub side: Option<crate::part::Side>,
    /// Counter-rotate against the parent chain every frame
    #[serde(default)]
    pub gimbal: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CubeDef {
    #[serde(default)]
    pub origin: [f32; 3],
    #[serde(default)]
    pub size: [f32; 3],
    #[serde(default)]
    pub uv: Option<UvDef>,
    #[serde(default)]
    pub inflate: Option<f32>,
    #[serde(default)]
    pub mirror: Option<bool>,
    #[serde(default)]
    pub pivot: Option<[f32; 3]>,
    #[serde(default)]
    pub rotation: Option<[f32; 3]>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UvDef {
    Box([f32; 2]),
    PerFace(FaceUvs),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FaceUvs {
    pub north: Option<FaceUv>,
    pub east: Option<FaceUv>,
    pub south: Option<FaceUv>,
    pub west: Option<FaceUv>,
    pub up: Option<FaceUv>,
    pub down: Option<FaceUv>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FaceUv {
    pub uv: [f32; 2],
    #[serde(default)]
    pub uv_size: [f32; 2],
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LocatorDef {
    Offset([f32; 3]),
    Full {
        offset: [f32; 3],
        #[serde(default)]
        rotation: [f32; 3],
    },
}

impl LocatorDef {
    pub fn offset(&self) -> [f32; 3] {
        match self {
            LocatorDef::Offset(offset) | LocatorDef::Full { offset, .. } => *offset,
        }
    }

    pub fn rotation(&self) -> [f32; 3] {
        match self {
            LocatorDef::Offset(_) => [0.0; 3],
            LocatorDef::Full { rotation, .. } => *rotation,
        }
    }
}
