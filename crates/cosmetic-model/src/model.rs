//! Loading Bedrock geometry into a bone tree

use crate::bone::{Bone, BoneId, BoneTree};
use crate::diagnostic::Diagnostics;
use crate::error::{ModelError, Result};
use crate::geometry::{Cube, CubeParams, CubeUv, UvRect, to_model_point, to_model_rotation};
use crate::part::{AvatarPart, CosmeticSlot};
use crate::schema::{BoneDef, CubeDef, FaceUv, GeometryDef, GeometryFile, UvDef};
use glam::{Vec2, Vec3};
use log::debug;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Prefix of bones that only describe bounding boxes
pub const BOUNDING_BOX_PREFIX: &str = "bbox_";

/// Options applied while loading geometry
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Slot the cosmetic is worn in, which determines the extra inflate
    pub slot: Option<CosmeticSlot>,
    /// Overrides the texture size declared by the geometry
    pub texture_size: Option<[u32; 2]>,
    /// Identifier of the geometry to load; the first one when unset
    pub geometry: Option<String>,
}

/// A labelled box from a `bbox_*` bone, in model space
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    /// Bone name without the `bbox_` prefix
    pub name: String,
    /// Lowest corner
    pub min: Vec3,
    /// Highest corner
    pub max: Vec3,
}

/// A named attachment point on a bone
#[derive(Debug, Clone, PartialEq)]
pub struct LocatorPoint {
    /// Locator name as written in the geometry
    pub name: String,
    /// Bone the locator moves with
    pub bone: BoneId,
    /// Model space position at rest
    pub offset: Vec3,
    /// Radians
    pub rotation: Vec3,
}

/// Loaded cosmetic geometry
#[derive(Debug, Clone)]
pub struct Model {
    /// Geometry identifier, e.g. `geometry.cosmetic.halo`
    pub identifier: String,
    /// Texture size in pixels
    pub texture_size: Vec2,
    tree: BoneTree,
    bounding_boxes: Vec<BoundingBox>,
    locators: Vec<LocatorPoint>,
    diagnostics: Diagnostics,
}

impl Model {
    pub fn from_json(json: &str, options: &LoadOptions) -> Result<Self> {
        let file: GeometryFile = serde_json::from_str(json)?;
        Self::from_file(&file, options)
    }

    pub fn from_file(file: &GeometryFile, options: &LoadOptions) -> Result<Self> {
        let geometry = match &options.geometry {
            Some(identifier) => file
                .geometry
                .iter()
                .find(|g| &g.description.identifier == identifier)
                .ok_or_else(|| ModelError::MissingGeometry(identifier.clone()))?,
            None => file.geometry.first().ok_or(ModelError::NoGeometry)?,
        };
        Self::from_geometry(geometry, options)
    }

    pub fn from_geometry(geometry: &GeometryDef, options: &LoadOptions) -> Result<Self> {
        let [width, height] = options.texture_size.unwrap_or([
            geometry.description.texture_width,
            geometry.description.texture_height,
        ]);
        if width == 0 || height == 0 {
            return Err(ModelError::InvalidTextureSize { width, height });
        }

        let mut builder = Builder {
            tree: BoneTree::new(),
            bounding_boxes: Vec::new(),
            locators: Vec::new(),
            diagnostics: Diagnostics::new(),
            texture_size: Vec2::new(width as f32, height as f32),
            extra_inflate: options.slot.map_or(0.0, CosmeticSlot::extra_inflate),
        };
        builder.build(&geometry.bones);

        let Builder {
            mut tree,
            bounding_boxes,
            locators,
            diagnostics,
            texture_size,
            ..
        } = builder;
        tree.update_pose_flags();

        debug!(
            "Loaded {}: {} bones, {} bounding boxes, {} locators",
            geometry.description.identifier,
            tree.len() - 1,
            bounding_boxes.len(),
            locators.len()
        );

        Ok(Self {
            identifier: geometry.description.identifier.clone(),
            texture_size,
            tree,
            bounding_boxes,
            locators,
            diagnostics,
        })
    }

    pub fn tree(&self) -> &BoneTree {
        &self.tree
    }

    pub fn bounding_boxes(&self) -> &[BoundingBox] {
        &self.bounding_boxes
    }

    pub fn locators(&self) -> &[LocatorPoint] {
        &self.locators
    }

    pub fn locator(&self, name: &str) -> Option<&LocatorPoint> {
        self.locators.iter().find(|l| l.name == name)
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Avatar parts some bone of this model maps to
    pub fn mapped_parts(&self) -> impl Iterator<Item = AvatarPart> + '_ {
        AvatarPart::ALL
            .into_iter()
            .filter(|part| self.tree.bone_for_part(*part).is_some())
    }
}

struct Builder {
    tree: BoneTree,
    bounding_boxes: Vec<BoundingBox>,
    locators: Vec<LocatorPoint>,
    diagnostics: Diagnostics,
    texture_size: Vec2,
    extra_inflate: f32,
}

impl Builder {
    fn build(&mut self, bones: &[BoneDef]) {
        let mut pending = Vec::new();
        let mut names = HashSet::new();

        for bone in bones {
            if !names.insert(bone.name.as_str()) {
                self.diagnostics
                    .warning(&bone.name, "duplicate bone name, later definition dropped");
                continue;
            }
            if let Some(label) = bone.name.strip_prefix(BOUNDING_BOX_PREFIX) {
                self.add_bounding_box(label, bone);
                continue;
            }
            pending.push(bone);
        }

        // Content may list children before their parents
        let mut inserted: HashMap<&str, BoneId> = HashMap::new();
        loop {
            let before = pending.len();
            let mut waiting = Vec::new();
            for bone in pending {
                let parent = match bone.parent.as_deref() {
                    None => BoneId::ROOT,
                    Some(name) if !names.contains(name) || name.starts_with(BOUNDING_BOX_PREFIX) => {
                        self.diagnostics.warning(
                            &bone.name,
                            format!("unknown parent '{name}', attached to the root"),
                        );
                        BoneId::ROOT
                    }
                    Some(name) => match inserted.get(name) {
                        Some(id) => *id,
                        None => {
                            waiting.push(bone);
                            continue;
                        }
                    },
                };
                if let Some(id) = self.add_bone(parent, bone) {
                    inserted.insert(bone.name.as_str(), id);
                }
            }
            pending = waiting;
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }

        for bone in pending {
            self.diagnostics
                .error(&bone.name, "bone is part of a parent cycle and was dropped");
        }
    }

    fn add_bone(&mut self, parent: BoneId, def: &BoneDef) -> Option<BoneId> {
        let mut bone = Bone::new(def.name.clone())
            .with_pivot(to_model_point(Vec3::from(def.pivot)))
            .with_rotation(to_model_rotation(Vec3::from(def.rotation)))
            .with_part(AvatarPart::from_bone_name(&def.name))
            .with_gimbal(def.gimbal);
        bone.mirror = def.mirror;
        bone.side = def.side;
        let id = self.tree.add(parent, bone)?;

        for (index, cube_def) in def.cubes.iter().enumerate() {
            let cube = self.build_cube(def, cube_def);
            let rotation = cube_def.rotation.map(Vec3::from).unwrap_or(Vec3::ZERO);
            if rotation == Vec3::ZERO {
                if let Some(bone) = self.tree.get_mut(id) {
                    bone.cubes.push(cube);
                }
                continue;
            }

            // Rotated cubes get a bone of their own turning about the cube pivot
            let center = Vec3::from(cube_def.origin) + Vec3::from(cube_def.size) / 2.0;
            let pivot = cube_def.pivot.map_or(center, Vec3::from);
            let mut holder = Bone::new(format!("{}#cube{index}", def.name))
                .with_pivot(to_model_point(pivot))
                .with_rotation(to_model_rotation(rotation));
            holder.synthetic = true;
            holder.side = def.side;
            holder.cubes.push(cube);
            self.tree.add(id, holder);
        }

        for (name, locator) in &def.locators {
            self.locators.push(LocatorPoint {
                name: name.clone(),
                bone: id,
                offset: to_model_point(Vec3::from(locator.offset())),
                rotation: to_model_rotation(Vec3::from(locator.rotation())),
            });
        }

        Some(id)
    }

    fn build_cube(&self, bone: &BoneDef, cube: &CubeDef) -> Cube {
        let uv = match &cube.uv {
            None => CubeUv::Box(Vec2::ZERO),
            Some(UvDef::Box(anchor)) => CubeUv::Box(Vec2::from(*anchor)),
            Some(UvDef::PerFace(faces)) => {
                let rect = |face: &Option<FaceUv>| {
                    face.map(|f| UvRect::new(Vec2::from(f.uv), Vec2::from(f.uv_size)))
                };
                CubeUv::PerFace([
                    rect(&faces.north),
                    rect(&faces.east),
                    rect(&faces.south),
                    rect(&faces.west),
                    rect(&faces.up),
                    rect(&faces.down),
                ])
            }
        };

        Cube::new(&CubeParams {
            origin: Vec3::from(cube.origin),
            size: Vec3::from(cube.size),
            inflate: cube.inflate.unwrap_or(bone.inflate) + self.extra_inflate,
            mirror: cube.mirror.unwrap_or(bone.mirror),
            uv,
            texture_size: self.texture_size,
        })
    }

    fn add_bounding_box(&mut self, label: &str, bone: &BoneDef) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for cube in &bone.cubes {
            let low = Vec3::from(cube.origin);
            let high = low + Vec3::from(cube.size);
            for corner in [low, high] {
                let point = to_model_point(corner);
                min = min.min(point);
                max = max.max(point);
            }
        }
        if bone.cubes.is_empty() {
            self.diagnostics
                .warning(&bone.name, "bounding box bone has no cubes");
            return;
        }
        self.bounding_boxes.push(BoundingBox {
            name: label.to_string(),
            min,
            max,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Severity;
    use pretty_assertions::assert_eq;

    fn geometry(bones: &str) -> String {
        format!(
            r#"{{
                "format_version": "1.12.0",
                "minecraft:geometry": [{{
                    "description": {{ "identifier": "geometry.test", "texture_width": 64, "texture_height": 32 }},
                    "bones": {bones}
                }}]
            }}"#
        )
    }

    #[test]
    fn test_children_before_parents() {
        let json = geometry(
            r#"[
                { "name": "tassel", "parent": "cape", "pivot": [0, 10, 3] },
                { "name": "cape", "parent": "body", "pivot": [0, 24, 2] },
                { "name": "body", "pivot": [0, 24, 0] }
            ]"#,
        );
        let model = Model::from_json(&json, &LoadOptions::default()).unwrap();
        let tree = model.tree();
        let tassel = tree.find("tassel").unwrap();
        let cape = tree.find("cape").unwrap();
        assert_eq!(tree[tassel].parent, Some(cape));
        assert_eq!(tree[cape].part, Some(AvatarPart::Cape));
        assert_eq!(tree[cape].pivot, Vec3::new(0.0, 0.0, 2.0));
        assert!(model.diagnostics().is_empty());
    }

    #[test]
    fn test_unknown_parent_attaches_to_root() {
        let json = geometry(r#"[{ "name": "orphan", "parent": "nowhere" }]"#);
        let model = Model::from_json(&json, &LoadOptions::default()).unwrap();
        let orphan = model.tree().find("orphan").unwrap();
        assert_eq!(model.tree()[orphan].parent, Some(BoneId::ROOT));
        assert_eq!(model.diagnostics().len(), 1);
    }

    #[test]
    fn test_parent_cycle_is_dropped() {
        let json = geometry(
            r#"[
                { "name": "a", "parent": "b" },
                { "name": "b", "parent": "a" },
                { "name": "c" }
            ]"#,
        );
        let model = Model::from_json(&json, &LoadOptions::default()).unwrap();
        assert!(model.tree().find("a").is_none());
        assert!(model.tree().find("c").is_some());
        assert_eq!(model.diagnostics().len(), 2);
        assert!(model.diagnostics().iter().all(|d| d.severity == Severity::Error));
    }

    #[test]
    fn test_bounding_boxes_are_not_rendered() {
        let json = geometry(
            r#"[
                { "name": "head", "pivot": [0, 24, 0] },
                { "name": "bbox_hat", "cubes": [{ "origin": [-4, 24, -4], "size": [8, 4, 8] }] }
            ]"#,
        );
        let model = Model::from_json(&json, &LoadOptions::default()).unwrap();
        assert!(model.tree().find("bbox_hat").is_none());
        assert_eq!(
            model.bounding_boxes(),
            &[BoundingBox {
                name: "hat".into(),
                min: Vec3::new(-4.0, -4.0, -4.0),
                max: Vec3::new(4.0, 0.0, 4.0),
            }]
        );
    }

    #[test]
    fn test_rotated_cube_gets_synthetic_bone() {
        let json = geometry(
            r#"[{
                "name": "wing",
                "pivot": [0, 24, 0],
                "cubes": [
                    { "origin": [0, 20, 0], "size": [2, 2, 2] },
                    { "origin": [0, 20, 0], "size": [2, 2, 2], "pivot": [1, 21, 1], "rotation": [0, 0, 45] }
                ]
            }]"#,
        );
        let model = Model::from_json(&json, &LoadOptions::default()).unwrap();
        let tree = model.tree();
        let wing = tree.find("wing").unwrap();
        assert_eq!(tree[wing].cubes.len(), 1);
        let holder = tree[wing].children[0];
        assert!(tree[holder].synthetic);
        assert_eq!(tree[holder].pivot, Vec3::new(1.0, 3.0, 1.0));
        assert!((tree[holder].rotation.z + 45f32.to_radians()).abs() < 1e-6);
        assert_eq!(tree[holder].cubes.len(), 1);
    }

    #[test]
    fn test_slot_inflate_is_added() {
        let json = geometry(
            r#"[{ "name": "hat", "cubes": [{ "origin": [0, 0, 0], "size": [1, 1, 1], "inflate": 0.5 }] }]"#,
        );
        let options = LoadOptions {
            slot: Some(CosmeticSlot::Hat),
            ..LoadOptions::default()
        };
        let model = Model::from_json(&json, &options).unwrap();
        let hat = model.tree().find("hat").unwrap();
        let cube = &model.tree()[hat].cubes[0];
        let inflate = 0.5 + CosmeticSlot::Hat.extra_inflate();
        assert!((cube.min.x + inflate).abs() < 1e-6);
    }

    #[test]
    fn test_locators_are_converted() {
        let json = geometry(r#"[{ "name": "head", "locators": { "tip": [0, 34, 0] } }]"#);
        let model = Model::from_json(&json, &LoadOptions::default()).unwrap();
        let tip = model.locator("tip").unwrap();
        assert_eq!(tip.offset, Vec3::new(0.0, -10.0, 0.0));
        assert_eq!(Some(tip.bone), model.tree().find("head"));
    }

    #[test]
    fn test_missing_geometry_errors() {
        let json = geometry("[]");
        let options = LoadOptions {
            geometry: Some("geometry.other".into()),
            ..LoadOptions::default()
        };
        assert!(matches!(
            Model::from_json(&json, &options),
            Err(ModelError::MissingGeometry(_))
        ));
        assert!(matches!(
            Model::from_json(r#"{"minecraft:geometry": []}"#, &LoadOptions::default()),
            Err(ModelError::NoGeometry)
        ));
        assert!(matches!(
            Model::from_json("not json", &LoadOptions::default()),
            Err(ModelError::Json(_))
        ));
    }
}
