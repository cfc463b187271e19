//! Cosmetic geometry, avatar pose sharing and keyframe animation
//!
//! This crate loads Bedrock-style geometry into a [`BoneTree`], animates it
//! and lets independently loaded cosmetics follow one avatar pose.
//!
//! # Pose sharing
//!
//! ```
//! use cosmetic_model::{LoadOptions, Model, Pose, PoseState, apply_pose, retrieve_pose};
//!
//! let json = r#"{
//!     "minecraft:geometry": [{
//!         "description": { "identifier": "geometry.cape" },
//!         "bones": [{ "name": "cape", "pivot": [0, 24, 2] }]
//!     }]
//! }"#;
//! let model = Model::from_json(json, &LoadOptions::default()).unwrap();
//! let mut state = PoseState::new(model.tree());
//!
//! apply_pose(model.tree(), &mut state, &Pose::neutral());
//! let pose = retrieve_pose(model.tree(), &state, &Pose::neutral());
//! assert!(pose.iter().all(|(_, part)| part.is_rigid()));
//! ```
//!
//! # Coordinates
//!
//! Content uses pixels with Y up and the feet at zero. Everything inside the
//! crate is in model space: pixels with Y down and the neck at
//! zero. See [`geometry::to_model_point`].

pub mod animation;
pub mod bone;
pub mod diagnostic;
pub mod error;
pub mod geometry;
pub mod locator;
pub mod model;
pub mod part;
pub mod pose;
pub mod render;
pub mod schema;
pub mod sounds;
pub mod transform;

pub use animation::{AnimationEvent, AnimationSet, Animator};
pub use bone::{Bone, BoneId, BoneTree};
pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use error::{ModelError, Result};
pub use geometry::{Cube, Face, FaceDirection, Vertex};
pub use locator::{BoneLocator, BoneLocators, Locator, OffsetLocator, StaticLocator};
pub use model::{BoundingBox, LoadOptions, LocatorPoint, Model};
pub use part::{ArmorSlots, AvatarPart, AvatarParts, CosmeticSlot, Side};
pub use pose::{BoneState, Part, Pose, PoseState, apply_pose, retrieve_pose};
pub use render::{RenderParams, Visibility, VertexSink, render};
pub use sounds::SoundDefinitions;
pub use transform::BoneTransforms;
