//! Avatar parts, armor coverage and equipment slots
//!
//! All positions are in model space: pixel units, Y pointing down, origin at
//! the neck (see [`crate::geometry`] for the conversion from content
//! coordinates).

use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Armor slots whose equipment covers an avatar part
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ArmorSlots: u8 {
        const HEAD = 0x01;
        const CHEST = 0x02;
        const LEGS = 0x04;
        const FEET = 0x08;
    }
}

bitflags! {
    /// A set of [`AvatarPart`]s
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AvatarParts: u16 {
        const HEAD = 1 << 0;
        const BODY = 1 << 1;
        const RIGHT_ARM = 1 << 2;
        const LEFT_ARM = 1 << 3;
        const RIGHT_LEG = 1 << 4;
        const LEFT_LEG = 1 << 5;
        const RIGHT_SHOULDER_ENTITY = 1 << 6;
        const LEFT_SHOULDER_ENTITY = 1 << 7;
        const RIGHT_WING = 1 << 8;
        const LEFT_WING = 1 << 9;
        const CAPE = 1 << 10;
    }
}

/// A semantically addressable location on the avatar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvatarPart {
    Head,
    Body,
    RightArm,
    LeftArm,
    RightLeg,
    LeftLeg,
    RightShoulderEntity,
    LeftShoulderEntity,
    RightWing,
    LeftWing,
    Cape,
}

impl AvatarPart {
    pub const COUNT: usize = 11;

    pub const ALL: [AvatarPart; Self::COUNT] = [
        AvatarPart::Head,
        AvatarPart::Body,
        AvatarPart::RightArm,
        AvatarPart::LeftArm,
        AvatarPart::RightLeg,
        AvatarPart::LeftLeg,
        AvatarPart::RightShoulderEntity,
        AvatarPart::LeftShoulderEntity,
        AvatarPart::RightWing,
        AvatarPart::LeftWing,
        AvatarPart::Cape,
    ];

    /// Stable index into per-part tables
    pub fn index(self) -> usize {
        self as usize
    }

    /// Resolve a bone name to the part it represents.
    ///
    /// Matching ignores case and underscores, so `rightArm`, `right_arm` and
    /// `RIGHTARM` all resolve to [`AvatarPart::RightArm`].
    pub fn from_bone_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let part = match normalized.as_str() {
            "head" => AvatarPart::Head,
            "body" => AvatarPart::Body,
            "rightarm" => AvatarPart::RightArm,
            "leftarm" => AvatarPart::LeftArm,
            "rightleg" => AvatarPart::RightLeg,
            "leftleg" => AvatarPart::LeftLeg,
            "rightshoulderentity" => AvatarPart::RightShoulderEntity,
            "leftshoulderentity" => AvatarPart::LeftShoulderEntity,
            "rightwing" => AvatarPart::RightWing,
            "leftwing" => AvatarPart::LeftWing,
            "cape" => AvatarPart::Cape,
            _ => return None,
        };
        Some(part)
    }

    /// Pivot of the part on the unposed avatar.
    ///
    /// Head and body share one profile; every limb, the cape and the wings
    /// have their own.
    pub fn default_pivot(self) -> Vec3 {
        match self {
            AvatarPart::Head | AvatarPart::Body => Vec3::ZERO,
            AvatarPart::RightArm => Vec3::new(-5.0, 2.0, 0.0),
            AvatarPart::LeftArm => Vec3::new(5.0, 2.0, 0.0),
            AvatarPart::RightLeg => Vec3::new(-1.9, 12.0, 0.0),
            AvatarPart::LeftLeg => Vec3::new(1.9, 12.0, 0.0),
            AvatarPart::RightShoulderEntity => Vec3::new(-6.4, 0.0, 0.0),
            AvatarPart::LeftShoulderEntity => Vec3::new(6.4, 0.0, 0.0),
            AvatarPart::RightWing => Vec3::new(-5.0, 0.0, 2.0),
            AvatarPart::LeftWing => Vec3::new(5.0, 0.0, 2.0),
            AvatarPart::Cape => Vec3::new(0.0, 0.0, 2.0),
        }
    }

    /// Armor slots that cover this part when equipped
    pub fn armor_slots(self) -> ArmorSlots {
        match self {
            AvatarPart::Head => ArmorSlots::HEAD,
            AvatarPart::Body => ArmorSlots::CHEST | ArmorSlots::LEGS,
            AvatarPart::RightArm | AvatarPart::LeftArm => ArmorSlots::CHEST,
            AvatarPart::RightLeg | AvatarPart::LeftLeg => ArmorSlots::LEGS | ArmorSlots::FEET,
            AvatarPart::RightShoulderEntity
            | AvatarPart::LeftShoulderEntity
            | AvatarPart::RightWing
            | AvatarPart::LeftWing
            | AvatarPart::Cape => ArmorSlots::CHEST,
        }
    }

    pub fn as_set(self) -> AvatarParts {
        AvatarParts::from_bits_truncate(1 << self.index())
    }
}

impl fmt::Display for AvatarPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AvatarPart::Head => "head",
            AvatarPart::Body => "body",
            AvatarPart::RightArm => "right_arm",
            AvatarPart::LeftArm => "left_arm",
            AvatarPart::RightLeg => "right_leg",
            AvatarPart::LeftLeg => "left_leg",
            AvatarPart::RightShoulderEntity => "right_shoulder_entity",
            AvatarPart::LeftShoulderEntity => "left_shoulder_entity",
            AvatarPart::RightWing => "right_wing",
            AvatarPart::LeftWing => "left_wing",
            AvatarPart::Cape => "cape",
        };
        f.write_str(name)
    }
}

impl AvatarParts {
    pub fn contains_part(self, part: AvatarPart) -> bool {
        self.contains(part.as_set())
    }

    /// Parts not covered by any of the worn armor slots
    pub fn uncovered_by(worn: ArmorSlots) -> Self {
        AvatarPart::ALL
            .into_iter()
            .filter(|part| !part.armor_slots().intersects(worn))
            .fold(AvatarParts::empty(), |set, part| set | part.as_set())
    }
}

impl From<AvatarPart> for AvatarParts {
    fn from(part: AvatarPart) -> Self {
        part.as_set()
    }
}

/// Which side of a multi-sided cosmetic a bone belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// Equipment slot a cosmetic is worn in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CosmeticSlot {
    Pants,
    Top,
    Head,
    Face,
    Back,
    Hat,
    FullBody,
    Accessory,
    Arms,
    Shoes,
    Cape,
    Wings,
    Effect,
    Emote,
}

/// Inflate added per layering group
pub const INFLATE_STEP: f32 = 0.01;

impl CosmeticSlot {
    /// Layering group, lowest drawn innermost
    pub fn layer_group(self) -> Option<u8> {
        match self {
            CosmeticSlot::Pants => Some(1),
            CosmeticSlot::Top | CosmeticSlot::Head | CosmeticSlot::Face | CosmeticSlot::Back => {
                Some(2)
            }
            CosmeticSlot::Hat | CosmeticSlot::FullBody => Some(3),
            CosmeticSlot::Accessory | CosmeticSlot::Arms | CosmeticSlot::Shoes => Some(4),
            CosmeticSlot::Cape | CosmeticSlot::Wings | CosmeticSlot::Effect | CosmeticSlot::Emote => {
                None
            }
        }
    }

    /// Extra inflate applied to every cube so layered cosmetics do not z-fight
    pub fn extra_inflate(self) -> f32 {
        self.layer_group()
            .map_or(0.0, |group| f32::from(group) * INFLATE_STEP)
    }
}
