//! Camera-facing quads
//!
//! A billboard quad lies in its local XY plane with the normal along +Z.
//! [`facing_rotation`] turns a [`FacingMode`] into the rotation that places
//! that quad in the world for the current camera.

use crate::render::Camera;
use cosmetic_molang::{Expression, Runtime, Vec3Expression};
use glam::{Mat3, Quat, Vec2, Vec3, Vec4};
use serde::Deserialize;
use serde::de::Deserializer;
use std::f32::consts::FRAC_PI_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Parallel to the image plane
    #[default]
    RotateXyz,
    /// Parallel to the image plane, yaw only
    RotateY,
    /// Normal points at the camera
    LookatXyz,
    /// Normal points at the camera, yaw only
    LookatY,
    /// Up axis follows the direction, turned about it to face the camera
    LookatDirection,
    DirectionX,
    DirectionY,
    DirectionZ,
    /// Locked to the emitter's XY plane
    EmitterTransformXy,
    EmitterTransformXz,
    EmitterTransformYz,
}

impl FacingMode {
    /// Whether the mode needs a per-particle direction
    pub fn uses_direction(self) -> bool {
        matches!(
            self,
            FacingMode::LookatDirection
                | FacingMode::DirectionX
                | FacingMode::DirectionY
                | FacingMode::DirectionZ
        )
    }
}

/// Where direction-based facing modes get their direction from
#[derive(Debug, Clone, PartialEq)]
pub enum DirectionSource {
    /// The particle's velocity, held while it moves slower than `min_speed`
    Velocity { min_speed: f32 },
    Custom(Vec3Expression),
}

impl Default for DirectionSource {
    fn default() -> Self {
        DirectionSource::Velocity { min_speed: 0.01 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flipbook {
    /// Top-left of the first frame, pixels
    pub base: [Expression; 2],
    /// Size of one frame, pixels
    pub size: Vec2,
    /// Offset from one frame to the next, pixels
    pub step: Vec2,
    /// Playback rate when not stretched to the lifetime
    pub frames_per_second: f32,
    /// Number of frames
    pub max_frame: Expression,
    /// Spread the frames over the particle's lifetime instead of using the rate
    pub stretch_to_lifetime: bool,
    /// Start over after the last frame instead of holding it
    pub looping: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Uv {
    /// The whole texture
    #[default]
    Full,
    Static {
        texture_size: Vec2,
        uv: [Expression; 2],
        uv_size: [Expression; 2],
    },
    Flipbook {
        texture_size: Vec2,
        flipbook: Flipbook,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Billboard {
    /// Half extents of the quad
    pub size: [Expression; 2],
    /// How the quad turns towards the camera
    pub facing: FacingMode,
    /// Direction used by the direction-based facing modes
    pub direction: DirectionSource,
    /// Texture region
    pub uv: Uv,
}

impl Billboard {
    pub fn size<R: Runtime + ?Sized>(&self, runtime: &mut R) -> Vec2 {
        Vec2::new(self.size[0].eval(runtime), self.size[1].eval(runtime))
    }

    /// Texture rectangle as normalized `(min, max)` corners
    pub fn uv<R: Runtime + ?Sized>(&self, runtime: &mut R, age: f32, lifetime: f32) -> [Vec2; 2] {
        match &self.uv {
            Uv::Full => [Vec2::ZERO, Vec2::ONE],
            Uv::Static {
                texture_size,
                uv,
                uv_size,
            } => {
                let min = Vec2::new(uv[0].eval(runtime), uv[1].eval(runtime));
                let size = Vec2::new(uv_size[0].eval(runtime), uv_size[1].eval(runtime));
                [min / *texture_size, (min + size) / *texture_size]
            }
            Uv::Flipbook {
                texture_size,
                flipbook,
            } => {
                let base = Vec2::new(flipbook.base[0].eval(runtime), flipbook.base[1].eval(runtime));
                let max_frame = flipbook.max_frame.eval(runtime).floor().max(1.0);
                let frame = if flipbook.stretch_to_lifetime && lifetime > 0.0 {
                    (age / lifetime * max_frame).floor()
                } else {
                    (age * flipbook.frames_per_second).floor()
                };
                let frame = if flipbook.looping {
                    frame.rem_euclid(max_frame)
                } else {
                    frame.clamp(0.0, max_frame - 1.0)
                };
                let min = base + flipbook.step * frame;
                [min / *texture_size, (min + flipbook.size) / *texture_size]
            }
        }
    }
}

/// Orientation of a billboard quad in world space
pub fn facing_rotation(
    mode: FacingMode,
    position: Vec3,
    direction: Vec3,
    emitter_rotation: Quat,
    camera: &Camera,
) -> Quat {
    let to_camera = (camera.position - position).normalize_or(Vec3::Z);
    match mode {
        FacingMode::RotateXyz => camera.rotation,
        FacingMode::RotateY => {
            let forward = camera.forward();
            Quat::from_rotation_y((-forward.x).atan2(-forward.z))
        }
        FacingMode::LookatXyz => {
            let reference = if to_camera.y.abs() > 0.999 {
                camera.rotation * Vec3::Y
            } else {
                Vec3::Y
            };
            let right = reference.cross(to_camera).normalize_or(Vec3::X);
            let up = to_camera.cross(right);
            Quat::from_mat3(&Mat3::from_cols(right, up, to_camera))
        }
        FacingMode::LookatY => Quat::from_rotation_y(to_camera.x.atan2(to_camera.z)),
        FacingMode::LookatDirection => {
            let up = direction.normalize_or(Vec3::Y);
            let normal = (to_camera - up * to_camera.dot(up)).normalize_or(up.any_orthonormal_vector());
            let right = up.cross(normal);
            Quat::from_mat3(&Mat3::from_cols(right, up, normal))
        }
        FacingMode::DirectionX => Quat::from_rotation_arc(Vec3::X, direction.normalize_or(Vec3::X)),
        FacingMode::DirectionY => Quat::from_rotation_arc(Vec3::Y, direction.normalize_or(Vec3::Y)),
        FacingMode::DirectionZ => Quat::from_rotation_arc(Vec3::Z, direction.normalize_or(Vec3::Z)),
        FacingMode::EmitterTransformXy => emitter_rotation,
        FacingMode::EmitterTransformXz => emitter_rotation * Quat::from_rotation_x(-FRAC_PI_2),
        FacingMode::EmitterTransformYz => emitter_rotation * Quat::from_rotation_y(FRAC_PI_2),
    }
}

/// A particle quad ready to be drawn
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BillboardQuad {
    /// World space center
    pub position: Vec3,
    /// Quad orientation, the quad lies in its local XY plane
    pub rotation: Quat,
    /// Half extents along local X and Y
    pub size: Vec2,
    /// Normalized texture corners, top-left then bottom-right
    pub uv: [Vec2; 2],
    /// Linear RGBA tint
    pub color: Vec4,
    /// Whether the host should apply world lighting
    pub lit: bool,
}

impl BillboardQuad {
    pub fn normal(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    /// Corners counter-clockwise from the bottom left, paired with their UVs
    pub fn corners(&self) -> [(Vec3, Vec2); 4] {
        let right = self.rotation * Vec3::X * self.size.x;
        let up = self.rotation * Vec3::Y * self.size.y;
        let [min, max] = self.uv;
        [
            (self.position - right - up, Vec2::new(min.x, max.y)),
            (self.position + right - up, Vec2::new(max.x, max.y)),
            (self.position + right + up, Vec2::new(max.x, min.y)),
            (self.position - right + up, Vec2::new(min.x, min.y)),
        ]
    }
}

#[derive(Deserialize)]
struct BillboardDef {
    #[serde(default)]
    size: Option<[Expression; 2]>,
    #[serde(default)]
    facing_camera_mode: FacingMode,
    #[serde(default)]
    direction: Option<DirectionDef>,
    #[serde(default)]
    uv: Option<UvDef>,
}

#[derive(Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
enum DirectionDef {
    DeriveFromVelocity {
        #[serde(default = "default_min_speed")]
        min_speed_threshold: f32,
    },
    Custom {
        #[serde(default)]
        custom_direction: Vec3Expression,
    },
}

fn default_min_speed() -> f32 {
    0.01
}

#[derive(Deserialize)]
struct UvDef {
    #[serde(default = "default_texture_dimension")]
    texture_width: f32,
    #[serde(default = "default_texture_dimension")]
    texture_height: f32,
    #[serde(default)]
    uv: Option<[Expression; 2]>,
    #[serde(default)]
    uv_size: Option<[Expression; 2]>,
    #[serde(default)]
    flipbook: Option<FlipbookDef>,
}

fn default_texture_dimension() -> f32 {
    1.0
}

#[derive(Deserialize)]
struct FlipbookDef {
    #[serde(rename = "base_UV", default)]
    base: Option<[Expression; 2]>,
    #[serde(rename = "size_UV", default)]
    size: [f32; 2],
    #[serde(rename = "step_UV", default)]
    step: [f32; 2],
    #[serde(default = "default_fps")]
    frames_per_second: f32,
    #[serde(default = "Expression::one")]
    max_frame: Expression,
    #[serde(default)]
    stretch_to_lifetime: bool,
    #[serde(rename = "loop", default)]
    looping: bool,
}

fn default_fps() -> f32 {
    8.0
}

fn zero_pair() -> [Expression; 2] {
    [Expression::zero(), Expression::zero()]
}

impl Billboard {
    fn from_def(def: BillboardDef) -> Self {
        let direction = match def.direction {
            None => DirectionSource::default(),
            Some(DirectionDef::DeriveFromVelocity {
                min_speed_threshold,
            }) => DirectionSource::Velocity {
                min_speed: min_speed_threshold,
            },
            Some(DirectionDef::Custom { custom_direction }) => {
                DirectionSource::Custom(custom_direction)
            }
        };

        let uv = match def.uv {
            None => Uv::Full,
            Some(uv) => {
                let texture_size = Vec2::new(uv.texture_width, uv.texture_height).max(Vec2::ONE);
                match uv.flipbook {
                    Some(flipbook) => Uv::Flipbook {
                        texture_size,
                        flipbook: Flipbook {
                            base: flipbook.base.unwrap_or_else(zero_pair),
                            size: Vec2::from_array(flipbook.size),
                            step: Vec2::from_array(flipbook.step),
                            frames_per_second: flipbook.frames_per_second,
                            max_frame: flipbook.max_frame,
                            stretch_to_lifetime: flipbook.stretch_to_lifetime,
                            looping: flipbook.looping,
                        },
                    },
                    None => Uv::Static {
                        texture_size,
                        uv: uv.uv.unwrap_or_else(zero_pair),
                        uv_size: uv.uv_size.unwrap_or_else(|| {
                            [
                                Expression::constant(texture_size.x),
                                Expression::constant(texture_size.y),
                            ]
                        }),
                    },
                }
            }
        };

        Billboard {
            size: def.size.unwrap_or_else(|| {
                [Expression::constant(0.1), Expression::constant(0.1)]
            }),
            facing: def.facing_camera_mode,
            direction,
            uv,
        }
    }
}

impl<'de> Deserialize<'de> for Billboard {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BillboardDef::deserialize(deserializer).map(Billboard::from_def)
    }
}
