//! Moving attachment points
//!
//! A [`Locator`] reports where something is in world space. Emitters and
//! particles keep a `Weak` reference to one and treat a dropped or invalid
//! locator as the end of their anchor.

use crate::bone::{BoneId, BoneTree};
use crate::model::{LocatorPoint, Model};
use crate::transform::{BoneTransforms, euler_to_quat, rotation_of};
use glam::{Mat4, Quat, Vec3};
use std::cell::Cell;
use std::rc::Rc;

pub trait Locator {
    /// False once the thing being tracked is gone
    fn is_valid(&self) -> bool;

    fn position(&self) -> Vec3;

    fn rotation(&self) -> Quat;

    /// World units per second
    fn velocity(&self) -> Vec3;

    fn parent(&self) -> Option<Rc<dyn Locator>> {
        None
    }
}

/// A fixed point, e.g. a world position an effect was started at
#[derive(Debug)]
pub struct StaticLocator {
    position: Vec3,
    rotation: Quat,
    valid: Cell<bool>,
}

impl StaticLocator {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            valid: Cell::new(true),
        }
    }

    pub fn at(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    pub fn invalidate(&self) {
        self.valid.set(false);
    }
}

impl Locator for StaticLocator {
    fn is_valid(&self) -> bool {
        self.valid.get()
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Quat {
        self.rotation
    }

    fn velocity(&self) -> Vec3 {
        Vec3::ZERO
    }
}

/// A fixed offset in another locator's frame
pub struct OffsetLocator {
    parent: Rc<dyn Locator>,
    offset: Vec3,
    rotation: Quat,
}

impl OffsetLocator {
    pub fn new(parent: Rc<dyn Locator>, offset: Vec3, rotation: Quat) -> Self {
        Self {
            parent,
            offset,
            rotation,
        }
    }
}

impl Locator for OffsetLocator {
    fn is_valid(&self) -> bool {
        self.parent.is_valid()
    }

    fn position(&self) -> Vec3 {
        self.parent.position() + self.parent.rotation() * self.offset
    }

    fn rotation(&self) -> Quat {
        self.parent.rotation() * self.rotation
    }

    fn velocity(&self) -> Vec3 {
        self.parent.velocity()
    }

    fn parent(&self) -> Option<Rc<dyn Locator>> {
        Some(Rc::clone(&self.parent))
    }
}

/// Follows a point on an animated bone
#[derive(Debug)]
pub struct BoneLocator {
    bone: BoneId,
    /// Model space position at rest
    offset: Vec3,
    /// Rotation relative to the bone
    local_rotation: Quat,
    position: Cell<Vec3>,
    rotation: Cell<Quat>,
    velocity: Cell<Vec3>,
    sampled: Cell<bool>,
    valid: Cell<bool>,
}

impl BoneLocator {
    pub fn new(bone: BoneId, offset: Vec3, rotation: Vec3) -> Self {
        Self {
            bone,
            offset,
            local_rotation: euler_to_quat(rotation),
            position: Cell::new(Vec3::ZERO),
            rotation: Cell::new(Quat::IDENTITY),
            velocity: Cell::new(Vec3::ZERO),
            sampled: Cell::new(false),
            valid: Cell::new(true),
        }
    }

    pub fn from_point(point: &LocatorPoint) -> Self {
        Self::new(point.bone, point.offset, point.rotation)
    }

    pub fn bone(&self) -> BoneId {
        self.bone
    }

    /// Sample the bone after this frame's transforms were computed.
    /// Velocity is the difference to the previous sample over `dt`.
    pub fn update(&self, transforms: &BoneTransforms, model_to_world: &Mat4, dt: f32) {
        let global = *model_to_world * transforms.global(self.bone);
        let position = global.transform_point3(self.offset);

        if self.sampled.get() && dt > 0.0 {
            self.velocity.set((position - self.position.get()) / dt);
        }
        self.position.set(position);
        self.rotation.set(rotation_of(&global) * self.local_rotation);
        self.sampled.set(true);
    }

    pub fn invalidate(&self) {
        self.valid.set(false);
    }
}

impl Locator for BoneLocator {
    fn is_valid(&self) -> bool {
        self.valid.get()
    }

    fn position(&self) -> Vec3 {
        self.position.get()
    }

    fn rotation(&self) -> Quat {
        self.rotation.get()
    }

    fn velocity(&self) -> Vec3 {
        self.velocity.get()
    }
}

/// Every named point of one model instance: its locators, then the pivot of
/// each bone not shadowed by a locator of the same name.
#[derive(Debug, Default)]
pub struct BoneLocators {
    entries: Vec<(String, Rc<BoneLocator>)>,
}

impl BoneLocators {
    pub fn new(model: &Model) -> Self {
        let mut entries: Vec<(String, Rc<BoneLocator>)> = model
            .locators()
            .iter()
            .map(|point| (point.name.clone(), Rc::new(BoneLocator::from_point(point))))
            .collect();
        Self::add_bone_pivots(model.tree(), &mut entries);
        Self { entries }
    }

    fn add_bone_pivots(tree: &BoneTree, entries: &mut Vec<(String, Rc<BoneLocator>)>) {
        for (id, bone) in tree.iter() {
            if bone.synthetic || entries.iter().any(|(name, _)| *name == bone.name) {
                continue;
            }
            entries.push((
                bone.name.clone(),
                Rc::new(BoneLocator::new(id, bone.pivot, Vec3::ZERO)),
            ));
        }
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Locator>> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, locator)| Rc::clone(locator) as Rc<dyn Locator>)
    }

    pub fn update(&self, transforms: &BoneTransforms, model_to_world: &Mat4, dt: f32) {
        for (_, locator) in &self.entries {
            locator.update(transforms, model_to_world, dt);
        }
    }

    /// Mark every locator invalid, e.g. when the model instance is removed
    pub fn invalidate(&self) {
        for (_, locator) in &self.entries {
            locator.invalidate();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for BoneLocators {
    fn drop(&mut self) {
        self.invalidate();
    }
}
