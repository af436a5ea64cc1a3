use crate::material_registry::MaterialId;
use crate::mesh::MeshPrimitive;
use bevy_ecs::prelude::*;
use glam::{Mat4, Quat, Vec3, Vec4};
use std::fmt;

/// Stable handle to an entity in the [`EntityRegistry`](super::EntityRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(Entity);

impl EntityId {
    pub(crate) fn from_entity(entity: Entity) -> Self {
        Self(entity)
    }

    pub(crate) fn entity(self) -> Entity {
        self.0
    }

    pub fn index(self) -> u32 {
        self.0.index()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0.index())
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Ground,
    Gear,
    Piston,
    Panel,
    Button,
    RadarDisplay,
    RadarSweep,
    Prop,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ground => "ground",
            Self::Gear => "gear",
            Self::Piston => "piston",
            Self::Panel => "panel",
            Self::Button => "button",
            Self::RadarDisplay => "radar_display",
            Self::RadarSweep => "radar_sweep",
            Self::Prop => "prop",
        }
    }
}

#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform3D {
    fn default() -> Self {
        Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE }
    }
}

impl Transform3D {
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::default() }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[derive(Component, Clone, Copy, Default)]
pub struct WorldTransform3D(pub Mat4);
#[derive(Component, Clone, Copy)]
pub struct Parent(pub Entity);
#[derive(Component, Default)]
pub struct Children(pub Vec<Entity>);
#[derive(Component, Clone, Copy)]
pub struct Shape(pub MeshPrimitive);
#[derive(Component, Clone, Copy)]
pub struct MaterialBinding(pub MaterialId);

/// Transform component touched by transient feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedbackChannel {
    Scale,
    Translation,
}

impl FeedbackChannel {
    pub fn read(self, transform: &Transform3D) -> Vec3 {
        match self {
            FeedbackChannel::Scale => transform.scale,
            FeedbackChannel::Translation => transform.translation,
        }
    }

    pub fn write(self, transform: &mut Transform3D, value: Vec3) {
        match self {
            FeedbackChannel::Scale => transform.scale = value,
            FeedbackChannel::Translation => transform.translation = value,
        }
    }
}

/// Marks an entity as activatable and describes the feedback it produces.
///
/// Mechanical elements and panel buttons carry the same component; downstream code never
/// branches on the entity kind.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct ActivationProfile {
    pub channel: FeedbackChannel,
    /// Added to the channel's current value while the feedback is active.
    pub delta: Vec3,
    pub sound_cue: String,
    /// Overrides the configured particle start color when set.
    pub particle_tint: Option<Vec4>,
}

impl ActivationProfile {
    /// Uniform scale pulse, used by mechanical elements.
    pub fn pulse(sound_cue: impl Into<String>, amount: f32) -> Self {
        Self {
            channel: FeedbackChannel::Scale,
            delta: Vec3::splat(amount),
            sound_cue: sound_cue.into(),
            particle_tint: None,
        }
    }

    /// Press-in along local -Z, used by panel buttons.
    pub fn press(sound_cue: impl Into<String>, depth: f32) -> Self {
        Self {
            channel: FeedbackChannel::Translation,
            delta: Vec3::new(0.0, 0.0, -depth.abs()),
            sound_cue: sound_cue.into(),
            particle_tint: None,
        }
    }

    pub fn with_particle_tint(mut self, tint: Vec4) -> Self {
        self.particle_tint = Some(tint);
        self
    }
}

/// Everything needed to spawn one entity.
#[derive(Debug, Clone)]
pub struct EntityDesc {
    pub kind: EntityKind,
    pub primitive: MeshPrimitive,
    pub transform: Transform3D,
    pub material: MaterialId,
    pub parent: Option<EntityId>,
}

impl EntityDesc {
    pub fn new(kind: EntityKind, primitive: MeshPrimitive) -> Self {
        Self { kind, primitive, transform: Transform3D::default(), material: MaterialId::DEFAULT, parent: None }
    }

    pub fn at(mut self, translation: Vec3) -> Self {
        self.transform.translation = translation;
        self
    }

    pub fn with_transform(mut self, transform: Transform3D) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = material;
        self
    }

    pub fn child_of(mut self, parent: EntityId) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Read-only snapshot of an entity.
#[derive(Debug, Clone)]
pub struct EntityView {
    pub id: EntityId,
    pub kind: EntityKind,
    pub primitive: MeshPrimitive,
    pub transform: Transform3D,
    pub world: Mat4,
    pub material: MaterialId,
    pub interactive: bool,
    pub parent: Option<EntityId>,
}

impl EntityView {
    pub fn world_position(&self) -> Vec3 {
        self.world.w_axis.truncate()
    }
}
