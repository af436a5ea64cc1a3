use crate::config::{PaletteConfig, PaletteSlot};
use crate::ecs::RegistryError;
use glam::{Vec3, Vec4};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Typed handle into the [`MaterialRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(u32);

impl MaterialId {
    pub const DEFAULT: MaterialId = MaterialId(0);

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "material#{}", self.0)
    }
}

/// Immutable visual parameters shared by every entity that references them.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialSpec {
    pub label: String,
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: Option<Vec3>,
}

impl MaterialSpec {
    pub fn metallic(label: impl Into<String>, base_color: Vec4, metallic: f32, roughness: f32) -> Self {
        Self {
            label: label.into(),
            base_color,
            metallic: metallic.clamp(0.0, 1.0),
            roughness: roughness.clamp(0.0, 1.0),
            emissive: None,
        }
    }

    pub fn emissive(label: impl Into<String>, base_color: Vec4, emissive: Vec3) -> Self {
        Self { label: label.into(), base_color, metallic: 0.0, roughness: 1.0, emissive: Some(emissive) }
    }
}

pub struct MaterialRegistry {
    materials: Vec<Arc<MaterialSpec>>,
    labels: HashMap<String, MaterialId>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        let mut registry = Self { materials: Vec::new(), labels: HashMap::new() };
        registry.register(MaterialSpec::metallic("material::default", Vec4::ONE, 0.0, 1.0));
        registry
    }

    /// Registers a material. A label that is already taken resolves to the new entry from now on;
    /// entities holding the old id keep their original spec.
    pub fn register(&mut self, spec: MaterialSpec) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        if self.labels.insert(spec.label.clone(), id).is_some() {
            tracing::debug!(target: "materials", "material label '{}' re-registered as {id}", spec.label);
        }
        self.materials.push(Arc::new(spec));
        id
    }

    pub fn get(&self, id: MaterialId) -> Result<Arc<MaterialSpec>, RegistryError> {
        self.materials.get(id.0 as usize).cloned().ok_or(RegistryError::MaterialNotFound(id))
    }

    pub fn contains(&self, id: MaterialId) -> bool {
        (id.0 as usize) < self.materials.len()
    }

    pub fn lookup(&self, label: &str) -> Option<MaterialId> {
        self.labels.get(label).copied()
    }

    /// Material for a palette slot, registered on first use.
    pub fn palette_material(&mut self, palette: &PaletteConfig, slot: PaletteSlot) -> MaterialId {
        if let Some(id) = self.lookup(slot.label()) {
            return id;
        }
        let color = palette.color(slot);
        let spec = match slot {
            PaletteSlot::Metal => MaterialSpec::metallic(slot.label(), color, 0.9, 0.35),
            PaletteSlot::Accent => MaterialSpec::metallic(slot.label(), color, 0.7, 0.4),
            PaletteSlot::Panel => MaterialSpec::metallic(slot.label(), color, 0.3, 0.7),
            PaletteSlot::Button => MaterialSpec::emissive(slot.label(), color, color.truncate() * 0.4),
            PaletteSlot::Radar => MaterialSpec::emissive(slot.label(), color, color.truncate() * 0.6),
            PaletteSlot::Ground => MaterialSpec::metallic(slot.label(), color, 0.0, 0.95),
        };
        self.register(spec)
    }

    pub fn default_material(&self) -> MaterialId {
        MaterialId::DEFAULT
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::new()
    }
}
