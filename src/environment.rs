use crate::animation::{AnimatedProperty, AnimationClip, AnimationController, Axis, LoopMode};
use crate::config::{DeckConfig, PaletteSlot};
use crate::control_panel::{ControlPanel, ControlPanelLayout};
use crate::ecs::{ActivationProfile, EntityDesc, EntityId, EntityKind, EntityRegistry, Transform3D};
use crate::material_registry::MaterialRegistry;
use crate::mesh::MeshPrimitive;
use anyhow::{Context, Result};
use glam::{Quat, Vec3};
use std::f32::consts::{FRAC_PI_2, TAU};

const GEAR_DIAMETER: f32 = 0.6;
const GEAR_THICKNESS: f32 = 0.12;
const PISTON_TRAVEL: f32 = 0.25;
const RADAR_RADIUS: f32 = 0.45;
const BEAM_INSET: f32 = 0.06;

/// Ids of everything the demo deck spawns.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckLayout {
    pub ground: EntityId,
    pub gears: [EntityId; 2],
    pub piston: EntityId,
    pub control_panel: ControlPanel,
    pub radar: EntityId,
    pub radar_sweep: EntityId,
}

impl DeckLayout {
    /// Every entity that reacts to activation, in creation order.
    pub fn interactive(&self) -> Vec<EntityId> {
        let mut ids = vec![self.gears[0], self.gears[1], self.piston];
        ids.extend(self.control_panel.buttons.iter().copied());
        ids.push(self.radar);
        ids
    }
}

pub struct EnvironmentBuilder<'a> {
    registry: &'a mut EntityRegistry,
    materials: &'a mut MaterialRegistry,
    animation: &'a mut AnimationController,
    config: &'a DeckConfig,
}

impl<'a> EnvironmentBuilder<'a> {
    pub fn new(
        registry: &'a mut EntityRegistry,
        materials: &'a mut MaterialRegistry,
        animation: &'a mut AnimationController,
        config: &'a DeckConfig,
    ) -> Self {
        Self { registry, materials, animation, config }
    }

    pub fn build(self) -> Result<DeckLayout> {
        let palette = &self.config.palette;
        let metal = self.materials.palette_material(palette, PaletteSlot::Metal);
        let accent = self.materials.palette_material(palette, PaletteSlot::Accent);
        let radar_material = self.materials.palette_material(palette, PaletteSlot::Radar);
        let ground_material = self.materials.palette_material(palette, PaletteSlot::Ground);
        let period = self.config.animation.clip_duration.max(f32::EPSILON);
        let pulse = self.config.animation.pulse_scale;

        let ground = self
            .registry
            .create(
                self.materials,
                EntityDesc::new(EntityKind::Ground, MeshPrimitive::Ground { width: 20.0, depth: 20.0 })
                    .with_material(ground_material),
            )
            .context("Failed to create ground")?;

        // Gears stand upright facing the viewer; local Y is the spin axis.
        let upright = Quat::from_rotation_x(FRAC_PI_2);
        let gear_shape = MeshPrimitive::Cylinder { diameter: GEAR_DIAMETER, height: GEAR_THICKNESS };
        let mut gears = Vec::with_capacity(2);
        for (index, (x, material, turn)) in [(-1.3, metal, TAU), (-1.3 + GEAR_DIAMETER * 0.95, accent, -TAU)]
            .into_iter()
            .enumerate()
        {
            let gear = self
                .registry
                .create(
                    self.materials,
                    EntityDesc::new(EntityKind::Gear, gear_shape)
                        .with_transform(Transform3D::from_translation(Vec3::new(x, 1.2, -1.5)).with_rotation(upright))
                        .with_material(material),
                )
                .with_context(|| format!("Failed to create gear {index}"))?;
            self.registry.set_interactive(gear, ActivationProfile::pulse("gear_clank", pulse))?;
            let clip = AnimationClip::new(
                gear,
                AnimatedProperty::Rotation(Axis::Y),
                [(0.0, 0.0), (period, turn)],
                LoopMode::Cycle,
            )?;
            self.animation.attach_clip(clip, self.registry)?;
            gears.push(gear);
        }

        let piston = self
            .registry
            .create(
                self.materials,
                EntityDesc::new(EntityKind::Piston, MeshPrimitive::Box { size: Vec3::new(0.2, 0.6, 0.2) })
                    .at(Vec3::new(1.3, 0.6, -1.5))
                    .with_material(metal),
            )
            .context("Failed to create piston")?;
        self.registry.set_interactive(piston, ActivationProfile::pulse("piston_hiss", pulse))?;
        let stroke = AnimationClip::new(
            piston,
            AnimatedProperty::Translation(Axis::Y),
            [(0.0, 0.0), (period * 0.5, PISTON_TRAVEL), (period, 0.0)],
            LoopMode::Cycle,
        )?;
        self.animation.attach_clip(stroke, self.registry)?;

        let panel_origin = Vec3::new(0.0, 0.9, -0.6);
        let control_panel = ControlPanelLayout::build(self.registry, self.materials, self.config, panel_origin)
            .context("Failed to build control panel")?;

        let radar = self
            .registry
            .create(
                self.materials,
                EntityDesc::new(EntityKind::RadarDisplay, MeshPrimitive::Disc { radius: RADAR_RADIUS })
                    .at(Vec3::new(0.0, 1.9, -2.0))
                    .with_material(radar_material),
            )
            .context("Failed to create radar display")?;
        let radar_tint = palette.color(PaletteSlot::Radar);
        self.registry
            .set_interactive(radar, ActivationProfile::pulse("radar_ping", pulse).with_particle_tint(radar_tint))?;

        // The sweep pivots on the display center; the beam starts just off center so picks
        // aimed at the display are not swallowed by it.
        let radar_sweep = self
            .registry
            .create(
                self.materials,
                EntityDesc::new(EntityKind::RadarSweep, MeshPrimitive::Empty)
                    .at(Vec3::new(0.0, 0.0, 0.01))
                    .child_of(radar),
            )
            .context("Failed to create radar sweep")?;
        let beam_length = RADAR_RADIUS - BEAM_INSET;
        self.registry
            .create(
                self.materials,
                EntityDesc::new(EntityKind::RadarSweep, MeshPrimitive::Box { size: Vec3::new(beam_length, 0.02, 0.01) })
                    .at(Vec3::new(BEAM_INSET + beam_length * 0.5, 0.0, 0.0))
                    .with_material(accent)
                    .child_of(radar_sweep),
            )
            .context("Failed to create radar beam")?;
        let sweep = AnimationClip::new(
            radar_sweep,
            AnimatedProperty::Rotation(Axis::Z),
            [(0.0, 0.0), (period, -TAU)],
            LoopMode::Cycle,
        )?;
        self.animation.attach_clip(sweep, self.registry)?;

        self.registry.propagate_transforms();
        tracing::info!(
            target: "environment",
            "deck built: {} entities, {} materials, {} clips",
            self.registry.len(),
            self.materials.len(),
            self.animation.clip_count()
        );
        Ok(DeckLayout { ground, gears: [gears[0], gears[1]], piston, control_panel, radar, radar_sweep })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_demo_deck() {
        let mut registry = EntityRegistry::new();
        let mut materials = MaterialRegistry::new();
        let mut animation = AnimationController::new();
        let config = DeckConfig::default();
        let layout = EnvironmentBuilder::new(&mut registry, &mut materials, &mut animation, &config)
            .build()
            .expect("deck");
        assert!(!registry.is_interactive(layout.ground));
        for id in layout.interactive() {
            assert!(registry.is_interactive(id), "{id} should be interactive");
        }
        assert!(!registry.is_interactive(layout.radar_sweep));
        assert_eq!(registry.children(layout.radar).unwrap(), vec![layout.radar_sweep]);
        // two gears, the piston stroke and the radar sweep
        assert_eq!(animation.clip_count(), 4);
        assert_eq!(registry.material(layout.ground).unwrap(), materials.lookup(PaletteSlot::Ground.label()).unwrap());
    }
}
