use crate::config::{DeckConfig, PaletteSlot};
use crate::ecs::{ActivationProfile, EntityDesc, EntityId, EntityKind, EntityRegistry, RegistryError, Transform3D};
use crate::material_registry::MaterialRegistry;
use crate::mesh::MeshPrimitive;
use glam::{Quat, Vec2, Vec3};

const PANEL_THICKNESS: f32 = 0.04;
const PANEL_MARGIN: f32 = 0.12;
/// Panel tilt toward the viewer, in radians.
const PANEL_TILT: f32 = -0.35;

#[derive(Debug, Clone, PartialEq)]
pub struct ControlPanel {
    pub panel: EntityId,
    pub buttons: Vec<EntityId>,
}

/// Lays out the button panel from the configured grid.
pub struct ControlPanelLayout;

impl ControlPanelLayout {
    pub fn build(
        registry: &mut EntityRegistry,
        materials: &mut MaterialRegistry,
        config: &DeckConfig,
        origin: Vec3,
    ) -> Result<ControlPanel, RegistryError> {
        let grid = &config.button_grid;
        let [bw, bh, bd] = grid.button_size;
        let panel_size = panel_extent(&grid.positions, bw, bh);

        let panel_material = materials.palette_material(&config.palette, PaletteSlot::Panel);
        let button_material = materials.palette_material(&config.palette, PaletteSlot::Button);

        let panel = registry.create(
            materials,
            EntityDesc::new(EntityKind::Panel, MeshPrimitive::Box { size: panel_size.extend(PANEL_THICKNESS) })
                .with_transform(
                    Transform3D::from_translation(origin).with_rotation(Quat::from_rotation_x(PANEL_TILT)),
                )
                .with_material(panel_material),
        )?;

        let face = PANEL_THICKNESS * 0.5 + bd * 0.5;
        let mut buttons = Vec::with_capacity(grid.positions.len());
        for (index, [x, y]) in grid.positions.iter().copied().enumerate() {
            let button = registry.create(
                materials,
                EntityDesc::new(EntityKind::Button, MeshPrimitive::Box { size: Vec3::new(bw, bh, bd) })
                    .at(Vec3::new(x, y, face))
                    .with_material(button_material)
                    .child_of(panel),
            )?;
            registry.set_interactive(button, ActivationProfile::press(format!("button_{index}"), grid.press_depth))?;
            buttons.push(button);
        }
        tracing::debug!(target: "control_panel", "panel {panel} built with {} buttons", buttons.len());
        Ok(ControlPanel { panel, buttons })
    }
}

fn panel_extent(positions: &[[f32; 2]], button_w: f32, button_h: f32) -> Vec2 {
    let mut half = Vec2::ZERO;
    for [x, y] in positions {
        half.x = half.x.max(x.abs() + button_w * 0.5);
        half.y = half.y.max(y.abs() + button_h * 0.5);
    }
    half * 2.0 + Vec2::splat(PANEL_MARGIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::FeedbackChannel;

    #[test]
    fn buttons_follow_grid_and_are_interactive() {
        let mut registry = EntityRegistry::new();
        let mut materials = MaterialRegistry::new();
        let config = DeckConfig::default();
        let panel = ControlPanelLayout::build(&mut registry, &mut materials, &config, Vec3::new(0.0, 1.0, -1.0))
            .expect("panel");
        assert_eq!(panel.buttons.len(), config.button_grid.positions.len());
        assert!(!registry.is_interactive(panel.panel));
        assert_eq!(registry.children(panel.panel).unwrap(), panel.buttons);
        for (button, [x, y]) in panel.buttons.iter().zip(&config.button_grid.positions) {
            let local = registry.transform(*button).unwrap().translation;
            assert_eq!((local.x, local.y), (*x, *y));
            let profile = registry.activation_profile(*button).unwrap().expect("profile");
            assert_eq!(profile.channel, FeedbackChannel::Translation);
            assert!(profile.delta.z < 0.0);
        }
    }

    #[test]
    fn empty_grid_builds_bare_panel() {
        let mut registry = EntityRegistry::new();
        let mut materials = MaterialRegistry::new();
        let mut config = DeckConfig::default();
        config.button_grid.positions.clear();
        let panel = ControlPanelLayout::build(&mut registry, &mut materials, &config, Vec3::ZERO).unwrap();
        assert!(panel.buttons.is_empty());
        assert_eq!(registry.len(), 1);
    }
}
