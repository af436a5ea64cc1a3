use super::types::*;
use crate::material_registry::{MaterialId, MaterialRegistry};
use crate::mesh::MeshPrimitive;
use bevy_ecs::prelude::*;
use glam::{Mat4, Vec3};
use smallvec::SmallVec;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),
    #[error("{0} not found")]
    MaterialNotFound(MaterialId),
}

/// Logs a broken id contract. Debug builds treat it as fatal.
pub fn report_contract_violation(context: &str, err: &RegistryError) {
    tracing::error!(target: "registry", "{context}: {err}");
    debug_assert!(false, "{context}: {err}");
}

/// Owns every entity of the deck and its transforms.
///
/// Iteration always follows creation order so per-frame updates are deterministic.
/// Parents are created before their children, which lets a single ordered pass propagate
/// world transforms.
pub struct EntityRegistry {
    world: World,
    order: Vec<Entity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self { world: World::new(), order: Vec::new() }
    }

    pub fn create(&mut self, materials: &MaterialRegistry, desc: EntityDesc) -> Result<EntityId, RegistryError> {
        if !materials.contains(desc.material) {
            return Err(RegistryError::MaterialNotFound(desc.material));
        }
        let parent = match desc.parent {
            Some(parent) if !self.contains(parent) => return Err(RegistryError::EntityNotFound(parent)),
            other => other,
        };
        let local = desc.transform.to_matrix();
        let world_matrix = match parent {
            Some(parent) => self.world_matrix_of(parent.entity()) * local,
            None => local,
        };
        let mut spawned = self.world.spawn((
            desc.kind,
            Shape(desc.primitive),
            desc.transform,
            WorldTransform3D(world_matrix),
            MaterialBinding(desc.material),
        ));
        if let Some(parent) = parent {
            spawned.insert(Parent(parent.entity()));
        }
        let entity = spawned.id();
        if let Some(parent) = parent {
            let parent = parent.entity();
            if let Some(mut children) = self.world.get_mut::<Children>(parent) {
                children.0.push(entity);
            } else {
                self.world.entity_mut(parent).insert(Children(vec![entity]));
            }
        }
        self.order.push(entity);
        let id = EntityId::from_entity(entity);
        tracing::trace!(
            target: "registry",
            "created {} {id} ({})",
            desc.kind.as_str(),
            desc.primitive.label()
        );
        Ok(id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.world.get_entity(id.entity()).is_ok()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: EntityId) -> Result<EntityView, RegistryError> {
        let entity = id.entity();
        let missing = RegistryError::EntityNotFound(id);
        let kind = *self.world.get::<EntityKind>(entity).ok_or(missing)?;
        let primitive = self.world.get::<Shape>(entity).ok_or(missing)?.0;
        let transform = *self.world.get::<Transform3D>(entity).ok_or(missing)?;
        let world = self.world.get::<WorldTransform3D>(entity).map(|w| w.0).unwrap_or(Mat4::IDENTITY);
        let material = self.world.get::<MaterialBinding>(entity).ok_or(missing)?.0;
        let interactive = self.world.get::<ActivationProfile>(entity).is_some();
        let parent = self.world.get::<Parent>(entity).map(|p| EntityId::from_entity(p.0));
        Ok(EntityView { id, kind, primitive, transform, world, material, interactive, parent })
    }

    pub fn transform(&self, id: EntityId) -> Result<Transform3D, RegistryError> {
        self.world.get::<Transform3D>(id.entity()).copied().ok_or(RegistryError::EntityNotFound(id))
    }

    pub fn set_transform(&mut self, id: EntityId, transform: Transform3D) -> Result<(), RegistryError> {
        let mut current =
            self.world.get_mut::<Transform3D>(id.entity()).ok_or(RegistryError::EntityNotFound(id))?;
        *current = transform;
        Ok(())
    }

    /// Applies `edit` to the local transform in place.
    pub fn update_transform<F>(&mut self, id: EntityId, edit: F) -> Result<Transform3D, RegistryError>
    where
        F: FnOnce(&mut Transform3D),
    {
        let mut current =
            self.world.get_mut::<Transform3D>(id.entity()).ok_or(RegistryError::EntityNotFound(id))?;
        edit(&mut *current);
        Ok(*current)
    }

    /// World matrix as of the last [`propagate_transforms`](Self::propagate_transforms).
    pub fn world_transform(&self, id: EntityId) -> Result<Mat4, RegistryError> {
        self.world.get::<WorldTransform3D>(id.entity()).map(|w| w.0).ok_or(RegistryError::EntityNotFound(id))
    }

    pub fn world_position(&self, id: EntityId) -> Result<Vec3, RegistryError> {
        self.world_transform(id).map(|m| m.w_axis.truncate())
    }

    pub fn material(&self, id: EntityId) -> Result<MaterialId, RegistryError> {
        self.world.get::<MaterialBinding>(id.entity()).map(|m| m.0).ok_or(RegistryError::EntityNotFound(id))
    }

    pub fn primitive(&self, id: EntityId) -> Result<MeshPrimitive, RegistryError> {
        self.world.get::<Shape>(id.entity()).map(|s| s.0).ok_or(RegistryError::EntityNotFound(id))
    }

    pub fn set_interactive(&mut self, id: EntityId, profile: ActivationProfile) -> Result<(), RegistryError> {
        let mut entity = self.world.get_entity_mut(id.entity()).map_err(|_| RegistryError::EntityNotFound(id))?;
        entity.insert(profile);
        Ok(())
    }

    pub fn clear_interactive(&mut self, id: EntityId) -> Result<(), RegistryError> {
        let mut entity = self.world.get_entity_mut(id.entity()).map_err(|_| RegistryError::EntityNotFound(id))?;
        entity.remove::<ActivationProfile>();
        Ok(())
    }

    /// `false` for unknown ids as well as for non-interactive entities.
    pub fn is_interactive(&self, id: EntityId) -> bool {
        self.world.get::<ActivationProfile>(id.entity()).is_some()
    }

    pub fn activation_profile(&self, id: EntityId) -> Result<Option<ActivationProfile>, RegistryError> {
        if !self.contains(id) {
            return Err(RegistryError::EntityNotFound(id));
        }
        Ok(self.world.get::<ActivationProfile>(id.entity()).cloned())
    }

    pub fn children(&self, id: EntityId) -> Result<Vec<EntityId>, RegistryError> {
        if !self.contains(id) {
            return Err(RegistryError::EntityNotFound(id));
        }
        Ok(self
            .world
            .get::<Children>(id.entity())
            .map(|c| c.0.iter().copied().map(EntityId::from_entity).collect())
            .unwrap_or_default())
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.order.iter().copied().map(EntityId::from_entity)
    }

    /// Visits every entity in creation order.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&EntityView),
    {
        for id in self.ids() {
            if let Ok(view) = self.get(id) {
                visit(&view);
            }
        }
    }

    /// Recomputes world matrices from local transforms, parents first.
    pub fn propagate_transforms(&mut self) {
        for index in 0..self.order.len() {
            let entity = self.order[index];
            let Some(local) = self.world.get::<Transform3D>(entity).map(Transform3D::to_matrix) else {
                continue;
            };
            let world_matrix = match self.world.get::<Parent>(entity).map(|p| p.0) {
                Some(parent) => self.world_matrix_of(parent) * local,
                None => local,
            };
            if let Some(mut world) = self.world.get_mut::<WorldTransform3D>(entity) {
                world.0 = world_matrix;
            }
        }
    }

    /// Removes an entity together with its descendants. Returns how many entities were removed.
    pub fn despawn(&mut self, id: EntityId) -> Result<usize, RegistryError> {
        if !self.contains(id) {
            return Err(RegistryError::EntityNotFound(id));
        }
        let root = id.entity();
        if let Some(parent) = self.world.get::<Parent>(root).map(|p| p.0) {
            if let Some(mut siblings) = self.world.get_mut::<Children>(parent) {
                siblings.0.retain(|&child| child != root);
            }
        }
        let mut stack: SmallVec<[Entity; 16]> = SmallVec::new();
        let mut doomed: SmallVec<[Entity; 16]> = SmallVec::new();
        stack.push(root);
        while let Some(entity) = stack.pop() {
            if let Some(children) = self.world.get::<Children>(entity) {
                stack.extend(children.0.iter().copied());
            }
            doomed.push(entity);
        }
        let mut removed = 0usize;
        for entity in &doomed {
            if self.world.despawn(*entity) {
                removed += 1;
            }
        }
        self.order.retain(|entity| !doomed.contains(entity));
        tracing::debug!(target: "registry", "despawned {id} and {} descendants", removed.saturating_sub(1));
        Ok(removed)
    }

    fn world_matrix_of(&self, entity: Entity) -> Mat4 {
        self.world.get::<WorldTransform3D>(entity).map(|w| w.0).unwrap_or(Mat4::IDENTITY)
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
