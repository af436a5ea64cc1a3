use super::registry::EntityRegistry;
use super::types::EntityId;
use crate::mesh::MeshBounds;
use glam::{Mat4, Vec3};

/// World-space ray with a normalized direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Returns `None` for a zero or non-finite direction.
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let direction = direction.normalize_or_zero();
        if direction.length_squared() <= f32::EPSILON || !origin.is_finite() {
            return None;
        }
        Some(Self { origin, direction })
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub entity: EntityId,
    pub point: Vec3,
    pub distance: f32,
}

/// Scene query used by both input paths.
pub trait RayCaster {
    fn cast(&self, registry: &EntityRegistry, ray: &Ray) -> Option<RayHit>;
}

/// Nearest oriented-bounding-box hit over every pickable entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneRayCaster;

impl RayCaster for SceneRayCaster {
    fn cast(&self, registry: &EntityRegistry, ray: &Ray) -> Option<RayHit> {
        let mut closest: Option<RayHit> = None;
        registry.for_each(|view| {
            if !view.primitive.pickable() {
                return;
            }
            let Some(bounds) = view.primitive.bounds() else {
                return;
            };
            let Some(distance) = ray_hit_obb(ray.origin, ray.direction, &view.world, &bounds) else {
                return;
            };
            if closest.map_or(true, |best| distance < best.distance) {
                closest = Some(RayHit { entity: view.id, point: ray.at(distance), distance });
            }
        });
        closest
    }
}

pub fn ray_hit_obb(origin: Vec3, dir: Vec3, world: &Mat4, bounds: &MeshBounds) -> Option<f32> {
    if !matrix_is_finite(world) || world.determinant().abs() <= f32::EPSILON {
        return None;
    }
    let inv = world.inverse();
    if !matrix_is_finite(&inv) {
        return None;
    }
    let origin_local = inv.transform_point3(origin);
    let dir_local = inv.transform_vector3(dir);
    if dir_local.length_squared() <= f32::EPSILON {
        return None;
    }
    let dir_local = dir_local.normalize();
    let (t_local, hit_local) = ray_aabb_intersection(origin_local, dir_local, bounds.min, bounds.max)?;
    if t_local < 0.0 {
        return None;
    }
    let hit_world = world.transform_point3(hit_local);
    Some((hit_world - origin).length())
}

pub fn matrix_is_finite(mat: &Mat4) -> bool {
    mat.to_cols_array().iter().all(|v| v.is_finite())
}

pub fn ray_aabb_intersection(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_min: f32 = 0.0;
    let mut t_max: f32 = f32::INFINITY;
    let origin_arr = origin.to_array();
    let dir_arr = dir.to_array();
    let min_arr = min.to_array();
    let max_arr = max.to_array();
    for i in 0..3 {
        let o = origin_arr[i];
        let d = dir_arr[i];
        if d.abs() < 1e-6 {
            if o < min_arr[i] || o > max_arr[i] {
                return None;
            }
        } else {
            let inv_d = 1.0 / d;
            let mut t1 = (min_arr[i] - o) * inv_d;
            let mut t2 = (max_arr[i] - o) * inv_d;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }
    }
    if t_max < 0.0 {
        return None;
    }
    let t_hit = if t_min >= 0.0 { t_min } else { t_max };
    Some((t_hit, origin + dir * t_hit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{EntityDesc, EntityKind, Transform3D};
    use crate::material_registry::MaterialRegistry;
    use crate::mesh::MeshPrimitive;
    use glam::Quat;

    #[test]
    fn nearest_entity_wins() {
        let materials = MaterialRegistry::new();
        let mut registry = EntityRegistry::new();
        let cube = MeshPrimitive::Box { size: Vec3::ONE };
        let far = registry
            .create(&materials, EntityDesc::new(EntityKind::Prop, cube).at(Vec3::new(0.0, 0.0, -5.0)))
            .unwrap();
        let near = registry.create(&materials, EntityDesc::new(EntityKind::Prop, cube)).unwrap();
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z).unwrap();
        let hit = SceneRayCaster.cast(&registry, &ray).expect("hit");
        assert_eq!(hit.entity, near);
        assert!((hit.distance - 4.5).abs() < 1e-4);
        assert!((hit.point - Vec3::new(0.0, 0.0, 0.5)).length() < 1e-4);
        assert_ne!(hit.entity, far);
    }

    #[test]
    fn rotated_and_scaled_boxes_are_hit() {
        let materials = MaterialRegistry::new();
        let mut registry = EntityRegistry::new();
        let transform = Transform3D::from_translation(Vec3::new(1.5, 0.0, 0.0))
            .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_4))
            .with_scale(Vec3::new(0.25, 1.0, 0.5));
        let id = registry
            .create(
                &materials,
                EntityDesc::new(EntityKind::Prop, MeshPrimitive::Box { size: Vec3::ONE }).with_transform(transform),
            )
            .unwrap();
        let ray = Ray::new(Vec3::new(1.5, 0.25, 4.0), Vec3::new(0.05, -0.05, -1.0)).unwrap();
        assert_eq!(SceneRayCaster.cast(&registry, &ray).map(|h| h.entity), Some(id));
        let miss = Ray::new(Vec3::new(1.5, 0.25, 4.0), Vec3::new(5.0, 0.0, -1.0)).unwrap();
        assert!(SceneRayCaster.cast(&registry, &miss).is_none());
    }

    #[test]
    fn ground_is_ignored() {
        let materials = MaterialRegistry::new();
        let mut registry = EntityRegistry::new();
        registry
            .create(&materials, EntityDesc::new(EntityKind::Ground, MeshPrimitive::Ground { width: 20.0, depth: 20.0 }))
            .unwrap();
        let ray = Ray::new(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y).unwrap();
        assert!(SceneRayCaster.cast(&registry, &ray).is_none());
    }

    #[test]
    fn degenerate_rays_are_rejected() {
        assert!(Ray::new(Vec3::ZERO, Vec3::ZERO).is_none());
        assert!(Ray::new(Vec3::splat(f32::NAN), Vec3::X).is_none());
    }
}
