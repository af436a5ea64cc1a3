use glam::Vec3;

/// Axis-aligned bounds in mesh-local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub radius: f32,
}

impl MeshBounds {
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        let radius = (max - min).length() * 0.5;
        Self { min, max, radius }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Primitive shapes the renderer knows how to build. Dimensions are in local units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeshPrimitive {
    Box { size: Vec3 },
    /// Y-up cylinder.
    Cylinder { diameter: f32, height: f32 },
    /// Flat disc facing +Z.
    Disc { radius: f32 },
    /// Ground plane on XZ; never pickable.
    Ground { width: f32, depth: f32 },
    /// Grouping node without geometry.
    Empty,
}

/// Thickness given to flat primitives so rays can still hit them edge-on.
const FLAT_EPSILON: f32 = 0.005;

impl MeshPrimitive {
    pub fn bounds(&self) -> Option<MeshBounds> {
        match *self {
            MeshPrimitive::Box { size } => {
                let half = size.abs() * 0.5;
                Some(MeshBounds::from_min_max(-half, half))
            }
            MeshPrimitive::Cylinder { diameter, height } => {
                let r = diameter.abs() * 0.5;
                let h = height.abs() * 0.5;
                Some(MeshBounds::from_min_max(Vec3::new(-r, -h, -r), Vec3::new(r, h, r)))
            }
            MeshPrimitive::Disc { radius } => {
                let r = radius.abs();
                Some(MeshBounds::from_min_max(
                    Vec3::new(-r, -r, -FLAT_EPSILON),
                    Vec3::new(r, r, FLAT_EPSILON),
                ))
            }
            MeshPrimitive::Ground { width, depth } => {
                let hw = width.abs() * 0.5;
                let hd = depth.abs() * 0.5;
                Some(MeshBounds::from_min_max(
                    Vec3::new(-hw, -FLAT_EPSILON, -hd),
                    Vec3::new(hw, FLAT_EPSILON, hd),
                ))
            }
            MeshPrimitive::Empty => None,
        }
    }

    /// Whether pointer and controller rays are tested against this shape.
    pub fn pickable(&self) -> bool {
        !matches!(self, MeshPrimitive::Ground { .. } | MeshPrimitive::Empty)
    }

    pub fn label(&self) -> &'static str {
        match self {
            MeshPrimitive::Box { .. } => "box",
            MeshPrimitive::Cylinder { .. } => "cylinder",
            MeshPrimitive::Disc { .. } => "disc",
            MeshPrimitive::Ground { .. } => "ground",
            MeshPrimitive::Empty => "empty",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cylinder_bounds_cover_radius_and_height() {
        let bounds = MeshPrimitive::Cylinder { diameter: 1.0, height: 0.2 }.bounds().expect("bounds");
        assert_eq!(bounds.min, Vec3::new(-0.5, -0.1, -0.5));
        assert_eq!(bounds.max, Vec3::new(0.5, 0.1, 0.5));
        assert_eq!(bounds.center(), Vec3::ZERO);
    }

    #[test]
    fn ground_and_empty_are_not_pickable() {
        assert!(!MeshPrimitive::Ground { width: 10.0, depth: 10.0 }.pickable());
        assert!(!MeshPrimitive::Empty.pickable());
        assert!(MeshPrimitive::Empty.bounds().is_none());
        assert!(MeshPrimitive::Disc { radius: 1.0 }.pickable());
    }
}
