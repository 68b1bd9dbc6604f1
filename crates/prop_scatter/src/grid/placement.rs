use glam::{Quat, Vec3};

/// A committed prop instance.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Placement {
    /// World-space position, snapped to the terrain surface.
    pub position: Vec3,
    pub rotation: Quat,
    /// Non-uniform scale.
    pub scale: Vec3,
    /// True when generated by this run; false for instances that already existed.
    pub needs_spawning: bool,
}

impl Placement {
    /// A placement generated by this run.
    pub fn generated(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
            needs_spawning: true,
        }
    }

    /// A placement describing an instance that already exists in the scene.
    pub fn preexisting(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
            needs_spawning: false,
        }
    }

    /// Squared 3-D distance to a point.
    #[inline]
    pub fn distance_squared(&self, point: Vec3) -> f32 {
        self.position.distance_squared(point)
    }
}
