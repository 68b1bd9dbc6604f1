//! Terrain input and the stitched height field used for snapping and containment tests.
//!
//! Terrain arrives as one or more square height-mapped [`TerrainTile`]s addressed by an integer
//! [`TileCoord`]. [`HeightField::build`] stitches them into one logical surface with a single
//! bounding volume; [`connected_tiles`] extracts the group reachable from a starting tile.
use glam::Vec3;

pub mod height_field;
pub mod tile;

pub use height_field::HeightField;
pub use tile::{connected_tiles, TerrainTile, TileCoord};

/// Axis-aligned bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box spanning `origin .. origin + size`.
    pub fn from_origin_size(origin: Vec3, size: Vec3) -> Self {
        Self {
            min: origin,
            max: origin + size,
        }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Whether the point lies inside the box on the horizontal (x, z) plane.
    pub fn contains_xz(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.z >= self.min.z && p.z <= self.max.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_encapsulates_both_boxes() {
        let a = Aabb::from_origin_size(Vec3::ZERO, Vec3::splat(10.0));
        let b = Aabb::from_origin_size(Vec3::new(10.0, -5.0, 0.0), Vec3::splat(10.0));
        let u = a.union(&b);
        assert_eq!(u.min, Vec3::new(0.0, -5.0, 0.0));
        assert_eq!(u.max, Vec3::new(20.0, 10.0, 10.0));
        assert_eq!(u.size(), Vec3::new(20.0, 15.0, 10.0));
    }

    #[test]
    fn contains_xz_ignores_height() {
        let a = Aabb::from_origin_size(Vec3::ZERO, Vec3::new(4.0, 1.0, 4.0));
        assert!(a.contains_xz(Vec3::new(2.0, 100.0, 2.0)));
        assert!(!a.contains_xz(Vec3::new(5.0, 0.5, 2.0)));
    }
}
