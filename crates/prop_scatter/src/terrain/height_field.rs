//! Stitched height field over a group of terrain tiles.
//!
//! Adjacent tiles share their border samples, so a group of `n` tiles along an axis with
//! `resolution` samples each yields `n * (resolution - 1) + 1` stitched samples on that axis.
//! Grid slots without a tile keep zero heights and are marked empty in the occupancy bitmap.
use std::collections::HashMap;

use glam::{UVec2, Vec2, Vec3, Vec3Swizzles};
use tracing::debug;

use super::tile::{TerrainTile, TileCoord};
use super::Aabb;
use crate::error::{Error, Result};

/// Queries are clamped this far inside the far edges so the enclosing quad always exists.
const EDGE_EPSILON: f32 = 0.001;

/// Relative tolerance when comparing tile sizes.
const SIZE_TOLERANCE: f32 = 1e-4;

/// One logical height field covering every stitched tile.
#[derive(Clone, Debug)]
pub struct HeightField {
    bounds: Aabb,
    origin_tile: TileCoord,
    tile_size: Vec3,
    tile_counts: UVec2,
    tile_resolution: usize,
    sample_counts: UVec2,
    heights: Vec<f32>,
    occupancy: Vec<bool>,
}

impl HeightField {
    /// Stitches the given tiles into one height field.
    ///
    /// All tiles must share the same resolution and physical size; the first tile is the
    /// reference. Tiles are placed in the stitched grid by their [`TileCoord`].
    pub fn build<'a>(tiles: impl IntoIterator<Item = &'a TerrainTile>) -> Result<Self> {
        let tiles: Vec<&TerrainTile> = tiles.into_iter().collect();
        let Some(first) = tiles.first() else {
            return Err(Error::InvalidTerrain("no terrain tiles".into()));
        };

        let resolution = first.resolution;
        let tile_size = first.size;
        if resolution < 2 {
            return Err(Error::InvalidTerrain(format!(
                "tile {} resolution must be >= 2, got {resolution}",
                first.coord
            )));
        }
        if tile_size.x <= 0.0 || tile_size.z <= 0.0 || !tile_size.is_finite() {
            return Err(Error::InvalidTerrain(format!(
                "tile {} size must be finite and > 0 on x and z",
                first.coord
            )));
        }

        let mut by_coord: HashMap<TileCoord, &TerrainTile> = HashMap::with_capacity(tiles.len());
        let mut min = first.coord;
        let mut max = first.coord;
        let mut bounds = first.bounds();
        let size_eps = SIZE_TOLERANCE * tile_size.max_element().max(1.0);
        for tile in &tiles {
            if tile.resolution != resolution || !tile.size.abs_diff_eq(tile_size, size_eps) {
                return Err(Error::InvalidTerrain(
                    "all connected terrain tiles must have the same size and heightmap resolution"
                        .into(),
                ));
            }
            if tile.heights.len() != resolution * resolution {
                return Err(Error::InvalidTerrain(format!(
                    "tile {} has {} height samples, expected {}",
                    tile.coord,
                    tile.heights.len(),
                    resolution * resolution
                )));
            }
            let steps = Vec2::new(
                (tile.coord.0 - first.coord.0) as f32,
                (tile.coord.1 - first.coord.1) as f32,
            );
            let expected = first.position.xz() + steps * tile_size.xz();
            let actual = tile.position.xz();
            // Rounding grows with the distance from the reference tile.
            let position_eps = size_eps * (1.0 + steps.abs().max_element());
            if !actual.abs_diff_eq(expected, position_eps) {
                return Err(Error::InvalidTerrain(format!(
                    "tile {} sits at ({}, {}) but its coordinate places it at ({}, {})",
                    tile.coord, actual.x, actual.y, expected.x, expected.y
                )));
            }
            if by_coord.insert(tile.coord, tile).is_some() {
                return Err(Error::InvalidTerrain(format!(
                    "more than one tile at {}",
                    tile.coord
                )));
            }
            min = TileCoord(min.0.min(tile.coord.0), min.1.min(tile.coord.1));
            max = TileCoord(max.0.max(tile.coord.0), max.1.max(tile.coord.1));
            bounds = bounds.union(&tile.bounds());
        }

        let tile_counts = UVec2::new((max.0 - min.0 + 1) as u32, (max.1 - min.1 + 1) as u32);
        let step = resolution - 1;
        let sample_counts = UVec2::new(
            tile_counts.x * step as u32 + 1,
            tile_counts.y * step as u32 + 1,
        );
        let sx = sample_counts.x as usize;
        let mut heights = vec![0.0f32; sx * sample_counts.y as usize];
        let mut occupancy = vec![false; (tile_counts.x * tile_counts.y) as usize];

        for (coord, tile) in &by_coord {
            let tx = (coord.0 - min.0) as usize;
            let tz = (coord.1 - min.1) as usize;
            occupancy[tx + tz * tile_counts.x as usize] = true;
            for z in 0..resolution {
                let row = (tz * step + z) * sx + tx * step;
                let src = &tile.heights[z * resolution..(z + 1) * resolution];
                heights[row..row + resolution].copy_from_slice(src);
            }
        }

        debug!(
            "Stitched {} terrain tile(s) into {}x{} tiles, {}x{} samples.",
            by_coord.len(),
            tile_counts.x,
            tile_counts.y,
            sample_counts.x,
            sample_counts.y
        );

        Ok(Self {
            bounds,
            origin_tile: min,
            tile_size,
            tile_counts,
            tile_resolution: resolution,
            sample_counts,
            heights,
            occupancy,
        })
    }

    /// World-space bounding volume of all stitched tiles.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Size of one tile.
    pub fn tile_size(&self) -> Vec3 {
        self.tile_size
    }

    /// Tiles per axis in the stitched grid, including empty slots.
    pub fn tile_counts(&self) -> UVec2 {
        self.tile_counts
    }

    /// Samples per tile side.
    pub fn tile_resolution(&self) -> usize {
        self.tile_resolution
    }

    /// Stitched samples per axis.
    pub fn sample_counts(&self) -> UVec2 {
        self.sample_counts
    }

    /// Whether a tile was supplied at `coord`.
    pub fn is_tile_present(&self, coord: TileCoord) -> bool {
        let x = coord.0 - self.origin_tile.0;
        let z = coord.1 - self.origin_tile.1;
        if x < 0 || z < 0 || x as u32 >= self.tile_counts.x || z as u32 >= self.tile_counts.y {
            return false;
        }
        self.occupancy[x as usize + z as usize * self.tile_counts.x as usize]
    }

    /// Height of the triangulated surface at world `(x, z)`.
    ///
    /// The enclosing sample quad is split along its main diagonal; the query is evaluated on the
    /// plane of whichever triangle contains it. Positions outside the volume are clamped.
    pub fn sample_height(&self, world_xz: Vec2) -> f32 {
        let size = self.bounds.size();
        let extent = Vec2::new(size.x, size.z);
        let local = (world_xz - Vec2::new(self.bounds.min.x, self.bounds.min.z))
            .clamp(Vec2::ZERO, (extent - Vec2::splat(EDGE_EPSILON)).max(Vec2::ZERO));

        let last = Vec2::new(
            (self.sample_counts.x - 1) as f32,
            (self.sample_counts.y - 1) as f32,
        );
        let sample_pos = local / extent * last;
        let x0 = (sample_pos.x as u32).min(self.sample_counts.x - 2);
        let z0 = (sample_pos.y as u32).min(self.sample_counts.y - 2);
        let frac = sample_pos - Vec2::new(x0 as f32, z0 as f32);
        let upper_left = frac.y > frac.x;

        let v0 = self.vertex_local(x0, z0);
        let v1 = self.vertex_local(x0 + 1, z0 + 1);
        let v2 = if upper_left {
            self.vertex_local(x0, z0 + 1)
        } else {
            self.vertex_local(x0 + 1, z0)
        };
        let n = (v1 - v0).cross(v2 - v0);
        // Plane through v0 with normal n: n.x(x - x0) + n.y(y - y0) + n.z(z - z0) = 0.
        let local_y = (-n.x * (local.x - v0.x) - n.z * (local.y - v0.z)) / n.y + v0.y;
        local_y + self.bounds.min.y
    }

    /// Writes the surface height at `position.xz` into `position.y`.
    pub fn snap_to_surface(&self, position: &mut Vec3) {
        position.y = self.sample_height(Vec2::new(position.x, position.z));
    }

    /// Coarse containment test for a disc of `radius` around world `(x, z)`.
    ///
    /// The whole disc must stay inside the bounding volume and its center must land on a tile
    /// that is present.
    pub fn is_on_terrain(&self, world_xz: Vec2, radius: f32) -> bool {
        let min = self.bounds.min;
        let max = self.bounds.max;
        if world_xz.x - radius <= min.x
            || world_xz.y - radius <= min.z
            || world_xz.x + radius > max.x
            || world_xz.y + radius > max.z
        {
            return false;
        }

        let tx = (((world_xz.x - min.x) / self.tile_size.x) as u32).min(self.tile_counts.x - 1);
        let tz = (((world_xz.y - min.z) / self.tile_size.z) as u32).min(self.tile_counts.y - 1);
        self.occupancy[(tx + tz * self.tile_counts.x) as usize]
    }

    fn vertex_local(&self, x: u32, z: u32) -> Vec3 {
        let size = self.bounds.size();
        let h = self.heights[(x + z * self.sample_counts.x) as usize];
        Vec3::new(
            x as f32 / (self.sample_counts.x - 1) as f32 * size.x,
            h * size.y,
            z as f32 / (self.sample_counts.y - 1) as f32 * size.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_tile(heights: Vec<f32>) -> TerrainTile {
        TerrainTile::new(TileCoord(0, 0), [0.0; 3], [1.0, 1.0, 1.0], 2, heights)
    }

    fn flat(x: i32, z: i32, size: f32, res: usize) -> TerrainTile {
        TerrainTile::flat(
            TileCoord(x, z),
            [x as f32 * size, 2.0, z as f32 * size],
            [size, 8.0, size],
            res,
        )
    }

    #[test]
    fn empty_tile_list_is_rejected() {
        let tiles: Vec<TerrainTile> = Vec::new();
        let err = HeightField::build(&tiles).unwrap_err();
        assert!(matches!(err, Error::InvalidTerrain(_)));
    }

    #[test]
    fn mismatched_resolution_is_rejected() {
        let tiles = vec![flat(0, 0, 10.0, 3), flat(1, 0, 10.0, 5)];
        let err = HeightField::build(&tiles).unwrap_err();
        assert!(matches!(err, Error::InvalidTerrain(ref m) if m.contains("same size")));
    }

    #[test]
    fn mismatched_size_is_rejected() {
        let mut b = flat(1, 0, 10.0, 3);
        b.size.x = 12.0;
        let tiles = vec![flat(0, 0, 10.0, 3), b];
        assert!(HeightField::build(&tiles).is_err());
    }

    #[test]
    fn position_disagreeing_with_coordinate_is_rejected() {
        // (1, 0) belongs at x = 10; at x = 50 it would leave a gap the occupancy map cannot see.
        let mut far = flat(1, 0, 10.0, 3);
        far.position.x = 50.0;
        let err = HeightField::build(&[flat(0, 0, 10.0, 3), far]).unwrap_err();
        assert!(matches!(err, Error::InvalidTerrain(ref m) if m.contains("(1, 0)")));

        let mut shifted = flat(0, 1, 10.0, 3);
        shifted.position.z = 10.5;
        assert!(HeightField::build(&[flat(0, 0, 10.0, 3), shifted]).is_err());
    }

    #[test]
    fn offset_groups_with_consistent_positions_build() {
        let tiles = vec![flat(-2, 3, 10.0, 3), flat(-1, 3, 10.0, 3), flat(-2, 4, 10.0, 3)];
        let field = HeightField::build(&tiles).unwrap();
        assert_eq!(field.bounds().min, Vec3::new(-20.0, 2.0, 30.0));
        assert_eq!(field.bounds().max, Vec3::new(0.0, 10.0, 50.0));
        assert!(field.is_on_terrain(Vec2::new(-15.0, 45.0), 0.0));
        assert!(!field.is_on_terrain(Vec2::new(-5.0, 45.0), 0.0));
    }

    #[test]
    fn duplicate_coordinates_are_rejected() {
        let tiles = vec![flat(0, 0, 10.0, 3), flat(0, 0, 10.0, 3)];
        assert!(HeightField::build(&tiles).is_err());
    }

    #[test]
    fn wrong_sample_count_is_rejected() {
        let mut t = flat(0, 0, 10.0, 3);
        t.heights.pop();
        assert!(HeightField::build(&[t]).is_err());
    }

    #[test]
    fn flat_tile_samples_base_height() {
        let field = HeightField::build(&[flat(0, 0, 10.0, 5)]).unwrap();
        assert_eq!(field.sample_height(Vec2::new(3.3, 7.1)), 2.0);
        assert_eq!(field.sample_height(Vec2::new(-50.0, 500.0)), 2.0);
    }

    #[test]
    fn triangle_planes_are_evaluated_exactly() {
        // Only the far corner is raised; each triangle of the quad is a different plane.
        let field = HeightField::build(&[unit_tile(vec![0.0, 0.0, 0.0, 1.0])]).unwrap();
        let lower_right = field.sample_height(Vec2::new(0.75, 0.25));
        let upper_left = field.sample_height(Vec2::new(0.25, 0.75));
        assert!((lower_right - 0.25).abs() < 1e-5, "{lower_right}");
        assert!((upper_left - 0.25).abs() < 1e-5, "{upper_left}");

        // Blending both triangles would not give these values.
        let lr2 = field.sample_height(Vec2::new(0.6, 0.1));
        let ul2 = field.sample_height(Vec2::new(0.1, 0.6));
        assert!((lr2 - 0.1).abs() < 1e-5, "{lr2}");
        assert!((ul2 - 0.1).abs() < 1e-5, "{ul2}");
    }

    #[test]
    fn stitched_tiles_share_border_samples() {
        let a = flat(0, 0, 10.0, 3);
        let b = TerrainTile::from_fn(
            TileCoord(1, 0),
            [10.0, 2.0, 0.0],
            [10.0, 8.0, 10.0],
            3,
            |_, _| 1.0,
        );
        let field = HeightField::build(&[a, b]).unwrap();
        assert_eq!(field.sample_counts(), UVec2::new(5, 3));
        assert_eq!(field.tile_counts(), UVec2::new(2, 1));
        assert_eq!(field.bounds().min, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(field.bounds().max, Vec3::new(20.0, 10.0, 10.0));
        assert!((field.sample_height(Vec2::new(15.0, 5.0)) - 10.0).abs() < 1e-4);
        assert!((field.sample_height(Vec2::new(2.0, 5.0)) - 2.0).abs() < 1e-4);
    }

    #[test]
    fn is_on_terrain_respects_radius_and_bounds() {
        let field = HeightField::build(&[flat(0, 0, 10.0, 3)]).unwrap();
        assert!(field.is_on_terrain(Vec2::new(5.0, 5.0), 1.0));
        assert!(!field.is_on_terrain(Vec2::new(0.5, 5.0), 1.0));
        assert!(!field.is_on_terrain(Vec2::new(9.5, 5.0), 1.0));
        assert!(!field.is_on_terrain(Vec2::new(5.0, 9.5), 1.0));
        assert!(!field.is_on_terrain(Vec2::new(5.0, 0.5), 1.0));
    }

    #[test]
    fn holes_are_not_terrain() {
        let mut tiles = Vec::new();
        for z in 0..3 {
            for x in 0..3 {
                if (x, z) != (1, 1) {
                    tiles.push(flat(x, z, 10.0, 3));
                }
            }
        }
        let field = HeightField::build(&tiles).unwrap();
        assert!(!field.is_tile_present(TileCoord(1, 1)));
        assert!(field.is_tile_present(TileCoord(0, 1)));
        assert!(!field.is_tile_present(TileCoord(7, 1)));
        assert!(!field.is_on_terrain(Vec2::new(15.0, 15.0), 0.5));
        assert!(field.is_on_terrain(Vec2::new(5.0, 15.0), 0.5));
    }

    #[test]
    fn negative_tile_coordinates_are_stitched() {
        let tiles = vec![flat(-1, 0, 10.0, 3), flat(0, 0, 10.0, 3)];
        let field = HeightField::build(&tiles).unwrap();
        assert_eq!(field.bounds().min.x, -10.0);
        assert!(field.is_tile_present(TileCoord(-1, 0)));
        assert!(field.is_on_terrain(Vec2::new(-5.0, 5.0), 1.0));
    }
}
