//! Terrain tiles and tile-group discovery.
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use glam::Vec3;

use super::Aabb;

/// Integer position of a tile in the stitched tile grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileCoord(
    /// Tile index along the world X axis.
    pub i32,
    /// Tile index along the world Z axis.
    pub i32,
);

impl TileCoord {
    /// The four edge-sharing neighbours (+x, -x, +z, -z).
    pub fn neighbors(self) -> [TileCoord; 4] {
        let TileCoord(x, z) = self;
        [
            TileCoord(x + 1, z),
            TileCoord(x - 1, z),
            TileCoord(x, z + 1),
            TileCoord(x, z - 1),
        ]
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.0, self.1)
    }
}

/// One square height-mapped terrain tile.
///
/// `heights` holds `resolution × resolution` normalized samples in `[0, 1]`, row-major with rows
/// running along +Z. A sample value is scaled by `size.y` to obtain its height above `position.y`.
#[derive(Clone, Debug)]
pub struct TerrainTile {
    /// Position of the tile in the tile grid.
    pub coord: TileCoord,
    /// World-space minimum corner of the tile.
    pub position: Vec3,
    /// Physical extent of the tile (x, max height, z).
    pub size: Vec3,
    /// Samples per side.
    pub resolution: usize,
    /// Normalized height samples.
    pub heights: Vec<f32>,
}

impl TerrainTile {
    pub fn new(
        coord: TileCoord,
        position: impl Into<mint::Vector3<f32>>,
        size: impl Into<mint::Vector3<f32>>,
        resolution: usize,
        heights: Vec<f32>,
    ) -> Self {
        Self {
            coord,
            position: Vec3::from(position.into()),
            size: Vec3::from(size.into()),
            resolution,
            heights,
        }
    }

    /// A tile whose samples are all zero.
    pub fn flat(
        coord: TileCoord,
        position: impl Into<mint::Vector3<f32>>,
        size: impl Into<mint::Vector3<f32>>,
        resolution: usize,
    ) -> Self {
        Self::new(
            coord,
            position,
            size,
            resolution,
            vec![0.0; resolution * resolution],
        )
    }

    /// A tile whose samples are produced by `f(x, z)` in sample coordinates.
    pub fn from_fn(
        coord: TileCoord,
        position: impl Into<mint::Vector3<f32>>,
        size: impl Into<mint::Vector3<f32>>,
        resolution: usize,
        mut f: impl FnMut(usize, usize) -> f32,
    ) -> Self {
        let mut heights = Vec::with_capacity(resolution * resolution);
        for z in 0..resolution {
            for x in 0..resolution {
                heights.push(f(x, z));
            }
        }
        Self::new(coord, position, size, resolution, heights)
    }

    /// World-space bounds of the tile.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_origin_size(self.position, self.size)
    }

    /// Normalized sample at `(x, z)`, or `None` outside the tile.
    pub fn sample(&self, x: usize, z: usize) -> Option<f32> {
        if x >= self.resolution || z >= self.resolution {
            return None;
        }
        self.heights.get(x + z * self.resolution).copied()
    }
}

/// Returns the tiles edge-connected to `start`, walking the four neighbour directions.
///
/// Tiles not reachable from `start` are left out, as are duplicates of an already visited
/// coordinate. Returns an empty list if no tile sits at `start`.
pub fn connected_tiles(tiles: &[TerrainTile], start: TileCoord) -> Vec<&TerrainTile> {
    let mut by_coord: HashMap<TileCoord, &TerrainTile> = HashMap::with_capacity(tiles.len());
    for tile in tiles {
        by_coord.entry(tile.coord).or_insert(tile);
    }

    let mut out = Vec::new();
    if !by_coord.contains_key(&start) {
        return out;
    }

    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([start]);
    seen.insert(start);
    while let Some(coord) = queue.pop_front() {
        let Some(tile) = by_coord.get(&coord) else {
            continue;
        };
        out.push(*tile);
        for n in coord.neighbors() {
            if by_coord.contains_key(&n) && seen.insert(n) {
                queue.push_back(n);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(x: i32, z: i32) -> TerrainTile {
        TerrainTile::flat(
            TileCoord(x, z),
            [x as f32 * 10.0, 0.0, z as f32 * 10.0],
            [10.0, 5.0, 10.0],
            3,
        )
    }

    #[test]
    fn from_fn_fills_row_major() {
        let t = TerrainTile::from_fn(TileCoord(0, 0), [0.0; 3], [1.0; 3], 2, |x, z| {
            (x + 10 * z) as f32
        });
        assert_eq!(t.heights, vec![0.0, 1.0, 10.0, 11.0]);
        assert_eq!(t.sample(1, 1), Some(11.0));
        assert_eq!(t.sample(2, 0), None);
    }

    #[test]
    fn connected_tiles_skips_islands() {
        let tiles = vec![tile(0, 0), tile(1, 0), tile(1, 1), tile(3, 0)];
        let group = connected_tiles(&tiles, TileCoord(0, 0));
        let mut coords: Vec<_> = group.iter().map(|t| t.coord).collect();
        coords.sort();
        assert_eq!(coords, vec![TileCoord(0, 0), TileCoord(1, 0), TileCoord(1, 1)]);
    }

    #[test]
    fn connected_tiles_empty_for_missing_start() {
        let tiles = vec![tile(0, 0)];
        assert!(connected_tiles(&tiles, TileCoord(5, 5)).is_empty());
    }

    #[test]
    fn tile_bounds_use_position_and_size() {
        let t = tile(2, 1);
        let b = t.bounds();
        assert_eq!(b.min, Vec3::new(20.0, 0.0, 10.0));
        assert_eq!(b.max, Vec3::new(30.0, 5.0, 20.0));
    }
}
