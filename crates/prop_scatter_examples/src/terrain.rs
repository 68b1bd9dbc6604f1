use prop_scatter::prelude::*;

/// Square grid of procedurally shaped tiles.
#[derive(Clone, Copy, Debug)]
pub struct TerrainSpec {
    pub tiles: i32,
    pub tile_size: f32,
    pub height: f32,
    pub resolution: usize,
}

impl Default for TerrainSpec {
    fn default() -> Self {
        Self {
            tiles: 2,
            tile_size: 64.0,
            height: 12.0,
            resolution: 33,
        }
    }
}

/// Tiles of a gentle sine landscape, skipping the coordinates in `holes`.
pub fn rolling_tiles(spec: TerrainSpec, holes: &[TileCoord]) -> Vec<TerrainTile> {
    let step = (spec.resolution - 1) as f32;
    let mut tiles = Vec::new();
    for z in 0..spec.tiles {
        for x in 0..spec.tiles {
            let coord = TileCoord(x, z);
            if holes.contains(&coord) {
                continue;
            }
            tiles.push(TerrainTile::from_fn(
                coord,
                [x as f32 * spec.tile_size, 0.0, z as f32 * spec.tile_size],
                [spec.tile_size, spec.height, spec.tile_size],
                spec.resolution,
                |sx, sz| {
                    let gx = x as f32 + sx as f32 / step;
                    let gz = z as f32 + sz as f32 / step;
                    0.5 + 0.25 * (gx * 2.1).sin() * (gz * 1.7).cos()
                },
            ));
        }
    }
    tiles
}
