use std::sync::Arc;
use std::time::Duration;

use criterion::{Criterion, Throughput};
use prop_scatter::prelude::{HeightField, TerrainTile, TileCoord};

pub const SAMPLE_SIZE: usize = 10;
pub const WARM_UP: Duration = Duration::from_secs(1);
pub const MEASUREMENT_TIME: Duration = Duration::from_secs(3);

pub fn default_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .sample_size(SAMPLE_SIZE)
        .warm_up_time(WARM_UP)
        .measurement_time(MEASUREMENT_TIME)
}

pub fn elements_throughput(elements: usize) -> Throughput {
    Throughput::Elements(elements.max(1) as u64)
}

/// `tiles × tiles` rolling terrain tiles of side `tile_size`, stitched.
pub fn rolling_terrain(tiles: i32, tile_size: f32, resolution: usize) -> Arc<HeightField> {
    let mut list = Vec::new();
    for z in 0..tiles {
        for x in 0..tiles {
            let position = [x as f32 * tile_size, 0.0, z as f32 * tile_size];
            let step = tile_size / (resolution - 1) as f32;
            list.push(TerrainTile::from_fn(
                TileCoord(x, z),
                position,
                [tile_size, 40.0, tile_size],
                resolution,
                |sx, sz| {
                    let wx = position[0] + sx as f32 * step;
                    let wz = position[2] + sz as f32 * step;
                    0.5 + 0.25 * (wx * 0.02).sin() * (wz * 0.015).cos()
                },
            ));
        }
    }
    Arc::new(HeightField::build(&list).expect("bench terrain"))
}
