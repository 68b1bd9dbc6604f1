use glam::Vec2;
use prop_scatter::prelude::*;
use proptest::prelude::*;

const TILE: f32 = 16.0;
const HEIGHT: f32 = 8.0;

fn approx(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() <= eps
}

/// `tiles_x` by `tiles_z` tiles whose stitched samples lie on `a + b * gx + c * gz`.
fn planar_tiles(
    tiles_x: i32,
    tiles_z: i32,
    resolution: usize,
    (a, b, c): (f32, f32, f32),
) -> Vec<TerrainTile> {
    let step = resolution - 1;
    let mut tiles = Vec::new();
    for tz in 0..tiles_z {
        for tx in 0..tiles_x {
            tiles.push(TerrainTile::from_fn(
                TileCoord(tx, tz),
                [tx as f32 * TILE, 0.0, tz as f32 * TILE],
                [TILE, HEIGHT, TILE],
                resolution,
                |sx, sz| {
                    let gx = (tx as usize * step + sx) as f32;
                    let gz = (tz as usize * step + sz) as f32;
                    a + b * gx + c * gz
                },
            ));
        }
    }
    tiles
}

fn arb_plane() -> impl Strategy<Value = (f32, f32, f32)> {
    (0.0f32..0.5, -0.02f32..0.02, -0.02f32..0.02)
}

proptest! {
    // A planar height field is reproduced exactly by the triangulated surface.
    #[test]
    fn planar_surface_is_exact(
        tiles_x in 1i32..4,
        tiles_z in 1i32..4,
        resolution in 2usize..9,
        plane in arb_plane(),
        u in 0.0f32..1.0,
        v in 0.0f32..1.0,
    ) {
        let tiles = planar_tiles(tiles_x, tiles_z, resolution, plane);
        let hf = HeightField::build(&tiles).expect("planar terrain");
        let extent = Vec2::new(tiles_x as f32 * TILE, tiles_z as f32 * TILE);
        let xz = Vec2::new(u, v) * (extent - Vec2::splat(0.01));

        let step = (resolution - 1) as f32;
        let (a, b, c) = plane;
        let gx = xz.x / TILE * step;
        let gz = xz.y / TILE * step;
        let expected = (a + b * gx + c * gz) * HEIGHT;
        let got = hf.sample_height(xz);
        prop_assert!(approx(got, expected, 1e-3), "got {got}, expected {expected}");
    }

    // Interpolated heights never leave the range spanned by the samples.
    #[test]
    fn heights_stay_within_sample_range(
        samples in prop::collection::vec(0.0f32..1.0, 25),
        u in -0.5f32..1.5,
        v in -0.5f32..1.5,
    ) {
        let tile = TerrainTile::new(
            TileCoord(0, 0),
            [0.0, 0.0, 0.0],
            [TILE, HEIGHT, TILE],
            5,
            samples.clone(),
        );
        let hf = HeightField::build([&tile]).expect("tile");
        let lo = samples.iter().copied().fold(f32::INFINITY, f32::min) * HEIGHT;
        let hi = samples.iter().copied().fold(f32::NEG_INFINITY, f32::max) * HEIGHT;
        let h = hf.sample_height(Vec2::new(u, v) * TILE);
        prop_assert!(h >= lo - 1e-3 && h <= hi + 1e-3, "{h} outside [{lo}, {hi}]");
    }

    // A disc reaching past the bounds is never on the terrain.
    #[test]
    fn discs_crossing_the_edge_are_rejected(
        x in 0.0f32..TILE,
        z in 0.0f32..TILE,
        radius in 0.0f32..4.0,
    ) {
        let tile = TerrainTile::flat(TileCoord(0, 0), [0.0, 0.0, 0.0], [TILE, HEIGHT, TILE], 3);
        let hf = HeightField::build([&tile]).expect("tile");
        let inside =
            x - radius > 0.0 && z - radius > 0.0 && x + radius <= TILE && z + radius <= TILE;
        prop_assert_eq!(hf.is_on_terrain(Vec2::new(x, z), radius), inside);
    }
}
