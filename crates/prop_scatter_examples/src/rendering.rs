use std::collections::HashMap;
use std::path::Path;

use glam::Vec2;
use image::{Rgb, RgbImage};
use prop_scatter::prelude::*;
use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber honouring `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// How placements of one rule set are drawn.
#[derive(Clone, Copy, Debug)]
pub struct RuleStyle {
    pub color: [u8; 3],
    /// Disc radius in pixels.
    pub radius: u32,
}

impl Default for RuleStyle {
    fn default() -> Self {
        Self {
            color: [255, 0, 255],
            radius: 2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub image_size: (u32, u32),
    /// Drawn where no terrain tile is present.
    pub background: [u8; 3],
    /// Preexisting placements are drawn with this color instead of their rule set's.
    pub preexisting_color: Option<[u8; 3]>,
    pub partition_lines: bool,
    styles: HashMap<String, RuleStyle>,
}

impl RenderConfig {
    pub fn new(image_size: (u32, u32)) -> Self {
        Self {
            image_size,
            background: [30, 30, 40],
            preexisting_color: None,
            partition_lines: false,
            styles: HashMap::new(),
        }
    }

    pub fn with_background(mut self, background: [u8; 3]) -> Self {
        self.background = background;
        self
    }

    pub fn with_preexisting_color(mut self, color: [u8; 3]) -> Self {
        self.preexisting_color = Some(color);
        self
    }

    pub fn with_partition_lines(mut self, enabled: bool) -> Self {
        self.partition_lines = enabled;
        self
    }

    pub fn set_rule_style(&mut self, rule_set: impl Into<String>, style: RuleStyle) -> &mut Self {
        self.styles.insert(rule_set.into(), style);
        self
    }

    fn style(&self, rule_set: &str) -> RuleStyle {
        self.styles.get(rule_set).copied().unwrap_or_default()
    }
}

/// Renders a top-down shaded view of the terrain with every placement on top.
pub fn render_output_to_png(
    output: &PlacementOutput,
    height_field: &HeightField,
    config: &RenderConfig,
    path: impl AsRef<Path>,
) -> anyhow::Result<()> {
    let (w, h) = config.image_size;
    anyhow::ensure!(w > 0 && h > 0, "image size must be non-zero");

    let bounds = output.bounds;
    let min = Vec2::new(bounds.min.x, bounds.min.z);
    let extent = Vec2::new(bounds.size().x, bounds.size().z);
    let height_span = bounds.size().y.max(f32::EPSILON);
    let to_world = |px: u32, py: u32| {
        min + Vec2::new((px as f32 + 0.5) / w as f32, (py as f32 + 0.5) / h as f32) * extent
    };
    let to_pixel = |p: Vec2| {
        let uv = (p - min) / extent;
        ((uv.x * w as f32) as i64, (uv.y * h as f32) as i64)
    };

    let mut img = RgbImage::from_pixel(w, h, Rgb(config.background));
    for py in 0..h {
        for px in 0..w {
            let xz = to_world(px, py);
            if !height_field.is_on_terrain(xz, 0.0) {
                continue;
            }
            let t = (height_field.sample_height(xz) - bounds.min.y) / height_span;
            let t = t.clamp(0.0, 1.0);
            let shade = |lo: f32, hi: f32| (lo + (hi - lo) * t) as u8;
            let color = [shade(60.0, 170.0), shade(90.0, 190.0), shade(50.0, 140.0)];
            img.put_pixel(px, py, Rgb(color));
        }
    }

    if config.partition_lines {
        let layout = &output.partitions;
        for i in 1..layout.counts.x {
            let (x, _) = to_pixel(layout.partition_bounds(PartitionId::new(i, 0)).0);
            for py in 0..h {
                put(&mut img, x, py as i64, [0, 0, 0]);
            }
        }
        for j in 1..layout.counts.y {
            let (_, y) = to_pixel(layout.partition_bounds(PartitionId::new(0, j)).0);
            for px in 0..w {
                put(&mut img, px as i64, y, [0, 0, 0]);
            }
        }
    }

    let grids = &output.grids;
    for rule in 0..grids.rule_set_count() {
        let style = config.style(grids.rule_id(rule));
        for p in grids.placements_for(rule) {
            let color = match config.preexisting_color {
                Some(c) if !p.needs_spawning => c,
                _ => style.color,
            };
            let center = to_pixel(Vec2::new(p.position.x, p.position.z));
            draw_disc(&mut img, center, style.radius, color);
        }
    }

    img.save(path)?;
    Ok(())
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: [u8; 3]) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, Rgb(color));
    }
}

fn draw_disc(img: &mut RgbImage, (cx, cy): (i64, i64), radius: u32, color: [u8; 3]) {
    let r = radius as i64;
    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy <= r * r {
                put(img, cx + dx, cy + dy, color);
            }
        }
    }
}
