#![forbid(unsafe_code)]

mod rendering;
mod terrain;

pub use rendering::{init_tracing, render_output_to_png, RenderConfig, RuleStyle};
pub use terrain::{rolling_tiles, TerrainSpec};
