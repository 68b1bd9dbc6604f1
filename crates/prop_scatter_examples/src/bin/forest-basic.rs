use std::sync::Arc;

use glam::Vec3;
use prop_scatter::prelude::*;
use prop_scatter_examples::{
    init_tracing, render_output_to_png, rolling_tiles, RenderConfig, RuleStyle, TerrainSpec,
};
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let tiles = rolling_tiles(TerrainSpec::default(), &[]);
    let height_field = Arc::new(HeightField::build(&tiles)?);

    let rule_sets = [
        RuleSet::new("trees")
            .with_radii(2.0, 3.0)
            .with_scale_range(Vec3::splat(0.8), Vec3::splat(1.3)),
        RuleSet::new("bushes").with_radii(1.0, 1.0),
        RuleSet::new("grass").with_radii(0.3, 0.5),
    ];

    let config = RunConfig::default().with_seed(42);
    let output = run_placement(
        &config,
        height_field.clone(),
        &rule_sets,
        &InstanceRegistry::new(),
    )?;

    for rule in 0..output.grids.rule_set_count() {
        info!(
            rule_set = output.grids.rule_id(rule),
            placements = output.grids.placement_count(rule),
            "rule set filled"
        );
    }
    info!(
        partitions = output.stats.partitions,
        elapsed = ?output.stats.elapsed,
        "placement finished"
    );

    let mut render = RenderConfig::new((1024, 1024));
    render
        .set_rule_style(
            "trees",
            RuleStyle {
                color: [20, 70, 20],
                radius: 6,
            },
        )
        .set_rule_style(
            "bushes",
            RuleStyle {
                color: [120, 160, 40],
                radius: 3,
            },
        )
        .set_rule_style(
            "grass",
            RuleStyle {
                color: [200, 230, 120],
                radius: 1,
            },
        );
    render_output_to_png(&output, &height_field, &render, "forest-basic.png")?;
    Ok(())
}
