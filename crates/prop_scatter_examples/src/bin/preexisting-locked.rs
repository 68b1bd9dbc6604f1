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

    // Rocks are hand placed: the rule set is disabled so they only act as obstacles.
    let rule_sets = vec![
        RuleSet::new("rocks").with_radii(4.0, 4.0).with_enabled(false),
        RuleSet::new("trees").with_radii(1.5, 2.5),
    ];

    let mut registry = InstanceRegistry::new();
    let rocks = (0..12).map(|i| {
        let angle = i as f32 / 12.0 * std::f32::consts::TAU;
        let mut p = Vec3::new(64.0 + angle.cos() * 35.0, 0.0, 64.0 + angle.sin() * 35.0);
        height_field.snap_to_surface(&mut p);
        InstanceTransform::at(p)
    });
    registry.insert("rocks", ExistingProp::batch(rocks));

    // A locked landmark tree survives every regeneration; the others get replaced.
    let mut landmark = Vec3::new(64.0, 0.0, 64.0);
    height_field.snap_to_surface(&mut landmark);
    registry.insert(
        "trees",
        ExistingProp::single(InstanceTransform::at(landmark)).with_locked(true),
    );
    registry.insert(
        "trees",
        ExistingProp::single(InstanceTransform::at(Vec3::new(20.0, 0.0, 20.0))),
    );

    let config = RunConfig::default().with_seed(7);
    let output = run_placement(&config, height_field.clone(), &rule_sets, &registry)?;

    let removed = registry.remove_stale(&rule_sets);
    info!(
        seeded = output.stats.preexisting.seeded,
        stale_removed = removed,
        new_trees = output.grids.new_placements_for(1).count(),
        "placement finished"
    );

    let mut render = RenderConfig::new((1024, 1024)).with_preexisting_color([230, 60, 60]);
    render
        .set_rule_style(
            "rocks",
            RuleStyle {
                color: [140, 140, 140],
                radius: 16,
            },
        )
        .set_rule_style(
            "trees",
            RuleStyle {
                color: [20, 70, 20],
                radius: 5,
            },
        );
    render_output_to_png(&output, &height_field, &render, "preexisting-locked.png")?;
    Ok(())
}
