use std::sync::Arc;
use std::thread;
use std::time::Duration;

use prop_scatter::prelude::*;
use prop_scatter_examples::{
    init_tracing, render_output_to_png, rolling_tiles, RenderConfig, RuleStyle, TerrainSpec,
};
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let spec = TerrainSpec {
        tiles: 4,
        ..Default::default()
    };
    // Two missing tiles leave holes no placement may land in.
    let holes = [TileCoord(1, 2), TileCoord(2, 2)];
    let tiles = rolling_tiles(spec, &holes);
    let height_field = Arc::new(HeightField::build(&tiles)?);

    let rule_sets = [
        RuleSet::new("trees").with_radii(2.0, 2.5),
        RuleSet::new("grass").with_radii(0.4, 0.6),
    ];
    let config = RunConfig::default().with_seed(3).with_processor_count(4);

    let scheduler = PartitionScheduler::plan(&config, height_field.clone(), &rule_sets)?;
    let counts = scheduler.layout().counts;
    info!(x = counts.x, y = counts.y, "partition grid");

    let run = scheduler.schedule()?;
    while !run.is_complete() && !run.is_cancelled() {
        info!("{:>5.1}%", run.progress() * 100.0);
        thread::sleep(Duration::from_millis(50));
    }

    let mut sink = FnSink::new(|event| match event {
        ScatterEvent::PartitionFinished { partition, stats } => {
            info!(
                %partition,
                placed = stats.placed,
                cells = stats.cells_visited,
                "partition done"
            );
        }
        ScatterEvent::RunFinished { stats } => {
            info!(placed = stats.workers.placed, elapsed = ?stats.elapsed, "run done");
        }
        _ => {}
    });
    let output = run.wait_with_events(&mut sink)?;

    let mut render = RenderConfig::new((1024, 1024)).with_partition_lines(true);
    render
        .set_rule_style(
            "trees",
            RuleStyle {
                color: [20, 70, 20],
                radius: 4,
            },
        )
        .set_rule_style(
            "grass",
            RuleStyle {
                color: [200, 230, 120],
                radius: 1,
            },
        );
    render_output_to_png(&output, &height_field, &render, "partitions-progress.png")?;
    Ok(())
}
