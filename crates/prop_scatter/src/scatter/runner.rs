//! High-level entry points: run configuration, statistics and one-shot placement runs.
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use glam::UVec2;

use crate::error::{Error, Result};
use crate::grid::{ExclusionGrids, RuleSet};
use crate::scatter::events::{EventSink, ScatterEvent};
use crate::scatter::partition::PartitionLayout;
use crate::scatter::preexisting::{InstanceRegistry, SeedReport};
use crate::scatter::schedule::PartitionScheduler;
use crate::scatter::worker::{WorkerStats, DEFAULT_SAMPLES_PER_CELL};
use crate::terrain::{Aabb, HeightField};

/// Default multiple of a partition's cell count a worker may visit before giving up.
pub const DEFAULT_VISIT_LIMIT_FACTOR: u32 = 64;

/// Configuration for a placement run.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunConfig {
    /// Candidate attempts per cell visit before the cell is considered full.
    pub samples_per_cell: u32,
    /// Base seed; each partition derives its own generator from it.
    pub seed: u64,
    /// Worker threads. `None` uses the global rayon pool and the machine's parallelism.
    pub processor_count: Option<usize>,
    /// Per-worker visit ceiling as a multiple of the partition's cell count.
    pub visit_limit_factor: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            samples_per_cell: DEFAULT_SAMPLES_PER_CELL,
            seed: 0,
            processor_count: None,
            visit_limit_factor: DEFAULT_VISIT_LIMIT_FACTOR,
        }
    }
}

impl RunConfig {
    /// Creates a new [`RunConfig`] with the given number of attempts per cell.
    pub fn new(samples_per_cell: u32) -> Self {
        Self {
            samples_per_cell,
            ..Default::default()
        }
    }

    /// Sets the base seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Runs on a dedicated pool with `processor_count` threads and partitions for that many.
    pub fn with_processor_count(mut self, processor_count: usize) -> Self {
        self.processor_count = Some(processor_count);
        self
    }

    /// Sets the visit ceiling factor.
    pub fn with_visit_limit_factor(mut self, factor: u32) -> Self {
        self.visit_limit_factor = factor;
        self
    }

    /// Processor count used to size the partitions.
    pub fn effective_processor_count(&self) -> usize {
        self.processor_count.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.samples_per_cell == 0 {
            return Err(Error::InvalidConfig("samples_per_cell must be >= 1".into()));
        }
        if self.processor_count == Some(0) {
            return Err(Error::InvalidConfig("processor_count must be >= 1".into()));
        }
        if self.visit_limit_factor == 0 {
            return Err(Error::InvalidConfig(
                "visit_limit_factor must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

/// Aggregated statistics of a finished run.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub partitions: usize,
    pub partition_counts: UVec2,
    /// Existing instances inserted before generation.
    pub preexisting: SeedReport,
    /// Worker counters summed over all partitions.
    pub workers: WorkerStats,
    /// Generated placements per rule set, in rule set order.
    pub new_placements: Vec<usize>,
    pub elapsed: Duration,
}

/// Output of a finished run.
#[derive(Debug, Clone)]
pub struct PlacementOutput {
    /// One exclusion grid per rule set holding every placement, new and preexisting.
    pub grids: ExclusionGrids,
    /// Bounds of the stitched terrain.
    pub bounds: Aabb,
    /// Partition and grid layout the run used.
    pub partitions: PartitionLayout,
    pub config: RunConfig,
    pub stats: RunStats,
}

/// Plans, seeds, schedules and waits for a placement run.
pub fn run_placement(
    config: &RunConfig,
    height_field: Arc<HeightField>,
    rule_sets: &[RuleSet],
    registry: &InstanceRegistry,
) -> Result<PlacementOutput> {
    run_placement_with_events(config, height_field, rule_sets, registry, &mut ())
}

/// Like [`run_placement`], forwarding events to `sink`.
pub fn run_placement_with_events(
    config: &RunConfig,
    height_field: Arc<HeightField>,
    rule_sets: &[RuleSet],
    registry: &InstanceRegistry,
    sink: &mut dyn EventSink,
) -> Result<PlacementOutput> {
    let mut scheduler = PartitionScheduler::plan(config, height_field, rule_sets)?;
    sink.send(ScatterEvent::RunStarted {
        config: config.clone(),
        partitions: scheduler.partition_count(),
        rule_sets: rule_sets.len(),
    });

    let report = scheduler.seed_preexisting(registry);
    if report.skipped_unknown_rule > 0 {
        sink.send(ScatterEvent::Warning {
            context: "preexisting".into(),
            message: format!(
                "{} existing props reference unknown rule sets",
                report.skipped_unknown_rule
            ),
        });
    }
    if report.skipped_out_of_bounds > 0 {
        sink.send(ScatterEvent::Warning {
            context: "preexisting".into(),
            message: format!(
                "{} existing instances lie outside the terrain",
                report.skipped_out_of_bounds
            ),
        });
    }
    sink.send(ScatterEvent::PreexistingSeeded { report });

    scheduler.schedule()?.wait_with_events(sink)
}
