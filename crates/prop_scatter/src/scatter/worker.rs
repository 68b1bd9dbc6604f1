//! Candidate generation and validation for one partition.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::grid::{required_clearance, CellRange, Placement, RuleSet};
use crate::sampling::rand_range;
use crate::scatter::partition::PartitionId;
use crate::scatter::storage::GridView;
use crate::scatter::visitor::{CellVisitor, VisitedCell};
use crate::terrain::HeightField;

/// Default number of candidate attempts per cell visit.
pub const DEFAULT_SAMPLES_PER_CELL: u32 = 30;

/// Read-only inputs shared by every worker of a run.
#[derive(Debug)]
pub struct PlacementContext {
    pub height_field: Arc<HeightField>,
    pub rule_sets: Vec<RuleSet>,
    pub samples_per_cell: u32,
}

/// Counters reported by a [`PlacementWorker`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub cells_visited: u64,
    pub attempts: u64,
    /// Candidates rejected because their footprint left the terrain.
    pub off_terrain: u64,
    /// Candidates rejected by the clearance check.
    pub blocked: u64,
    pub placed: u64,
    pub cells_exhausted: u64,
    pub ceiling_hit: bool,
}

impl WorkerStats {
    /// Adds another worker's counters to this one.
    pub fn merge(&mut self, other: &WorkerStats) {
        self.cells_visited += other.cells_visited;
        self.attempts += other.attempts;
        self.off_terrain += other.off_terrain;
        self.blocked += other.blocked;
        self.placed += other.placed;
        self.cells_exhausted += other.cells_exhausted;
        self.ceiling_hit |= other.ceiling_hit;
    }
}

/// Fills one partition's cells with placements.
#[derive(Debug)]
pub struct PlacementWorker {
    partition: PartitionId,
    context: Arc<PlacementContext>,
    visitor: CellVisitor,
    rng: StdRng,
}

impl PlacementWorker {
    /// Creates a worker for `partition`. `ranges` holds the owned cells per rule set, `None` for
    /// disabled rule sets. The visitor order and every candidate draw come from `seed`.
    pub fn new(
        partition: PartitionId,
        ranges: &[Option<CellRange>],
        context: Arc<PlacementContext>,
        seed: u64,
        visit_limit: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let visitor = CellVisitor::new(ranges, &mut rng).with_visit_limit(visit_limit);
        Self {
            partition,
            context,
            visitor,
            rng,
        }
    }

    #[inline]
    pub fn partition(&self) -> PartitionId {
        self.partition
    }

    /// Runs until every owned cell is full.
    pub fn run(&mut self, view: &mut GridView<'_>) -> WorkerStats {
        self.run_until(view, &AtomicBool::new(false))
    }

    /// Runs until every owned cell is full or `cancelled` is set.
    pub fn run_until(&mut self, view: &mut GridView<'_>, cancelled: &AtomicBool) -> WorkerStats {
        debug_assert_eq!(view.partition(), self.partition);
        let mut stats = WorkerStats::default();
        while !cancelled.load(Ordering::Relaxed) {
            let Some(cell) = self.visitor.next_cell() else {
                break;
            };
            stats.cells_visited += 1;
            if !self.fill_cell(view, cell, &mut stats) {
                self.visitor.mark_full(cell);
                stats.cells_exhausted += 1;
            }
        }
        stats.ceiling_hit = self.visitor.ceiling_hit();
        debug!(
            partition = %self.partition,
            placed = stats.placed,
            visited = stats.cells_visited,
            attempts = stats.attempts,
            "partition worker finished"
        );
        stats
    }

    /// Tries up to `samples_per_cell` candidates in `cell`. Returns true when one was committed.
    fn fill_cell(
        &mut self,
        view: &mut GridView<'_>,
        cell: VisitedCell,
        stats: &mut WorkerStats,
    ) -> bool {
        let ctx = &self.context;
        let rules = &ctx.rule_sets[cell.rule];
        let layout = view.grids()[cell.rule];
        let min = layout.cell_min(cell.coord);
        let max = min + Vec2::splat(layout.cell_width);

        for _ in 0..ctx.samples_per_cell {
            stats.attempts += 1;
            let (rotation, scale) = rules.transform_range.sample(&mut self.rng);
            let xz = Vec2::new(
                rand_range(&mut self.rng, min.x, max.x),
                rand_range(&mut self.rng, min.y, max.y),
            );
            if !ctx.height_field.is_on_terrain(xz, rules.radii.base) {
                stats.off_terrain += 1;
                continue;
            }
            let position = Vec3::new(xz.x, ctx.height_field.sample_height(xz), xz.y);
            if !is_clear(view, &ctx.rule_sets, cell.rule, position) {
                stats.blocked += 1;
                continue;
            }
            let placement = Placement::generated(position, rotation, scale);
            if view.commit(cell.rule, cell.coord, placement) {
                stats.placed += 1;
                return true;
            }
        }
        false
    }
}

/// Whether a candidate of rule set `guest` at `position` keeps its clearance from every visible
/// placement in every grid, disabled rule sets included.
fn is_clear(view: &GridView<'_>, rule_sets: &[RuleSet], guest: usize, position: Vec3) -> bool {
    let xz = Vec2::new(position.x, position.z);
    for (host, layout) in view.grids().iter().enumerate() {
        let clearance =
            required_clearance(&rule_sets[guest].radii, &rule_sets[host].radii, guest == host);
        let limit = clearance * clearance;
        let Some(center) = layout.cell_of(xz) else {
            return false;
        };
        for ring in 0..=layout.ring_radius(clearance) {
            for c in layout.ring_cells(center, ring) {
                let Some(cell) = view.cell(host, c) else {
                    continue;
                };
                if cell
                    .placements()
                    .iter()
                    .any(|p| p.distance_squared(position) < limit)
                {
                    return false;
                }
            }
        }
    }
    true
}
