#![forbid(unsafe_code)]
//! prop_scatter: Parallel prop placement over stitched terrain with per-rule-set clearance grids.
//!
//! Modules:
//! - terrain: terrain tiles, tile connectivity and the stitched height field
//! - grid: rule sets, placements and the per-rule-set exclusion grids
//! - scatter: partitioning, cell visitor, placement workers, checkerboard scheduler, existing
//!   instances, events and runner
//!
//! For an end-to-end run, see [`scatter::runner::run_placement`].
pub mod error;
pub mod grid;
pub mod sampling;
pub mod scatter;
pub mod terrain;

/// Convenient re-exports for common types. Import with `use prop_scatter::prelude::*;`.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::grid::{
        Cell, CellCoord, CellRange, CellSpan, ExclusionGrids, Placement, Radii, RuleGridLayout,
        RuleSet, RuleSetId, TransformRange,
    };
    pub use crate::sampling::seed_for_partition;
    pub use crate::scatter::events::{EventSink, FnSink, ScatterEvent, VecSink};
    pub use crate::scatter::partition::{PartitionId, PartitionLayout};
    pub use crate::scatter::preexisting::{
        ExistingProp, InstanceRegistry, InstanceTransform, PreexistingInstanceLoader, SeedReport,
    };
    pub use crate::scatter::runner::{
        run_placement, run_placement_with_events, PlacementOutput, RunConfig, RunStats,
    };
    pub use crate::scatter::schedule::{
        checkerboard_dependencies, checkerboard_phase, final_join, PartitionScheduler,
        ScheduledRun,
    };
    pub use crate::scatter::visitor::{CellVisitor, VisitedCell};
    pub use crate::scatter::worker::{PlacementWorker, WorkerStats};
    pub use crate::terrain::{connected_tiles, Aabb, HeightField, TerrainTile, TileCoord};
}
