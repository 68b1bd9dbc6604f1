//! Exclusion grid records: rule sets, committed placements, per-rule grid layouts and cell storage.
pub mod cells;
pub mod layout;
pub mod placement;
pub mod rules;

pub use cells::{Cell, CellSpan, ExclusionGrids, PartitionCells};
pub use layout::{CellCoord, CellRange, RuleGridLayout};
pub use placement::Placement;
pub use rules::{required_clearance, Radii, RuleSet, RuleSetId, TransformRange, MIN_RADIUS};
