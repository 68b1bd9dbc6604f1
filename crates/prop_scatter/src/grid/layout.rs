//! Geometry of the per-rule-set exclusion grids.
//!
//! Every rule set gets its own uniform grid laid over the stitched terrain. Cell widths are snapped so
//! that a whole number of cells tiles one partition, which lets each partition own a contiguous
//! square block of cells in every grid.
use std::fmt;

use glam::{UVec2, Vec2};

/// Integer column/row coordinate in one rule set's grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellCoord(
    /// column (world x)
    pub u32,
    /// row (world z)
    pub u32,
);

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.0, self.1)
    }
}

/// Inclusive rectangular range of cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellRange {
    pub min: CellCoord,
    pub max: CellCoord,
}

impl CellRange {
    pub fn new(min: CellCoord, max: CellCoord) -> Self {
        debug_assert!(min.0 <= max.0 && min.1 <= max.1, "inverted cell range");
        Self { min, max }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.max.0 - self.min.0 + 1
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.max.1 - self.min.1 + 1
    }

    /// Number of cells in the range.
    #[inline]
    pub fn len(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Always false; ranges are inclusive.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn contains(&self, c: CellCoord) -> bool {
        c.0 >= self.min.0 && c.0 <= self.max.0 && c.1 >= self.min.1 && c.1 <= self.max.1
    }

    /// Cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = CellCoord> + '_ {
        (self.min.1..=self.max.1)
            .flat_map(move |y| (self.min.0..=self.max.0).map(move |x| CellCoord(x, y)))
    }
}

/// Layout of one rule set's exclusion grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RuleGridLayout {
    /// World-space minimum corner (x, z) of the grid.
    pub origin: Vec2,
    /// Side length of one cell.
    pub cell_width: f32,
    /// Cells along each side of one partition.
    pub cells_per_partition: u32,
    pub columns: u32,
    pub rows: u32,
    /// Offset of this grid's first cell in the flat cell storage.
    pub start: usize,
}

impl RuleGridLayout {
    /// Lays out a grid for a rule set with the given same-model radius.
    ///
    /// The nominal cell width is `2 * same_model_radius`; it is widened so that
    /// `cells_per_partition = max(1, floor(partition_width / nominal))` cells tile a partition.
    pub fn new(
        origin: Vec2,
        partition_width: f32,
        partition_counts: UVec2,
        same_model_radius: f32,
        start: usize,
    ) -> Self {
        debug_assert!(partition_width > 0.0, "partition_width must be > 0");
        let nominal = same_model_radius * 2.0;
        let cells_per_partition = ((partition_width / nominal).floor() as u32).max(1);
        let cell_width = partition_width / cells_per_partition as f32;
        Self {
            origin,
            cell_width,
            cells_per_partition,
            columns: cells_per_partition * partition_counts.x,
            rows: cells_per_partition * partition_counts.y,
            start,
        }
    }

    /// Total number of cells in this grid.
    #[inline]
    pub fn len(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat index of a cell in the combined storage of all grids.
    #[inline]
    pub fn index(&self, c: CellCoord) -> usize {
        self.start + self.local_index(c)
    }

    /// Row-major index of a cell within this grid.
    #[inline]
    pub fn local_index(&self, c: CellCoord) -> usize {
        debug_assert!(c.0 < self.columns && c.1 < self.rows);
        c.0 as usize + c.1 as usize * self.columns as usize
    }

    /// Cell containing a world (x, z) position, or `None` outside the grid.
    pub fn cell_of(&self, world_xz: Vec2) -> Option<CellCoord> {
        let rel = (world_xz - self.origin) / self.cell_width;
        if !rel.is_finite() || rel.x < 0.0 || rel.y < 0.0 {
            return None;
        }
        let (x, y) = (rel.x.floor() as u32, rel.y.floor() as u32);
        (x < self.columns && y < self.rows).then_some(CellCoord(x, y))
    }

    /// World-space minimum corner (x, z) of a cell.
    #[inline]
    pub fn cell_min(&self, c: CellCoord) -> Vec2 {
        self.origin + Vec2::new(c.0 as f32, c.1 as f32) * self.cell_width
    }

    /// Partition that owns a cell.
    #[inline]
    pub fn partition_of(&self, c: CellCoord) -> UVec2 {
        UVec2::new(c.0, c.1) / self.cells_per_partition
    }

    /// The block of cells owned by a partition.
    pub fn partition_range(&self, partition: UVec2) -> CellRange {
        let k = self.cells_per_partition;
        let min = CellCoord(partition.x * k, partition.y * k);
        CellRange::new(min, CellCoord(min.0 + k - 1, min.1 + k - 1))
    }

    /// Number of rings to search around a candidate for the given clearance.
    #[inline]
    pub fn ring_radius(&self, clearance: f32) -> u32 {
        (clearance / self.cell_width).ceil() as u32 + 1
    }

    /// Cells at Chebyshev distance exactly `ring` from `center`, clipped to the grid, row-major.
    pub fn ring_cells(&self, center: CellCoord, ring: u32) -> impl Iterator<Item = CellCoord> {
        let r = ring as i64;
        let (cx, cy) = (center.0 as i64, center.1 as i64);
        let (columns, rows) = (self.columns as i64, self.rows as i64);
        (-r..=r).flat_map(move |dy| {
            // Interior rows only contribute their two end cells.
            let step = if r == 0 || dy.abs() == r { 1 } else { 2 * r };
            (-r..=r).step_by(step as usize).filter_map(move |dx| {
                let (x, y) = (cx + dx, cy + dy);
                (x >= 0 && y >= 0 && x < columns && y < rows)
                    .then(|| CellCoord(x as u32, y as u32))
            })
        })
    }
}
