//! Cell storage for the exclusion grids.
//!
//! While a run is in flight, cells are stored per partition in [`PartitionCells`] so that each
//! partition can be locked independently. Once every partition finished, the blocks are stitched
//! into one flat [`ExclusionGrids`] buffer indexed by [`RuleGridLayout::index`].
use glam::UVec2;

use crate::grid::layout::{CellCoord, RuleGridLayout};
use crate::grid::placement::Placement;
use crate::grid::rules::RuleSetId;

/// One exclusion grid cell: an append-only list of committed placements.
#[derive(Clone, Debug, Default)]
pub struct Cell {
    placements: Vec<Placement>,
}

impl Cell {
    #[inline]
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    #[inline]
    pub(crate) fn push(&mut self, placement: Placement) {
        self.placements.push(placement);
    }
}

/// Contiguous run of cells belonging to one rule set in [`ExclusionGrids::cells`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellSpan {
    pub start: usize,
    pub len: usize,
}

#[derive(Clone, Copy, Debug)]
struct RuleBlock {
    offset: usize,
    min: CellCoord,
    side: u32,
}

/// The cells one partition owns in every rule set's grid.
#[derive(Debug, Default)]
pub struct PartitionCells {
    blocks: Vec<RuleBlock>,
    cells: Vec<Cell>,
}

impl PartitionCells {
    /// Allocates empty cells for `partition` in each of the given grids.
    pub fn new(partition: UVec2, layouts: &[RuleGridLayout]) -> Self {
        let mut blocks = Vec::with_capacity(layouts.len());
        let mut offset = 0;
        for layout in layouts {
            let range = layout.partition_range(partition);
            blocks.push(RuleBlock {
                offset,
                min: range.min,
                side: layout.cells_per_partition,
            });
            offset += range.len();
        }
        Self {
            blocks,
            cells: vec![Cell::default(); offset],
        }
    }

    fn slot(&self, rule: usize, c: CellCoord) -> Option<usize> {
        let block = self.blocks.get(rule)?;
        let dx = c.0.checked_sub(block.min.0)?;
        let dy = c.1.checked_sub(block.min.1)?;
        if dx >= block.side || dy >= block.side {
            return None;
        }
        Some(block.offset + dx as usize + dy as usize * block.side as usize)
    }

    /// The cell at `c` in rule set `rule`'s grid, if this partition owns it.
    pub fn cell(&self, rule: usize, c: CellCoord) -> Option<&Cell> {
        self.slot(rule, c).map(|i| &self.cells[i])
    }

    /// Appends a placement to an owned cell. Returns false if the cell is not owned.
    pub fn push(&mut self, rule: usize, c: CellCoord, placement: Placement) -> bool {
        match self.slot(rule, c) {
            Some(i) => {
                self.cells[i].push(placement);
                true
            }
            None => false,
        }
    }

    /// Total placements stored in this partition across all grids.
    pub fn placement_count(&self) -> usize {
        self.cells.iter().map(Cell::len).sum()
    }

    pub(crate) fn take(&mut self, rule: usize, c: CellCoord) -> Cell {
        self.slot(rule, c)
            .map(|i| std::mem::take(&mut self.cells[i]))
            .unwrap_or_default()
    }
}

/// The final exclusion grids of a run, one per rule set, in one flat buffer.
#[derive(Clone, Debug)]
pub struct ExclusionGrids {
    ids: Vec<RuleSetId>,
    layouts: Vec<RuleGridLayout>,
    cells: Vec<Cell>,
}

impl ExclusionGrids {
    /// Stitches per-partition blocks into the flat layout.
    ///
    /// `partitions` is indexed by `x + y * partition_counts.x`.
    pub(crate) fn assemble(
        ids: Vec<RuleSetId>,
        layouts: Vec<RuleGridLayout>,
        partition_counts: UVec2,
        mut partitions: Vec<PartitionCells>,
    ) -> Self {
        let total = layouts.iter().map(RuleGridLayout::len).sum();
        let mut cells = Vec::with_capacity(total);
        for (rule, layout) in layouts.iter().enumerate() {
            debug_assert_eq!(cells.len(), layout.start);
            for y in 0..layout.rows {
                for x in 0..layout.columns {
                    let c = CellCoord(x, y);
                    let p = layout.partition_of(c);
                    let flat = p.x as usize + p.y as usize * partition_counts.x as usize;
                    let cell = partitions
                        .get_mut(flat)
                        .map(|block| block.take(rule, c))
                        .unwrap_or_default();
                    cells.push(cell);
                }
            }
        }
        Self {
            ids,
            layouts,
            cells,
        }
    }

    /// Number of rule sets (and grids).
    #[inline]
    pub fn rule_set_count(&self) -> usize {
        self.layouts.len()
    }

    /// Index of the grid belonging to a rule set id.
    pub fn rule_index(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|i| i == id)
    }

    pub fn rule_id(&self, rule: usize) -> &str {
        &self.ids[rule]
    }

    #[inline]
    pub fn layouts(&self) -> &[RuleGridLayout] {
        &self.layouts
    }

    pub fn span(&self, rule: usize) -> CellSpan {
        let layout = &self.layouts[rule];
        CellSpan {
            start: layout.start,
            len: layout.len(),
        }
    }

    /// All cells of all grids, back to back.
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// The cells of one rule set's grid, row-major.
    pub fn cells_for(&self, rule: usize) -> &[Cell] {
        let span = self.span(rule);
        &self.cells[span.start..span.start + span.len]
    }

    pub fn cell(&self, rule: usize, c: CellCoord) -> &Cell {
        &self.cells[self.layouts[rule].index(c)]
    }

    /// Every placement of a rule set, new and preexisting.
    pub fn placements_for(&self, rule: usize) -> impl Iterator<Item = &Placement> + '_ {
        self.cells_for(rule).iter().flat_map(|c| c.placements().iter())
    }

    /// Placements generated by this run for a rule set.
    pub fn new_placements_for(&self, rule: usize) -> impl Iterator<Item = &Placement> + '_ {
        self.placements_for(rule).filter(|p| p.needs_spawning)
    }

    pub fn placement_count(&self, rule: usize) -> usize {
        self.cells_for(rule).iter().map(Cell::len).sum()
    }

    pub fn total_placements(&self) -> usize {
        self.cells.iter().map(Cell::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec2, Vec3};

    use super::*;

    fn layouts() -> Vec<RuleGridLayout> {
        let counts = UVec2::new(2, 2);
        let a = RuleGridLayout::new(Vec2::ZERO, 4.0, counts, 1.0, 0);
        let b = RuleGridLayout::new(Vec2::ZERO, 4.0, counts, 2.0, a.len());
        vec![a, b]
    }

    fn at(x: f32, z: f32) -> Placement {
        Placement::generated(Vec3::new(x, 0.0, z), Quat::IDENTITY, Vec3::ONE)
    }

    #[test]
    fn partition_cells_own_their_block_only() {
        let layouts = layouts();
        let mut block = PartitionCells::new(UVec2::new(1, 0), &layouts);
        assert!(block.push(0, CellCoord(2, 1), at(5.0, 3.0)));
        assert!(!block.push(0, CellCoord(1, 1), at(3.0, 3.0)));
        assert!(!block.push(1, CellCoord(0, 0), at(1.0, 1.0)));
        assert!(block.push(1, CellCoord(1, 0), at(5.0, 1.0)));
        assert_eq!(block.placement_count(), 2);
        assert_eq!(block.cell(0, CellCoord(2, 1)).map(Cell::len), Some(1));
        assert!(block.cell(0, CellCoord(0, 0)).is_none());
    }

    #[test]
    fn assemble_places_cells_at_flat_indices() {
        let layouts = layouts();
        let counts = UVec2::new(2, 2);
        let mut blocks: Vec<_> = (0..4)
            .map(|i| PartitionCells::new(UVec2::new(i % 2, i / 2), &layouts))
            .collect();
        blocks[3].push(0, CellCoord(3, 3), at(7.0, 7.0));
        blocks[1].push(1, CellCoord(1, 0), at(5.0, 1.0));
        blocks[1].push(1, CellCoord(1, 0), {
            let mut p = at(6.0, 1.0);
            p.needs_spawning = false;
            p
        });

        let grids = ExclusionGrids::assemble(vec!["a".into(), "b".into()], layouts, counts, blocks);
        assert_eq!(grids.rule_set_count(), 2);
        assert_eq!(grids.span(0), CellSpan { start: 0, len: 16 });
        assert_eq!(grids.span(1), CellSpan { start: 16, len: 4 });
        assert_eq!(grids.cells().len(), 20);
        assert_eq!(grids.cell(0, CellCoord(3, 3)).len(), 1);
        assert_eq!(grids.cells()[15].len(), 1);
        assert_eq!(grids.cells()[17].len(), 2);
        assert_eq!(grids.placement_count(1), 2);
        assert_eq!(grids.new_placements_for(1).count(), 1);
        assert_eq!(grids.total_placements(), 3);
        assert_eq!(grids.rule_index("b"), Some(1));
        assert_eq!(grids.rule_id(0), "a");
    }
}
