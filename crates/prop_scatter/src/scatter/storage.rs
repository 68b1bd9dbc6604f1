//! Per-partition cell storage and the scoped view a worker gets while it runs.
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

use crate::error::{Error, Result};
use crate::grid::{Cell, CellCoord, PartitionCells, Placement, RuleGridLayout};
use crate::scatter::partition::{PartitionId, PartitionLayout};

/// Exclusion grid cells of a run, split into independently locked partition blocks.
#[derive(Debug)]
pub struct GridStorage {
    layout: PartitionLayout,
    partitions: Vec<RwLock<PartitionCells>>,
}

impl GridStorage {
    pub fn new(layout: PartitionLayout) -> Self {
        let partitions = layout
            .partition_ids()
            .map(|id| RwLock::new(PartitionCells::new(id.as_uvec2(), &layout.grids)))
            .collect();
        Self { layout, partitions }
    }

    #[inline]
    pub fn layout(&self) -> &PartitionLayout {
        &self.layout
    }

    /// Exclusive access to one partition's cells while no worker is running.
    pub fn partition_mut(&mut self, id: PartitionId) -> &mut PartitionCells {
        let index = self.layout.index_of(id);
        self.partitions[index]
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Borrows `id` for writing and its eight neighbours for reading.
    ///
    /// Fails with [`Error::ScheduleConflict`] if any of those partitions is currently borrowed in
    /// a conflicting way, which means two adjacent partitions were scheduled concurrently.
    pub fn view(&self, id: PartitionId) -> Result<GridView<'_>> {
        let conflict = |partition| Error::ScheduleConflict { partition };

        let own = match self.partitions[self.layout.index_of(id)].try_write() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(p)) => p.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(conflict(id)),
        };

        let mut around: [Option<RwLockReadGuard<'_, PartitionCells>>; 8] = Default::default();
        for n in self.layout.neighbors(id) {
            let guard = match self.partitions[self.layout.index_of(n)].try_read() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(p)) => p.into_inner(),
                Err(TryLockError::WouldBlock) => return Err(conflict(n)),
            };
            let slot = neighbour_slot(id, n).ok_or_else(|| conflict(n))?;
            around[slot] = Some(guard);
        }

        Ok(GridView {
            id,
            grids: &self.layout.grids,
            own,
            around,
        })
    }

    /// Takes every partition's cells out of the storage, in row-major partition order.
    pub fn into_partitions(self) -> Vec<PartitionCells> {
        self.partitions
            .into_iter()
            .map(|lock| lock.into_inner().unwrap_or_else(PoisonError::into_inner))
            .collect()
    }

    /// Takes every partition's cells out through the locks, leaving empty blocks behind.
    pub fn drain(&self) -> Vec<PartitionCells> {
        self.partitions
            .iter()
            .map(|lock| {
                let mut guard = lock.write().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *guard)
            })
            .collect()
    }
}

/// Index into the 8-neighbourhood array, row-major with the centre removed.
fn neighbour_slot(id: PartitionId, n: PartitionId) -> Option<usize> {
    let dx = n.x as i64 - id.x as i64;
    let dy = n.y as i64 - id.y as i64;
    if dx.abs() > 1 || dy.abs() > 1 || (dx == 0 && dy == 0) {
        return None;
    }
    let i = ((dy + 1) * 3 + (dx + 1)) as usize;
    Some(if i < 4 { i } else { i - 1 })
}

/// A worker's window into the grids: its own partition writable, its neighbours read-only.
///
/// Cells of partitions further away are not visible; they are always farther from any cell of
/// the owned partition than the widest clearance.
pub struct GridView<'a> {
    id: PartitionId,
    grids: &'a [RuleGridLayout],
    own: RwLockWriteGuard<'a, PartitionCells>,
    around: [Option<RwLockReadGuard<'a, PartitionCells>>; 8],
}

impl GridView<'_> {
    #[inline]
    pub fn partition(&self) -> PartitionId {
        self.id
    }

    #[inline]
    pub fn grids(&self) -> &[RuleGridLayout] {
        self.grids
    }

    /// The cell at `c` in rule set `rule`'s grid, if it lies in a visible partition.
    pub fn cell(&self, rule: usize, c: CellCoord) -> Option<&Cell> {
        let owner = PartitionId::from(self.grids[rule].partition_of(c));
        if owner == self.id {
            return self.own.cell(rule, c);
        }
        let slot = neighbour_slot(self.id, owner)?;
        self.around[slot].as_ref()?.cell(rule, c)
    }

    /// Appends a placement to a cell of the owned partition. Returns false for foreign cells.
    pub fn commit(&mut self, rule: usize, c: CellCoord, placement: Placement) -> bool {
        self.own.push(rule, c, placement)
    }
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use super::*;
    use crate::grid::RuleSet;
    use crate::terrain::Aabb;

    fn storage() -> GridStorage {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::new(90.0, 1.0, 90.0));
        let rules = [RuleSet::new("a")];
        GridStorage::new(PartitionLayout::compute(&bounds, &rules, 2).unwrap())
    }

    #[test]
    fn neighbour_slots_are_unique() {
        let id = PartitionId::new(5, 5);
        let mut slots: Vec<_> = (4..=6)
            .flat_map(|y| (4..=6).map(move |x| PartitionId::new(x, y)))
            .filter_map(|n| neighbour_slot(id, n))
            .collect();
        slots.sort_unstable();
        assert_eq!(slots, (0..8).collect::<Vec<_>>());
        assert_eq!(neighbour_slot(id, PartitionId::new(7, 5)), None);
    }

    #[test]
    fn view_sees_neighbours_but_writes_only_own() {
        let storage = storage();
        assert_eq!(storage.layout().counts.x, 3);
        let k = storage.layout().grids[0].cells_per_partition;

        let mut view = storage.view(PartitionId::new(1, 1)).unwrap();
        let own = CellCoord(k, k);
        let left = CellCoord(k - 1, k);
        let p = Placement::generated(Vec3::ONE, Quat::IDENTITY, Vec3::ONE);
        assert!(view.commit(0, own, p));
        assert!(!view.commit(0, left, p));
        assert_eq!(view.cell(0, own).map(Cell::len), Some(1));
        assert_eq!(view.cell(0, left).map(Cell::len), Some(0));
    }

    #[test]
    fn adjacent_views_conflict() {
        let storage = storage();
        let _a = storage.view(PartitionId::new(0, 0)).unwrap();
        let err = storage.view(PartitionId::new(1, 1)).err().unwrap();
        matches!(err, Error::ScheduleConflict { .. })
            .then_some(())
            .expect("expected ScheduleConflict");
    }

    #[test]
    fn distant_views_do_not_conflict() {
        let storage = storage();
        let _a = storage.view(PartitionId::new(0, 0)).unwrap();
        let view = storage.view(PartitionId::new(2, 2)).unwrap();
        assert!(view.cell(0, CellCoord(0, 0)).is_none());
    }

    #[test]
    fn drain_returns_committed_cells() {
        let storage = storage();
        {
            let mut view = storage.view(PartitionId::new(2, 0)).unwrap();
            let k = view.grids()[0].cells_per_partition;
            let p = Placement::generated(Vec3::ONE, Quat::IDENTITY, Vec3::ONE);
            assert!(view.commit(0, CellCoord(2 * k, 0), p));
        }
        let blocks = storage.drain();
        assert_eq!(blocks.len(), 9);
        assert_eq!(blocks[2].placement_count(), 1);
    }
}
