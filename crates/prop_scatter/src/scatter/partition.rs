//! Partition geometry: how the terrain volume is split into independently scheduled blocks.
//!
//! Helpers here derive the partition width from the requested parallelism and the widest
//! same-model radius, then lay out one [`RuleGridLayout`] per rule set on top of the partitions.
use std::fmt;

use glam::{UVec2, Vec2};

use crate::error::{Error, Result};
use crate::grid::{CellRange, RuleGridLayout, RuleSet};
use crate::terrain::Aabb;

/// Target number of partitions per worker thread.
pub const PARTITIONS_PER_PROCESSOR: usize = 4;

/// Minimum number of partitions along each axis.
pub const MIN_PARTITIONS_PER_AXIS: u32 = 2;

/// Column/row coordinate of a partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionId {
    pub x: u32,
    pub y: u32,
}

impl PartitionId {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn as_uvec2(self) -> UVec2 {
        UVec2::new(self.x, self.y)
    }
}

impl From<UVec2> for PartitionId {
    fn from(v: UVec2) -> Self {
        Self::new(v.x, v.y)
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Partition grid plus the exclusion grid layout of every rule set.
#[derive(Clone, Debug, PartialEq)]
pub struct PartitionLayout {
    /// World-space minimum corner (x, z) shared by the partitions and all grids.
    pub origin: Vec2,
    /// Side length of one (square) partition.
    pub width: f32,
    /// Number of partitions along x and z.
    pub counts: UVec2,
    /// One grid layout per rule set, in rule set order.
    pub grids: Vec<RuleGridLayout>,
}

impl PartitionLayout {
    /// Lays out partitions over `bounds` for `processor_count` workers.
    ///
    /// The partition width is `sqrt(area / (processor_count * 4))`, raised to twice the largest
    /// same-model radius so that clearance checks never reach past the adjacent partitions.
    pub fn compute(bounds: &Aabb, rule_sets: &[RuleSet], processor_count: usize) -> Result<Self> {
        if rule_sets.is_empty() {
            return Err(Error::InvalidConfig("no rule sets configured".into()));
        }
        let size = bounds.size();
        if !(size.x > 0.0 && size.z > 0.0 && size.is_finite()) {
            return Err(Error::InvalidTerrain(format!(
                "terrain bounds must have a positive finite footprint, got {}x{}",
                size.x, size.z
            )));
        }

        let target = (processor_count.max(1) * PARTITIONS_PER_PROCESSOR) as f32;
        let max_same_model = rule_sets
            .iter()
            .map(|r| r.radii.same_model)
            .fold(0.0f32, f32::max);
        let width = (size.x * size.z / target).sqrt().max(max_same_model * 2.0);
        let counts = UVec2::new(
            ((size.x / width).ceil() as u32).max(MIN_PARTITIONS_PER_AXIS),
            ((size.z / width).ceil() as u32).max(MIN_PARTITIONS_PER_AXIS),
        );

        let origin = Vec2::new(bounds.min.x, bounds.min.z);
        let mut start = 0;
        let grids = rule_sets
            .iter()
            .map(|r| {
                let grid = RuleGridLayout::new(origin, width, counts, r.radii.same_model, start);
                start += grid.len();
                grid
            })
            .collect();

        Ok(Self {
            origin,
            width,
            counts,
            grids,
        })
    }

    /// Total number of partitions.
    #[inline]
    pub fn partition_count(&self) -> usize {
        self.counts.x as usize * self.counts.y as usize
    }

    /// Total number of cells across all grids.
    pub fn total_cells(&self) -> usize {
        self.grids.iter().map(RuleGridLayout::len).sum()
    }

    #[inline]
    pub fn contains(&self, id: PartitionId) -> bool {
        id.x < self.counts.x && id.y < self.counts.y
    }

    /// Row-major index of a partition.
    #[inline]
    pub fn index_of(&self, id: PartitionId) -> usize {
        debug_assert!(self.contains(id));
        id.x as usize + id.y as usize * self.counts.x as usize
    }

    /// Partition at a row-major index.
    #[inline]
    pub fn id_at(&self, index: usize) -> PartitionId {
        let cols = self.counts.x as usize;
        PartitionId::new((index % cols) as u32, (index / cols) as u32)
    }

    /// All partitions in row-major order.
    pub fn partition_ids(&self) -> impl Iterator<Item = PartitionId> + '_ {
        (0..self.partition_count()).map(move |i| self.id_at(i))
    }

    /// The up to eight partitions touching `id`, including diagonals.
    pub fn neighbors(&self, id: PartitionId) -> impl Iterator<Item = PartitionId> + '_ {
        (-1i64..=1).flat_map(move |dy| {
            (-1i64..=1).filter_map(move |dx| {
                if dx == 0 && dy == 0 {
                    return None;
                }
                let (x, y) = (id.x as i64 + dx, id.y as i64 + dy);
                let n = PartitionId::new(u32::try_from(x).ok()?, u32::try_from(y).ok()?);
                self.contains(n).then_some(n)
            })
        })
    }

    /// World-space (x, z) minimum and maximum of a partition.
    pub fn partition_bounds(&self, id: PartitionId) -> (Vec2, Vec2) {
        let min = self.origin + id.as_uvec2().as_vec2() * self.width;
        (min, min + Vec2::splat(self.width))
    }

    /// Partition containing a world (x, z) position, or `None` outside the partition grid.
    pub fn partition_of(&self, world_xz: Vec2) -> Option<PartitionId> {
        let rel = (world_xz - self.origin) / self.width;
        if !rel.is_finite() || rel.x < 0.0 || rel.y < 0.0 {
            return None;
        }
        let id = PartitionId::new(rel.x.floor() as u32, rel.y.floor() as u32);
        self.contains(id).then_some(id)
    }

    /// Cell ranges owned by a partition, one per rule set; disabled rule sets get `None`.
    pub fn cell_ranges(&self, id: PartitionId, rule_sets: &[RuleSet]) -> Vec<Option<CellRange>> {
        self.grids
            .iter()
            .zip(rule_sets)
            .map(|(grid, rules)| {
                rules
                    .enabled
                    .then(|| grid.partition_range(id.as_uvec2()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn square(side: f32) -> Aabb {
        Aabb::new(Vec3::ZERO, Vec3::new(side, 10.0, side))
    }

    #[test]
    fn display_formats_coordinates() {
        assert_eq!(PartitionId::new(3, 1).to_string(), "(3, 1)");
    }

    #[test]
    fn four_processors_yield_four_by_four() {
        let rules = [RuleSet::new("a")];
        let layout = PartitionLayout::compute(&square(100.0), &rules, 4).unwrap();
        assert_eq!(layout.counts, UVec2::new(4, 4));
        assert_eq!(layout.width, 25.0);
        assert_eq!(layout.grids[0].cells_per_partition, 12);
    }

    #[test]
    fn single_processor_is_raised_to_two_by_two() {
        let rules = [RuleSet::new("a")];
        let layout = PartitionLayout::compute(&square(100.0), &rules, 1).unwrap();
        assert_eq!(layout.counts, UVec2::new(2, 2));
        assert_eq!(layout.partition_count(), 4);
    }

    #[test]
    fn wide_radius_widens_partitions() {
        let rules = [RuleSet::new("small"), RuleSet::new("huge").with_radii(1.0, 40.0)];
        let layout = PartitionLayout::compute(&square(100.0), &rules, 8).unwrap();
        assert_eq!(layout.width, 80.0);
        assert_eq!(layout.counts, UVec2::new(2, 2));
        assert_eq!(layout.grids[1].cells_per_partition, 1);
        assert_eq!(layout.grids[1].start, layout.grids[0].len());
    }

    #[test]
    fn grids_cover_the_bounds() {
        let rules = [RuleSet::new("a").with_radii(0.7, 1.3)];
        let bounds = Aabb::new(Vec3::new(-5.0, 0.0, 3.0), Vec3::new(57.0, 1.0, 41.0));
        let layout = PartitionLayout::compute(&bounds, &rules, 3).unwrap();
        let g = &layout.grids[0];
        assert!(g.columns as f32 * g.cell_width >= 62.0 - 1e-3);
        assert!(g.rows as f32 * g.cell_width >= 38.0 - 1e-3);
        assert!(g.cell_width >= 2.6 - 1e-5);
    }

    #[test]
    fn empty_rule_sets_are_rejected() {
        let err = PartitionLayout::compute(&square(10.0), &[], 1).unwrap_err();
        matches!(err, Error::InvalidConfig(_))
            .then_some(())
            .expect("expected InvalidConfig");
    }

    #[test]
    fn neighbors_are_clipped() {
        let rules = [RuleSet::new("a")];
        let layout = PartitionLayout::compute(&square(100.0), &rules, 4).unwrap();
        assert_eq!(layout.neighbors(PartitionId::new(0, 0)).count(), 3);
        assert_eq!(layout.neighbors(PartitionId::new(1, 0)).count(), 5);
        assert_eq!(layout.neighbors(PartitionId::new(1, 1)).count(), 8);
    }

    #[test]
    fn index_round_trips() {
        let rules = [RuleSet::new("a")];
        let layout = PartitionLayout::compute(&square(100.0), &rules, 4).unwrap();
        for (i, id) in layout.partition_ids().enumerate() {
            assert_eq!(layout.index_of(id), i);
        }
        assert_eq!(layout.id_at(6), PartitionId::new(2, 1));
        assert_eq!(
            layout.partition_of(Vec2::new(60.0, 30.0)),
            Some(PartitionId::new(2, 1))
        );
    }

    #[test]
    fn disabled_rule_sets_own_no_cells() {
        let rules = [RuleSet::new("a"), RuleSet::new("b").with_enabled(false)];
        let layout = PartitionLayout::compute(&square(100.0), &rules, 1).unwrap();
        let ranges = layout.cell_ranges(PartitionId::new(1, 0), &rules);
        assert!(ranges[0].is_some());
        assert!(ranges[1].is_none());
    }
}
