//! Fair randomized traversal over the cells a partition owns.
//!
//! Each enabled rule set gets a Fisher–Yates shuffled order of its cells. [`CellVisitor::next_cell`]
//! rotates across rule sets on every call so that dense rule sets cannot starve sparse ones, and
//! within a rule set cycles through its order skipping cells already marked full.
use rand::Rng;
use tracing::error;

use crate::grid::{CellCoord, CellRange};
use crate::sampling::rand_index;

/// A cell handed out by [`CellVisitor::next_cell`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisitedCell {
    /// Rule set index.
    pub rule: usize,
    /// Cell coordinate in that rule set's grid.
    pub coord: CellCoord,
    /// Position of the cell in the rule set's shuffled order.
    pub slot: usize,
}

#[derive(Debug, Default)]
struct RuleOrder {
    cells: Vec<CellCoord>,
    full: Vec<bool>,
    cursor: usize,
    remaining: usize,
}

impl RuleOrder {
    fn shuffled(range: &CellRange, rng: &mut dyn Rng) -> Self {
        let mut cells: Vec<CellCoord> = range.iter().collect();
        for i in (1..cells.len()).rev() {
            let j = rand_index(rng, i + 1);
            cells.swap(i, j);
        }
        let n = cells.len();
        Self {
            cells,
            full: vec![false; n],
            cursor: 0,
            remaining: n,
        }
    }

    fn advance(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        loop {
            let slot = self.cursor;
            self.cursor = (self.cursor + 1) % self.cells.len();
            if !self.full[slot] {
                return Some(slot);
            }
        }
    }
}

/// Round-robin, shuffled traversal over one partition's cells in every rule set's grid.
#[derive(Debug)]
pub struct CellVisitor {
    rules: Vec<RuleOrder>,
    next_rule: usize,
    active_rules: usize,
    visits: u64,
    visit_limit: u64,
    ceiling_hit: bool,
}

impl CellVisitor {
    /// Builds the shuffled orders. `ranges` has one entry per rule set; `None` marks a disabled
    /// rule set, which contributes no cells.
    pub fn new(ranges: &[Option<CellRange>], rng: &mut dyn Rng) -> Self {
        let rules: Vec<RuleOrder> = ranges
            .iter()
            .map(|r| match r {
                Some(range) => RuleOrder::shuffled(range, rng),
                None => RuleOrder::default(),
            })
            .collect();
        let active_rules = rules.iter().filter(|r| r.remaining > 0).count();
        Self {
            rules,
            next_rule: 0,
            active_rules,
            visits: 0,
            visit_limit: u64::MAX,
            ceiling_hit: false,
        }
    }

    /// Caps the total number of cells handed out.
    ///
    /// Reaching the cap means cells are not being exhausted as they should; the visitor logs an
    /// error and stops.
    pub fn with_visit_limit(mut self, limit: u64) -> Self {
        self.visit_limit = limit;
        self
    }

    /// Next cell to try, rotating to the next rule set with cells left.
    ///
    /// Returns `None` once every cell of every enabled rule set is full, or when the visit limit
    /// is reached.
    pub fn next_cell(&mut self) -> Option<VisitedCell> {
        if self.active_rules == 0 {
            return None;
        }
        if self.visits >= self.visit_limit {
            if !self.ceiling_hit {
                error!(
                    visits = self.visits,
                    remaining = self.remaining_cells(),
                    "cell visit limit reached before all cells were exhausted"
                );
                self.ceiling_hit = true;
            }
            return None;
        }

        let n = self.rules.len();
        for step in 0..n {
            let rule = (self.next_rule + step) % n;
            if let Some(slot) = self.rules[rule].advance() {
                self.next_rule = (rule + 1) % n;
                self.visits += 1;
                return Some(VisitedCell {
                    rule,
                    coord: self.rules[rule].cells[slot],
                    slot,
                });
            }
        }
        None
    }

    /// Flags a visited cell as full; it is skipped from now on.
    pub fn mark_full(&mut self, cell: VisitedCell) {
        let Some(order) = self.rules.get_mut(cell.rule) else {
            return;
        };
        if cell.slot >= order.full.len() || order.full[cell.slot] {
            return;
        }
        order.full[cell.slot] = true;
        order.remaining -= 1;
        if order.remaining == 0 {
            self.active_rules -= 1;
        }
    }

    /// Cells not yet marked full, across all rule sets.
    pub fn remaining_cells(&self) -> usize {
        self.rules.iter().map(|r| r.remaining).sum()
    }

    /// Cells handed to this visitor, across all rule sets.
    pub fn total_cells(&self) -> usize {
        self.rules.iter().map(|r| r.cells.len()).sum()
    }

    /// Number of cells handed out so far.
    #[inline]
    pub fn visits(&self) -> u64 {
        self.visits
    }

    /// Whether traversal stopped on the visit limit.
    #[inline]
    pub fn ceiling_hit(&self) -> bool {
        self.ceiling_hit
    }
}
