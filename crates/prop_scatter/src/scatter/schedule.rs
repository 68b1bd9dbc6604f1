//! Planning and checkerboard scheduling of partition workers.
//!
//! Partitions are ordered by the parity of their coordinates so that no two partitions touching
//! each other (diagonals included) ever run at the same time:
//!
//! - `(even, even)` partitions have no dependencies,
//! - `(odd, _)` partitions wait for their left and right neighbours,
//! - `(even, odd)` partitions wait for their four diagonal neighbours.
//!
//! The run is complete once every `(odd, odd)` partition finished, which transitively covers the
//! whole grid. Tasks are spawned on rayon only once all their dependencies reported back, so no
//! pool thread ever blocks on another partition.
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, Sender};
use glam::UVec2;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::grid::{ExclusionGrids, RuleSet};
use crate::sampling::seed_for_partition;
use crate::scatter::events::{EventSink, ScatterEvent};
use crate::scatter::partition::{PartitionId, PartitionLayout};
use crate::scatter::preexisting::{InstanceRegistry, PreexistingInstanceLoader, SeedReport};
use crate::scatter::runner::{PlacementOutput, RunConfig, RunStats};
use crate::scatter::storage::GridStorage;
use crate::scatter::worker::{PlacementContext, PlacementWorker, WorkerStats};
use crate::terrain::HeightField;

/// Parity class `(x mod 2, y mod 2)` of a partition.
#[inline]
pub fn checkerboard_phase(id: PartitionId) -> UVec2 {
    UVec2::new(id.x % 2, id.y % 2)
}

fn offset(id: PartitionId, dx: i64, dy: i64, counts: UVec2) -> Option<PartitionId> {
    let x = u32::try_from(id.x as i64 + dx).ok()?;
    let y = u32::try_from(id.y as i64 + dy).ok()?;
    (x < counts.x && y < counts.y).then_some(PartitionId::new(x, y))
}

/// Partitions that must finish before `id` may start.
pub fn checkerboard_dependencies(id: PartitionId, counts: UVec2) -> Vec<PartitionId> {
    let deltas: &[(i64, i64)] = match (id.x % 2, id.y % 2) {
        (0, 0) => &[],
        (1, _) => &[(-1, 0), (1, 0)],
        _ => &[(-1, -1), (1, -1), (-1, 1), (1, 1)],
    };
    deltas
        .iter()
        .filter_map(|&(dx, dy)| offset(id, dx, dy, counts))
        .collect()
}

/// The `(odd, odd)` partitions whose completion marks the end of the run.
pub fn final_join(counts: UVec2) -> Vec<PartitionId> {
    (1..counts.y)
        .step_by(2)
        .flat_map(|y| (1..counts.x).step_by(2).map(move |x| PartitionId::new(x, y)))
        .collect()
}

/// A planned run: partitions laid out, workers built, grids allocated.
pub struct PartitionScheduler {
    config: RunConfig,
    context: Arc<PlacementContext>,
    storage: GridStorage,
    workers: Vec<PlacementWorker>,
    seed_report: SeedReport,
    seeded: bool,
}

impl PartitionScheduler {
    /// Validates the inputs and lays out partitions, grids and workers.
    pub fn plan(
        config: &RunConfig,
        height_field: Arc<HeightField>,
        rule_sets: &[RuleSet],
    ) -> Result<Self> {
        config.validate()?;
        if rule_sets.is_empty() {
            return Err(Error::InvalidConfig("no rule sets configured".into()));
        }
        for (i, rules) in rule_sets.iter().enumerate() {
            rules.validate()?;
            if rule_sets[..i].iter().any(|r| r.id == rules.id) {
                return Err(Error::InvalidRuleSet {
                    id: rules.id.clone(),
                    reason: "duplicate rule set id".into(),
                });
            }
        }
        if !rule_sets.iter().any(|r| r.enabled) {
            return Err(Error::NoEnabledRuleSets);
        }

        let processors = config.effective_processor_count();
        let layout = PartitionLayout::compute(&height_field.bounds(), rule_sets, processors)?;
        let context = Arc::new(PlacementContext {
            height_field,
            rule_sets: rule_sets.to_vec(),
            samples_per_cell: config.samples_per_cell,
        });

        let workers = layout
            .partition_ids()
            .map(|id| {
                let ranges = layout.cell_ranges(id, rule_sets);
                let cells: usize = ranges.iter().flatten().map(|r| r.len()).sum();
                let visit_limit = (cells as u64)
                    .saturating_mul(config.visit_limit_factor as u64)
                    .max(1);
                PlacementWorker::new(
                    id,
                    &ranges,
                    Arc::clone(&context),
                    seed_for_partition(config.seed, id),
                    visit_limit,
                )
            })
            .collect();

        info!(
            partitions = layout.partition_count(),
            counts = ?layout.counts,
            width = layout.width,
            cells = layout.total_cells(),
            rule_sets = rule_sets.len(),
            processors,
            "planned placement run"
        );

        Ok(Self {
            config: config.clone(),
            context,
            storage: GridStorage::new(layout),
            workers,
            seed_report: SeedReport::default(),
            seeded: false,
        })
    }

    #[inline]
    pub fn layout(&self) -> &PartitionLayout {
        self.storage.layout()
    }

    #[inline]
    pub fn partition_count(&self) -> usize {
        self.workers.len()
    }

    /// Inserts locked and disabled-rule instances into the grids. Call before [`Self::schedule`].
    ///
    /// Only the first call seeds; later calls leave the grids untouched and return the report
    /// of the first.
    pub fn seed_preexisting(&mut self, registry: &InstanceRegistry) -> SeedReport {
        if self.seeded {
            warn!(
                instances = registry.len(),
                "preexisting instances already seeded, ignoring registry"
            );
            return self.seed_report;
        }
        self.seed_report =
            PreexistingInstanceLoader::seed(&mut self.storage, registry, &self.context.rule_sets);
        self.seeded = true;
        self.seed_report
    }

    /// Starts the workers. Partitions without dependencies are spawned right away; every other
    /// partition is spawned by the last of its dependencies to finish.
    pub fn schedule(self) -> Result<ScheduledRun> {
        let pool = match self.config.processor_count {
            Some(threads) => Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("prop-scatter-{i}"))
                    .build()
                    .map_err(|e| Error::Other(format!("failed to build thread pool: {e}")))?,
            ),
            None => None,
        };

        let layout = self.storage.layout();
        let count = layout.partition_count();
        let mut dependents = vec![Vec::new(); count];
        let mut pending = Vec::with_capacity(count);
        for id in layout.partition_ids() {
            let deps = checkerboard_dependencies(id, layout.counts);
            for dep in &deps {
                dependents[layout.index_of(*dep)].push(layout.index_of(id));
            }
            pending.push(AtomicUsize::new(deps.len()));
        }
        let join = final_join(layout.counts)
            .into_iter()
            .map(|id| layout.index_of(id))
            .collect();

        let (sender, receiver) = unbounded();
        let shared = Arc::new(Shared {
            storage: self.storage,
            workers: self.workers.into_iter().map(|w| Mutex::new(Some(w))).collect(),
            dependents,
            pending,
            done: (0..count).map(|_| AtomicBool::new(false)).collect(),
            completed: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            reports: sender,
            pool,
        });

        let roots: Vec<usize> = (0..count)
            .filter(|&i| shared.pending[i].load(Ordering::Acquire) == 0)
            .collect();
        for index in roots {
            Shared::spawn(&shared, index);
        }

        Ok(ScheduledRun {
            shared,
            receiver,
            context: self.context,
            join,
            seed_report: self.seed_report,
            config: self.config,
            started: Instant::now(),
        })
    }
}

/// Outcome of one partition, sent back to the [`ScheduledRun`].
#[derive(Debug)]
pub struct PartitionReport {
    pub partition: PartitionId,
    pub outcome: Result<WorkerStats>,
}

struct Shared {
    storage: GridStorage,
    workers: Vec<Mutex<Option<PlacementWorker>>>,
    dependents: Vec<Vec<usize>>,
    pending: Vec<AtomicUsize>,
    done: Vec<AtomicBool>,
    completed: AtomicUsize,
    cancelled: AtomicBool,
    reports: Sender<PartitionReport>,
    pool: Option<ThreadPool>,
}

impl Shared {
    fn spawn(this: &Arc<Self>, index: usize) {
        let shared = Arc::clone(this);
        let job = move || Shared::run_partition(shared, index);
        match &this.pool {
            Some(pool) => pool.spawn(job),
            None => rayon::spawn(job),
        }
    }

    fn run_partition(this: Arc<Self>, index: usize) {
        let id = this.storage.layout().id_at(index);
        let outcome = if this.cancelled.load(Ordering::Acquire) {
            Err(Error::Cancelled)
        } else {
            this.execute(id, index)
        };
        if outcome.is_err() {
            this.cancelled.store(true, Ordering::Release);
        }

        this.completed.fetch_add(1, Ordering::AcqRel);
        this.done[index].store(true, Ordering::Release);
        for &dependent in &this.dependents[index] {
            if this.pending[dependent].fetch_sub(1, Ordering::AcqRel) == 1 {
                Shared::spawn(&this, dependent);
            }
        }
        // The receiver may already be gone if the run was dropped.
        let _ = this.reports.send(PartitionReport {
            partition: id,
            outcome,
        });
    }

    fn execute(&self, id: PartitionId, index: usize) -> Result<WorkerStats> {
        let mut worker = self.workers[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| Error::Other(format!("partition {id} was started twice")))?;

        let result = panic::catch_unwind(AssertUnwindSafe(|| -> Result<WorkerStats> {
            let mut view = self.storage.view(id)?;
            Ok(worker.run_until(&mut view, &self.cancelled))
        }));
        match result {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(partition = %id, "placement worker panicked");
                Err(Error::WorkerPanicked { partition: id })
            }
        }
    }
}

/// Handle to a running placement. Dropping it cancels the run.
pub struct ScheduledRun {
    shared: Arc<Shared>,
    receiver: Receiver<PartitionReport>,
    context: Arc<PlacementContext>,
    join: Vec<usize>,
    seed_report: SeedReport,
    config: RunConfig,
    started: Instant,
}

impl ScheduledRun {
    #[inline]
    pub fn partition_count(&self) -> usize {
        self.shared.done.len()
    }

    /// Fraction of partitions finished, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        self.shared.completed.load(Ordering::Acquire) as f32 / self.partition_count() as f32
    }

    /// Whether every `(odd, odd)` partition, and so every partition, finished.
    pub fn is_complete(&self) -> bool {
        self.join
            .iter()
            .all(|&i| self.shared.done[i].load(Ordering::Acquire))
    }

    /// Asks running workers to stop at their next cell; partitions not yet started never start.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::Release);
    }

    /// Whether the run was cancelled, by [`Self::cancel`] or by a failing partition.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Blocks until every partition reported and assembles the output.
    pub fn wait(self) -> Result<PlacementOutput> {
        self.wait_with_events(&mut ())
    }

    /// Like [`Self::wait`], forwarding partition and run events to `sink` as they arrive.
    pub fn wait_with_events(self, sink: &mut dyn EventSink) -> Result<PlacementOutput> {
        let total = self.partition_count();
        let mut workers = WorkerStats::default();
        let mut failure: Option<Error> = None;

        for _ in 0..total {
            let Ok(report) = self.receiver.recv() else {
                break;
            };
            match report.outcome {
                Ok(stats) => {
                    debug!(
                        partition = %report.partition,
                        placed = stats.placed,
                        "partition finished"
                    );
                    if stats.ceiling_hit {
                        sink.send(ScatterEvent::Warning {
                            context: report.partition.to_string(),
                            message: "cell visit limit reached before all cells were full".into(),
                        });
                    }
                    workers.merge(&stats);
                    sink.send(ScatterEvent::PartitionFinished {
                        partition: report.partition,
                        stats,
                    });
                }
                Err(Error::Cancelled) => {}
                Err(e) => {
                    warn!(partition = %report.partition, error = %e, "partition failed");
                    failure.get_or_insert(e);
                }
            }
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if self.shared.cancelled.load(Ordering::Acquire) {
            info!("placement run cancelled");
            return Err(Error::Cancelled);
        }

        let layout = self.shared.storage.layout().clone();
        let ids = self.context.rule_sets.iter().map(|r| r.id.clone()).collect();
        let grids = ExclusionGrids::assemble(
            ids,
            layout.grids.clone(),
            layout.counts,
            self.shared.storage.drain(),
        );

        let stats = RunStats {
            partitions: total,
            partition_counts: layout.counts,
            preexisting: self.seed_report,
            workers,
            new_placements: (0..grids.rule_set_count())
                .map(|r| grids.new_placements_for(r).count())
                .collect(),
            elapsed: self.started.elapsed(),
        };
        info!(
            placed = workers.placed,
            seeded = self.seed_report.seeded,
            partitions = total,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "placement run finished"
        );
        sink.send(ScatterEvent::RunFinished {
            stats: stats.clone(),
        });

        Ok(PlacementOutput {
            grids,
            bounds: self.context.height_field.bounds(),
            partitions: layout,
            config: self.config.clone(),
            stats,
        })
    }
}

impl Drop for ScheduledRun {
    fn drop(&mut self) {
        self.cancel();
    }
}
