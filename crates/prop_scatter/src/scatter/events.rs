//! Event types and sinks for observing placement runs.
//!
//! [`ScatterEvent`]s are emitted on the calling thread by
//! [`crate::scatter::schedule::ScheduledRun::wait_with_events`] and
//! [`crate::scatter::runner::run_placement_with_events`] as partition reports arrive.
use crossbeam_channel::Sender;

use crate::scatter::partition::PartitionId;
use crate::scatter::preexisting::SeedReport;
use crate::scatter::runner::{RunConfig, RunStats};
use crate::scatter::worker::WorkerStats;

/// Describes events emitted during a placement run.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum ScatterEvent {
    /// Emitted once the partitions are planned, before preexisting instances are seeded.
    RunStarted {
        config: RunConfig,
        partitions: usize,
        /// Number of rule sets, enabled or not.
        rule_sets: usize,
    },

    /// Emitted after preexisting instances were inserted into the grids.
    PreexistingSeeded { report: SeedReport },

    /// Emitted when a partition worker completed.
    PartitionFinished {
        partition: PartitionId,
        /// Counters reported by the worker.
        stats: WorkerStats,
    },

    /// Something was skipped or cut short; the run still produced output.
    Warning {
        /// Partition or input category the warning is about.
        context: String,
        message: String,
    },

    /// Emitted when every partition finished and the grids were assembled.
    RunFinished { stats: RunStats },
}

/// Receives [`ScatterEvent`]s on the thread that drives the run.
pub trait EventSink {
    fn send(&mut self, event: ScatterEvent);
}

/// Discards everything.
impl EventSink for () {
    fn send(&mut self, _: ScatterEvent) {}
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    #[inline]
    fn send(&mut self, event: ScatterEvent) {
        (**self).send(event);
    }
}

/// Hands events to another thread. Events sent after the receiver is gone are dropped.
impl EventSink for Sender<ScatterEvent> {
    fn send(&mut self, event: ScatterEvent) {
        let _ = Sender::send(self, event);
    }
}

/// Calls a closure for every event.
pub struct FnSink<F>(F);

impl<F: FnMut(ScatterEvent)> FnSink<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F: FnMut(ScatterEvent)> EventSink for FnSink<F> {
    #[inline]
    fn send(&mut self, event: ScatterEvent) {
        (self.0)(event);
    }
}

/// Keeps every event, in arrival order.
#[derive(Debug, Default)]
pub struct VecSink(Vec<ScatterEvent>);

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[ScatterEvent] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<ScatterEvent> {
        self.0
    }

    /// Number of [`ScatterEvent::PartitionFinished`] events received.
    pub fn finished_partitions(&self) -> usize {
        self.0
            .iter()
            .filter(|e| matches!(e, ScatterEvent::PartitionFinished { .. }))
            .count()
    }

    /// `(context, message)` of every [`ScatterEvent::Warning`] received.
    pub fn warnings(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0.iter().filter_map(|e| match e {
            ScatterEvent::Warning { context, message } => {
                Some((context.as_str(), message.as_str()))
            }
            _ => None,
        })
    }
}

impl EventSink for VecSink {
    fn send(&mut self, event: ScatterEvent) {
        self.0.push(event);
    }
}
