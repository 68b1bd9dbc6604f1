//! Parallel placement pipeline: partitioning, per-partition workers, checkerboard scheduling,
//! seeding of existing instances, events and one-shot runs.
pub mod events;
pub mod partition;
pub mod preexisting;
pub mod runner;
pub mod schedule;
pub mod storage;
pub mod visitor;
pub mod worker;
