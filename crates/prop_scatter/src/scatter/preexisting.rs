//! Instances that already exist in the scene, and seeding them into the grids before generation.
//!
//! Locked instances, and every instance of a disabled rule set, are permanent obstacles: they are
//! inserted into their rule set's grid with `needs_spawning = false` so generation routes around
//! them. Unlocked instances of enabled rule sets are expected to be replaced by the run's output;
//! [`InstanceRegistry::stale_props`] lists them for the caller to remove.
use std::collections::BTreeMap;

use glam::{Quat, Vec2, Vec3};
use tracing::{debug, warn};

use crate::grid::{Placement, RuleSet, RuleSetId};
use crate::scatter::partition::PartitionId;
use crate::scatter::storage::GridStorage;

/// World transform of one existing instance.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstanceTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl InstanceTransform {
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Unrotated, unit-scale instance at `position`.
    pub fn at(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY, Vec3::ONE)
    }
}

impl From<Placement> for InstanceTransform {
    fn from(p: Placement) -> Self {
        Self::new(p.position, p.rotation, p.scale)
    }
}

/// A placed prop: one object, or a batch of instanced transforms rendered together.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExistingProp {
    /// Locked props are never regenerated.
    pub locked: bool,
    pub transforms: Vec<InstanceTransform>,
}

impl ExistingProp {
    /// A single unlocked object.
    pub fn single(transform: InstanceTransform) -> Self {
        Self {
            locked: false,
            transforms: vec![transform],
        }
    }

    /// An unlocked batch of instances.
    pub fn batch(transforms: impl IntoIterator<Item = InstanceTransform>) -> Self {
        Self {
            locked: false,
            transforms: transforms.into_iter().collect(),
        }
    }

    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Whether this prop must be kept as an obstacle for a rule set with the given enabled flag.
    #[inline]
    pub fn is_permanent(&self, rule_set_enabled: bool) -> bool {
        self.locked || !rule_set_enabled
    }
}

/// Registry of the props already placed in the scene, keyed by originating rule set.
#[derive(Clone, Debug, Default)]
pub struct InstanceRegistry {
    props: BTreeMap<RuleSetId, Vec<ExistingProp>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rule_set: impl Into<RuleSetId>, prop: ExistingProp) {
        self.props.entry(rule_set.into()).or_default().push(prop);
    }

    /// Builder-style [`InstanceRegistry::insert`].
    pub fn with_prop(mut self, rule_set: impl Into<RuleSetId>, prop: ExistingProp) -> Self {
        self.insert(rule_set, prop);
        self
    }

    pub fn props_for(&self, rule_set: &str) -> &[ExistingProp] {
        self.props.get(rule_set).map(Vec::as_slice).unwrap_or_default()
    }

    /// All props, grouped by rule set id in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExistingProp)> + '_ {
        self.props
            .iter()
            .flat_map(|(id, props)| props.iter().map(move |p| (id.as_str(), p)))
    }

    /// Number of props (a batch counts once).
    pub fn len(&self) -> usize {
        self.props.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unlocked props of enabled rule sets: the ones a new run replaces.
    pub fn stale_props<'a>(
        &'a self,
        rule_sets: &'a [RuleSet],
    ) -> impl Iterator<Item = (&'a str, &'a ExistingProp)> + 'a {
        self.iter().filter(move |(id, prop)| {
            rule_sets
                .iter()
                .any(|r| r.id == *id && !prop.is_permanent(r.enabled))
        })
    }

    /// Removes the props listed by [`InstanceRegistry::stale_props`]. Returns how many were removed.
    pub fn remove_stale(&mut self, rule_sets: &[RuleSet]) -> usize {
        let mut removed = 0;
        for (id, props) in self.props.iter_mut() {
            let Some(rules) = rule_sets.iter().find(|r| &r.id == id) else {
                continue;
            };
            let before = props.len();
            props.retain(|p| p.is_permanent(rules.enabled));
            removed += before - props.len();
        }
        self.props.retain(|_, props| !props.is_empty());
        removed
    }
}

/// Counts produced by [`PreexistingInstanceLoader::seed`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Placements inserted into the grids.
    pub seeded: usize,
    /// Props whose rule set id is not configured.
    pub skipped_unknown_rule: usize,
    /// Transforms outside the grids.
    pub skipped_out_of_bounds: usize,
    /// Unlocked props of enabled rule sets, left out because the run replaces them.
    pub replaceable: usize,
}

/// Inserts permanent existing instances into the exclusion grids.
pub struct PreexistingInstanceLoader;

impl PreexistingInstanceLoader {
    /// Seeds `storage` from `registry`. Must run before any worker borrows the storage.
    pub fn seed(
        storage: &mut GridStorage,
        registry: &InstanceRegistry,
        rule_sets: &[RuleSet],
    ) -> SeedReport {
        let mut report = SeedReport::default();
        for (id, props) in &registry.props {
            let Some(rule) = rule_sets.iter().position(|r| &r.id == id) else {
                warn!(
                    rule_set = %id,
                    props = props.len(),
                    "existing props reference an unknown rule set"
                );
                report.skipped_unknown_rule += props.len();
                continue;
            };
            let enabled = rule_sets[rule].enabled;
            let grid = storage.layout().grids[rule];

            for prop in props {
                if !prop.is_permanent(enabled) {
                    report.replaceable += 1;
                    continue;
                }
                for t in &prop.transforms {
                    let xz = Vec2::new(t.position.x, t.position.z);
                    let Some(cell) = grid.cell_of(xz) else {
                        warn!(
                            rule_set = %id,
                            position = ?t.position,
                            "existing instance lies outside the terrain grid"
                        );
                        report.skipped_out_of_bounds += 1;
                        continue;
                    };
                    let partition = PartitionId::from(grid.partition_of(cell));
                    let placement = Placement::preexisting(t.position, t.rotation, t.scale);
                    if storage.partition_mut(partition).push(rule, cell, placement) {
                        report.seeded += 1;
                    }
                }
            }
        }
        debug!(
            seeded = report.seeded,
            unknown = report.skipped_unknown_rule,
            out_of_bounds = report.skipped_out_of_bounds,
            "seeded existing instances"
        );
        report
    }
}
