//! Rule sets: the per-prototype placement constraints consumed by the engine.
use glam::{EulerRot, Quat, Vec2, Vec3};
use rand::Rng;

use crate::error::{Error, Result};
use crate::sampling::rand_vec3;

/// Identifier of a rule set, used to key preexisting instances.
pub type RuleSetId = String;

/// Smallest radius a rule set may use.
pub const MIN_RADIUS: f32 = 0.05;

/// Clearance radii of a rule set.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Radii {
    /// Minimum clearance from instances of other rule sets.
    pub base: f32,
    /// Minimum clearance from instances of the same rule set.
    pub same_model: f32,
}

impl Radii {
    pub fn new(base: f32, same_model: f32) -> Self {
        Self { base, same_model }
    }
}

impl Default for Radii {
    fn default() -> Self {
        Self {
            base: 1.0,
            same_model: 1.0,
        }
    }
}

/// Distance a candidate of `guest` must keep from every committed instance of `host`.
///
/// Instances of the same rule set keep both same-model radii apart; instances of different rule
/// sets keep the sum of their base radii apart.
#[inline]
pub fn required_clearance(guest: &Radii, host: &Radii, same_rule_set: bool) -> f32 {
    if same_rule_set {
        host.same_model * 2.0
    } else {
        guest.base + host.base
    }
}

/// Per-axis ranges for random rotation (Euler degrees) and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransformRange {
    pub rotation_min: Vec3,
    pub rotation_max: Vec3,
    pub scale_min: Vec3,
    pub scale_max: Vec3,
}

impl Default for TransformRange {
    fn default() -> Self {
        Self {
            rotation_min: Vec3::ZERO,
            rotation_max: Vec3::new(0.0, 360.0, 0.0),
            scale_min: Vec3::ONE,
            scale_max: Vec3::ONE,
        }
    }
}

impl TransformRange {
    /// Draws a rotation and a scale with independent uniform draws per axis.
    ///
    /// Rotation angles are degrees applied around Z, then X, then Y.
    pub fn sample(&self, rng: &mut dyn Rng) -> (Quat, Vec3) {
        let euler = rand_vec3(rng, self.rotation_min, self.rotation_max);
        let rotation = Quat::from_euler(
            EulerRot::YXZ,
            euler.y.to_radians(),
            euler.x.to_radians(),
            euler.z.to_radians(),
        );
        let scale = rand_vec3(rng, self.scale_min, self.scale_max);
        (rotation, scale)
    }
}

/// One configured prototype and its placement constraints.
#[non_exhaustive]
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleSet {
    /// Unique identifier.
    pub id: RuleSetId,
    /// Disabled rule sets generate nothing; their existing instances become obstacles.
    pub enabled: bool,
    /// Clearance radii.
    pub radii: Radii,
    /// Rotation and scale sampling ranges.
    pub transform_range: TransformRange,
    /// Side lengths of the render zones; carried for consumers, unused by placement.
    pub zone_size: Vec2,
}

impl RuleSet {
    /// Create a rule set with default radii (1, 1), a full turn of yaw and unit scale.
    pub fn new(id: impl Into<RuleSetId>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            radii: Radii::default(),
            transform_range: TransformRange::default(),
            zone_size: Vec2::new(250.0, 250.0),
        }
    }

    /// Set the base and same-model radii.
    pub fn with_radii(mut self, base: f32, same_model: f32) -> Self {
        self.radii = Radii::new(base, same_model);
        self
    }

    /// Set the per-axis rotation range in degrees.
    pub fn with_rotation_range(mut self, min: Vec3, max: Vec3) -> Self {
        self.transform_range.rotation_min = min;
        self.transform_range.rotation_max = max;
        self
    }

    /// Set the per-axis scale range.
    pub fn with_scale_range(mut self, min: Vec3, max: Vec3) -> Self {
        self.transform_range.scale_min = min;
        self.transform_range.scale_max = max;
        self
    }

    /// Enable or disable generation for this rule set.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the render zone size.
    pub fn with_zone_size(mut self, zone_size: Vec2) -> Self {
        self.zone_size = zone_size;
        self
    }

    /// Returns a copy with the editor clamps applied.
    ///
    /// The base radius is floored at [`MIN_RADIUS`], the same-model radius is raised to the base
    /// radius, range maxima are raised to their minima and the zone size is floored at 1×1.
    pub fn sanitized(&self) -> Self {
        let mut out = self.clone();
        out.radii.base = out.radii.base.max(MIN_RADIUS);
        out.radii.same_model = out.radii.same_model.max(out.radii.base);
        let r = &mut out.transform_range;
        r.rotation_max = r.rotation_max.max(r.rotation_min);
        r.scale_max = r.scale_max.max(r.scale_min);
        out.zone_size = out.zone_size.max(Vec2::ONE);
        out
    }

    /// Validates that every numeric field is finite and the radius invariants hold.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidRuleSet {
            id: self.id.clone(),
            reason: reason.into(),
        };
        if !self.radii.base.is_finite() || !self.radii.same_model.is_finite() {
            return Err(invalid("radii must be finite"));
        }
        if self.radii.base < MIN_RADIUS {
            return Err(invalid("base radius is below the minimum radius"));
        }
        if self.radii.same_model < self.radii.base {
            return Err(invalid("same-model radius must be >= base radius"));
        }
        let r = &self.transform_range;
        if !(r.rotation_min.is_finite()
            && r.rotation_max.is_finite()
            && r.scale_min.is_finite()
            && r.scale_max.is_finite())
        {
            return Err(invalid("rotation and scale ranges must be finite"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn builder_sets_fields() {
        let rules = RuleSet::new("rock")
            .with_radii(0.5, 2.0)
            .with_scale_range(Vec3::splat(0.5), Vec3::splat(1.5))
            .with_enabled(false)
            .with_zone_size(Vec2::new(64.0, 32.0));
        assert_eq!(rules.id, "rock");
        assert!(!rules.enabled);
        assert_eq!(rules.radii, Radii::new(0.5, 2.0));
        assert_eq!(rules.transform_range.scale_max, Vec3::splat(1.5));
        assert_eq!(rules.zone_size, Vec2::new(64.0, 32.0));
    }

    #[test]
    fn sanitized_applies_clamps() {
        let rules = RuleSet::new("x")
            .with_radii(0.0, 0.01)
            .with_rotation_range(Vec3::new(0.0, 90.0, 0.0), Vec3::new(0.0, 10.0, 0.0))
            .with_zone_size(Vec2::ZERO)
            .sanitized();
        assert_eq!(rules.radii.base, MIN_RADIUS);
        assert_eq!(rules.radii.same_model, MIN_RADIUS);
        assert_eq!(rules.transform_range.rotation_max.y, 90.0);
        assert_eq!(rules.zone_size, Vec2::ONE);
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_radii() {
        let rules = RuleSet::new("bush").with_radii(2.0, 1.0);
        let err = rules.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidRuleSet { ref id, .. } if id == "bush"));
    }

    #[test]
    fn validate_rejects_nan() {
        let rules = RuleSet::new("nan").with_radii(f32::NAN, 1.0);
        assert!(rules.validate().is_err());
    }

    #[test]
    fn clearance_uses_same_model_for_same_rule_set() {
        let a = Radii::new(1.0, 3.0);
        let b = Radii::new(2.0, 2.0);
        assert_eq!(required_clearance(&a, &a, true), 6.0);
        assert_eq!(required_clearance(&a, &b, false), 3.0);
        assert_eq!(required_clearance(&b, &a, false), 3.0);
    }

    #[test]
    fn fixed_ranges_sample_exact_values() {
        let range = TransformRange {
            rotation_min: Vec3::new(0.0, 90.0, 0.0),
            rotation_max: Vec3::new(0.0, 90.0, 0.0),
            scale_min: Vec3::new(1.0, 2.0, 3.0),
            scale_max: Vec3::new(1.0, 2.0, 3.0),
        };
        let mut rng = StdRng::seed_from_u64(3);
        let (rotation, scale) = range.sample(&mut rng);
        assert_eq!(scale, Vec3::new(1.0, 2.0, 3.0));
        let expected = Quat::from_rotation_y(90f32.to_radians());
        assert!(rotation.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn sampled_scale_stays_in_range() {
        let range = TransformRange {
            scale_min: Vec3::splat(0.5),
            scale_max: Vec3::splat(2.0),
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..64 {
            let (_, scale) = range.sample(&mut rng);
            assert!(scale.cmpge(Vec3::splat(0.5)).all());
            assert!(scale.cmplt(Vec3::splat(2.0)).all());
        }
    }
}
