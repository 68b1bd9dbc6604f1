//! Random draws shared by the cell visitor and the placement workers.
//!
//! All helpers take `&mut dyn Rng` so callers can plug in any generator; the engine itself
//! uses one seeded [`rand::rngs::StdRng`] per partition.
use glam::Vec3;
use rand::Rng;

use crate::scatter::partition::PartitionId;

/// Generate a random float in the range [0, 1).
#[inline]
pub(crate) fn rand01(rng: &mut dyn Rng) -> f32 {
    (rng.next_u32() as f32) / ((u32::MAX as f32) + 1.0)
}

/// Uniform float in `[lo, hi)`. Returns `lo` when the range is empty.
#[inline]
pub(crate) fn rand_range(rng: &mut dyn Rng, lo: f32, hi: f32) -> f32 {
    if hi <= lo {
        return lo;
    }
    let v = lo + rand01(rng) * (hi - lo);
    // Rounding in the multiply can land exactly on `hi`.
    if v >= hi {
        lo
    } else {
        v
    }
}

/// Independent uniform draw per axis.
#[inline]
pub(crate) fn rand_vec3(rng: &mut dyn Rng, min: Vec3, max: Vec3) -> Vec3 {
    Vec3::new(
        rand_range(rng, min.x, max.x),
        rand_range(rng, min.y, max.y),
        rand_range(rng, min.z, max.z),
    )
}

/// Uniform index in `[0, len)` using the widening-multiply reduction.
#[inline]
pub(crate) fn rand_index(rng: &mut dyn Rng, len: usize) -> usize {
    debug_assert!(len > 0, "len must be > 0");
    ((rng.next_u64() as u128 * len as u128) >> 64) as usize
}

/// Creates a deterministic seed for a partition from a base seed.
pub fn seed_for_partition(base_seed: u64, partition: PartitionId) -> u64 {
    let px = partition.x as u64;
    let py = partition.y as u64;
    let mixed =
        base_seed ^ px.wrapping_mul(0x9E3779B97F4A7C15) ^ py.wrapping_mul(0xBF58476D1CE4E5B9);
    mix_u64(mixed)
}

#[inline]
fn mix_u64(mut x: u64) -> u64 {
    x ^= x >> 30;
    x = x.wrapping_mul(0xBF58476D1CE4E5B9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94D049BB133111EB);
    x ^ (x >> 31)
}
