//! Halton low-discrepancy sequence and the random box orientations built on it.

use std::f32::consts::PI;

use glam::Vec3;

use crate::math::Matrix4;

/// The primes below 1000; `halton` picks its radix from this table.
pub const PRIMES: [u32; 168] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89,
    97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191,
    193, 197, 199, 211, 223, 227, 229, 233, 239, 241, 251, 257, 263, 269, 271, 277, 281, 283, 293,
    307, 311, 313, 317, 331, 337, 347, 349, 353, 359, 367, 373, 379, 383, 389, 397, 401, 409, 419,
    421, 431, 433, 439, 443, 449, 457, 461, 463, 467, 479, 487, 491, 499, 503, 509, 521, 523, 541,
    547, 557, 563, 569, 571, 577, 587, 593, 599, 601, 607, 613, 617, 619, 631, 641, 643, 647, 653,
    659, 661, 673, 677, 683, 691, 701, 709, 719, 727, 733, 739, 743, 751, 757, 761, 769, 773, 787,
    797, 809, 811, 821, 823, 827, 829, 839, 853, 857, 859, 863, 877, 881, 883, 887, 907, 911, 919,
    929, 937, 941, 947, 953, 967, 971, 977, 983, 991, 997,
];

/// Cosine above which a sampled direction counts as aligned with `+Y`.
pub const DEFAULT_UP_SWAP_THRESHOLD: f32 = 0.98;

const DEGENERATE_CROSS: f32 = 1e-8;

/// Returns the `index`-th element of the Halton sequence for the prime
/// selected by `base`. Bases past the end of [`PRIMES`] wrap around.
pub fn halton(base: usize, index: u32) -> f32 {
    let prime = PRIMES[base % PRIMES.len()];
    let step = 1.0 / prime as f32;
    let mut sum = 0.0f32;
    let mut weight = step;
    let mut index = index;
    while index > 0 {
        let digit = index % prime;
        sum += digit as f32 * weight;
        index /= prime;
        weight *= step;
    }
    sum
}

/// Produces a fresh orthonormal rotation on every call.
///
/// Each sampler owns its counter, so independent streams never interfere and
/// two samplers built the same way yield the same sequence.
#[derive(Debug, Clone)]
pub struct RotationSampler {
    index: u32,
    up_swap_threshold: f32,
}

impl RotationSampler {
    pub fn new() -> Self {
        Self::with_up_swap_threshold(DEFAULT_UP_SWAP_THRESHOLD)
    }

    pub fn with_up_swap_threshold(up_swap_threshold: f32) -> Self {
        Self {
            index: 0,
            up_swap_threshold,
        }
    }

    /// Number of rotations produced so far.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn up_swap_threshold(&self) -> f32 {
        self.up_swap_threshold
    }

    /// Direction on the unit sphere for the current counter value.
    fn direction(&self) -> Vec3 {
        let theta = PI * halton(0, self.index);
        let phi = 2.0 * PI * halton(1, self.index);
        let sin_theta = theta.sin();
        Vec3::new(sin_theta * phi.cos(), theta.cos(), sin_theta * phi.sin()).normalize()
    }

    /// Advances the counter and returns a rotation whose rows are an
    /// orthonormal basis around the sampled direction.
    pub fn next_rotation(&mut self) -> Matrix4 {
        let forward = self.direction();
        self.index = self.index.wrapping_add(1);
        basis_around(forward, self.up_swap_threshold)
    }
}

/// Rotation with rows `(tangent, bitangent, forward)`.
///
/// The helper axis is `+Y` unless `forward` lies within `up_swap_threshold`
/// cosine of it, in which case `+Z` is used. A direction at the `-Y` pole
/// also takes `+Z`, since `+Y` would give a zero tangent.
pub fn basis_around(forward: Vec3, up_swap_threshold: f32) -> Matrix4 {
    let up = if forward.dot(Vec3::Y) >= up_swap_threshold {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let mut tangent = forward.cross(up);
    if tangent.length_squared() < DEGENERATE_CROSS {
        tangent = forward.cross(Vec3::Z);
    }
    let tangent = tangent.normalize();
    let bitangent = tangent.cross(forward).normalize();
    Matrix4::from_basis_rows(tangent, bitangent, forward)
}

impl Default for RotationSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for RotationSampler {
    type Item = Matrix4;

    fn next(&mut self) -> Option<Matrix4> {
        Some(self.next_rotation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn halton_starts_at_zero() {
        for base in 0..10 {
            assert_eq!(halton(base, 0), 0.0);
        }
    }

    #[test]
    fn halton_matches_known_radical_inverses() {
        assert_eq!(halton(0, 1), 0.5);
        assert_eq!(halton(0, 2), 0.25);
        assert_eq!(halton(0, 3), 0.75);
        assert!((halton(1, 1) - 1.0 / 3.0).abs() < 1e-6);
        assert!((halton(1, 5) - (2.0 / 3.0 + 1.0 / 9.0)).abs() < 1e-6);
    }

    #[test]
    fn halton_stays_in_unit_interval() {
        for base in [0, 1, 2, 7, 100, 167, 500] {
            for index in 0..2000 {
                let value = halton(base, index);
                assert!((0.0..1.0).contains(&value), "halton({base}, {index}) = {value}");
            }
        }
    }

    #[test]
    fn halton_base_wraps_around_prime_table() {
        assert_eq!(halton(PRIMES.len(), 7), halton(0, 7));
        assert_eq!(halton(PRIMES.len() + 1, 11), halton(1, 11));
    }

    #[test]
    fn halton_does_not_repeat_within_a_cycle() {
        for base in [0usize, 1, 2] {
            let prime = PRIMES[base];
            let count = prime * prime * prime;
            let seen: HashSet<u32> = (0..count).map(|i| halton(base, i).to_bits()).collect();
            assert_eq!(seen.len(), count as usize);
        }
    }

    #[test]
    fn rotations_are_orthonormal() {
        let mut sampler = RotationSampler::new();
        for _ in 0..256 {
            let rotation = sampler.next_rotation();
            let columns: Vec<Vec3> = (0..3).map(|i| rotation.column(i).truncate()).collect();
            for (i, a) in columns.iter().enumerate() {
                assert!((a.length() - 1.0).abs() < 1e-4, "column {i} not unit: {a}");
                for b in columns.iter().skip(i + 1) {
                    assert!(a.dot(*b).abs() < 1e-4);
                }
            }
            assert_eq!(rotation.column(3), glam::Vec4::W);
            assert_eq!(rotation.row(3), glam::Vec4::W);
        }
    }

    #[test]
    fn counter_strictly_increases_and_rotations_differ() {
        let mut sampler = RotationSampler::new();
        let mut previous = sampler.next_rotation();
        for expected in 2..64 {
            let next = sampler.next_rotation();
            assert_eq!(sampler.index(), expected);
            assert_ne!(next, previous);
            previous = next;
        }
    }

    #[test]
    fn first_sample_points_straight_up_and_swaps_axis() {
        let rotation = RotationSampler::new().next_rotation();
        // Halton index 0 gives theta = 0, the +Y pole, which forces the +Z up axis.
        assert!((rotation.row(2).truncate() - Vec3::Y).length() < 1e-6);
        assert!((rotation.row(0).truncate() - Vec3::X).length() < 1e-6);
    }

    #[test]
    fn downward_direction_keeps_the_y_up_axis() {
        let mut sampler = RotationSampler::new();
        let rotation = sampler.nth(31).unwrap();
        let forward = rotation.row(2).truncate();
        assert!(forward.dot(Vec3::Y) < -0.99);

        let expected = forward.cross(Vec3::Y).normalize();
        let tangent = rotation.row(0).truncate();
        assert!((tangent - expected).length() < 1e-5, "{tangent} != {expected}");
        assert_eq!(tangent.y, 0.0);
    }

    #[test]
    fn exact_downward_pole_falls_back_to_z() {
        let rotation = basis_around(-Vec3::Y, DEFAULT_UP_SWAP_THRESHOLD);
        let tangent = rotation.row(0).truncate();
        assert!(tangent.is_finite());
        assert!((tangent + Vec3::X).length() < 1e-6);
        assert!((rotation.row(1).truncate() - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn independent_samplers_are_reproducible() {
        let a: Vec<Matrix4> = RotationSampler::new().take(32).collect();
        let b: Vec<Matrix4> = RotationSampler::default().take(32).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn threshold_is_overridable() {
        let sampler = RotationSampler::with_up_swap_threshold(0.5);
        assert_eq!(sampler.up_swap_threshold(), 0.5);
        let rotations: Vec<Matrix4> = sampler.take(16).collect();
        assert!(rotations
            .iter()
            .all(|r| r.column(0).truncate().is_finite()));
    }
}
