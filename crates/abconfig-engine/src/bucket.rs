//! Bucket selection
//!
//! Conditions are laid end to end on a 100-point line in stored order, each
//! taking as many points as its weight. A selection key picks the condition
//! whose span contains it; anything past the last span selects nothing.
//!
//! Two keys exist and they use complementary interval conventions:
//! - a uniform draw in `1..=100` wins span `(start, start + weight]`
//! - a stable device bucket in `0..100` wins span `[start, start + weight)`
//!
//! Both partition their range without gaps or overlap.

use abconfig_model::{Condition, DeviceFingerprint};
use rand::rngs::{StdRng, ThreadRng};
use rand::{Rng, SeedableRng};

/// Anything with a selection weight
pub trait Weighted {
    /// Points this item occupies
    fn weight(&self) -> u32;
}

impl Weighted for u32 {
    fn weight(&self) -> u32 {
        *self
    }
}

impl Weighted for &Condition {
    fn weight(&self) -> u32 {
        self.weight
    }
}

/// A selection key and the interval convention that goes with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketSelector {
    /// Uniform draw in `1..=100`
    Uniform(u32),
    /// Stable bucket in `0..100`
    Stable(u32),
}

impl BucketSelector {
    /// Stable selector for a device and experiment offset
    #[inline]
    #[must_use]
    pub fn for_device(fingerprint: &DeviceFingerprint, numeric_offset: u8) -> Self {
        Self::Stable(fingerprint.bucket(numeric_offset))
    }

    /// The key value
    #[inline]
    #[must_use]
    pub const fn key(self) -> u32 {
        match self {
            Self::Uniform(num) | Self::Stable(num) => num,
        }
    }

    /// Walk `items` in order and return the first whose span contains the key
    pub fn select<T: Weighted>(self, items: impl IntoIterator<Item = T>) -> Option<T> {
        let mut running: u64 = 0;
        for item in items {
            let end = running + u64::from(item.weight());
            let hit = match self {
                Self::Uniform(num) => u64::from(num) > running && u64::from(num) <= end,
                Self::Stable(num) => u64::from(num) >= running && u64::from(num) < end,
            };
            if hit {
                return Some(item);
            }
            running = end;
        }
        None
    }
}

/// Source of uniform draws in `1..=100`
pub trait BucketDraw {
    /// Next draw
    fn roll(&mut self) -> u32;
}

/// Uniform draws from a random number generator
#[derive(Debug, Clone)]
pub struct UniformDraw<R> {
    rng: R,
}

impl<R: Rng> UniformDraw<R> {
    /// Draw from `rng`
    #[inline]
    #[must_use]
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl UniformDraw<StdRng> {
    /// Reproducible draws
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl Default for UniformDraw<ThreadRng> {
    fn default() -> Self {
        Self::new(rand::rng())
    }
}

impl<R: Rng> BucketDraw for UniformDraw<R> {
    fn roll(&mut self) -> u32 {
        self.rng.random_range(1..=100)
    }
}

impl<D: BucketDraw + ?Sized> BucketDraw for &mut D {
    fn roll(&mut self) -> u32 {
        (**self).roll()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_upper_bound_is_inclusive() {
        let weights = [30u32, 20];
        assert_eq!(BucketSelector::Uniform(1).select(weights.iter().copied()), Some(30));
        assert_eq!(BucketSelector::Uniform(30).select(weights.iter().copied()), Some(30));
        assert_eq!(BucketSelector::Uniform(31).select(weights.iter().copied()), Some(20));
        assert_eq!(BucketSelector::Uniform(50).select(weights.iter().copied()), Some(20));
        assert_eq!(BucketSelector::Uniform(51).select(weights.iter().copied()), None);
        assert_eq!(BucketSelector::Uniform(75).select(weights.iter().copied()), None);
    }

    #[test]
    fn stable_upper_bound_is_exclusive() {
        let weights = [30u32, 20];
        assert_eq!(BucketSelector::Stable(0).select(weights.iter().copied()), Some(30));
        assert_eq!(BucketSelector::Stable(29).select(weights.iter().copied()), Some(30));
        assert_eq!(BucketSelector::Stable(30).select(weights.iter().copied()), Some(20));
        assert_eq!(BucketSelector::Stable(49).select(weights.iter().copied()), Some(20));
        assert_eq!(BucketSelector::Stable(50).select(weights.iter().copied()), None);
    }

    #[test]
    fn zero_weight_never_wins() {
        let weights = [0u32, 100];
        for num in 1..=100 {
            assert_eq!(BucketSelector::Uniform(num).select(weights.iter().copied()), Some(100));
        }
        for num in 0..100 {
            assert_eq!(BucketSelector::Stable(num).select(weights.iter().copied()), Some(100));
        }
    }

    #[test]
    fn empty_selects_nothing() {
        assert_eq!(BucketSelector::Uniform(1).select(Vec::<u32>::new()), None);
        assert_eq!(BucketSelector::Stable(0).select(Vec::<u32>::new()), None);
    }

    #[test]
    fn seeded_draws_repeat_and_stay_in_range() {
        let mut a = UniformDraw::seeded(7);
        let mut b = UniformDraw::seeded(7);
        for _ in 0..500 {
            let roll = a.roll();
            assert_eq!(roll, b.roll());
            assert!((1..=100).contains(&roll));
        }
    }
}
