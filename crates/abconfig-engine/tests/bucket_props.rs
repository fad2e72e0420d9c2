use abconfig_engine::{BucketSelector, Weighted};
use abconfig_model::DeviceFingerprint;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    index: usize,
    weight: u32,
}

impl Weighted for Slot {
    fn weight(&self) -> u32 {
        self.weight
    }
}

fn slots(weights: &[u32]) -> Vec<Slot> {
    weights
        .iter()
        .enumerate()
        .map(|(index, &weight)| Slot { index, weight })
        .collect()
}

/// Weight lists summing to at most 100
fn weights() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(0u32..=100, 0..8).prop_map(|mut ws| {
        let mut budget = 100;
        for w in &mut ws {
            *w = (*w).min(budget);
            budget -= *w;
        }
        ws
    })
}

/// Weight lists summing to exactly 100
fn full_weights() -> impl Strategy<Value = Vec<u32>> {
    weights().prop_map(|mut ws| {
        let total: u32 = ws.iter().sum();
        ws.push(100 - total);
        ws
    })
}

proptest! {
    #[test]
    fn prop_uniform_winner_owns_the_draw(ws in weights(), num in 1u32..=100) {
        let mut prev = 0;
        let mut expected = None;
        for (i, &w) in ws.iter().enumerate() {
            if num > prev && num <= prev + w {
                expected = Some(i);
                break;
            }
            prev += w;
        }
        let winner = BucketSelector::Uniform(num).select(slots(&ws)).map(|s| s.index);
        prop_assert_eq!(winner, expected);
    }

    #[test]
    fn prop_stable_partition_has_no_gaps_or_overlaps(ws in weights()) {
        let total: u32 = ws.iter().sum();
        for num in 0..100u32 {
            let covering: Vec<usize> = {
                let mut prev = 0;
                let mut hits = Vec::new();
                for (i, &w) in ws.iter().enumerate() {
                    if num >= prev && num < prev + w {
                        hits.push(i);
                    }
                    prev += w;
                }
                hits
            };
            prop_assert!(covering.len() <= 1);
            let winner = BucketSelector::Stable(num).select(slots(&ws)).map(|s| s.index);
            prop_assert_eq!(winner, covering.first().copied());
            prop_assert_eq!(winner.is_some(), num < total);
        }
    }

    #[test]
    fn prop_full_weights_always_select(ws in full_weights(), num in 1u32..=100, bucket in 0u32..100) {
        prop_assert!(BucketSelector::Uniform(num).select(slots(&ws)).is_some());
        prop_assert!(BucketSelector::Stable(bucket).select(slots(&ws)).is_some());
    }

    #[test]
    fn prop_zero_weights_never_win(ws in weights(), num in 1u32..=100) {
        if let Some(slot) = BucketSelector::Uniform(num).select(slots(&ws)) {
            prop_assert!(slot.weight > 0);
        }
    }

    #[test]
    fn prop_device_selection_is_deterministic(
        addr in "[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}",
        ua in "[ -~]{0,40}",
        offset in 0u8..100,
        ws in weights(),
    ) {
        let first = BucketSelector::for_device(&DeviceFingerprint::compute(&addr, &ua), offset);
        let second = BucketSelector::for_device(&DeviceFingerprint::compute(&addr, &ua), offset);
        prop_assert_eq!(first, second);
        prop_assert!(first.key() < 100);
        prop_assert_eq!(first.select(slots(&ws)), second.select(slots(&ws)));
    }
}
