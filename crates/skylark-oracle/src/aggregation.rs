// Copyright (c) 2025 Skylark Labs, Inc.
//
// All rights reserved.

//! Deterministic aggregation primitives shared by the data-feed aggregator
//! and the request-response coordinator.
//!
//! Median convention: sort ascending; odd count takes the middle element,
//! even count takes the two middle elements averaged with integer division.

use alloy_primitives::{I256, U256};

/// Median of signed submissions. `None` on an empty slice.
pub fn median(values: &[I256]) -> Option<I256> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some(signed_average(sorted[mid - 1], sorted[mid]))
    }
}

/// Median of unsigned 128-bit submissions. `None` on an empty slice.
pub fn median_u128(values: &[u128]) -> Option<u128> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        let (a, b) = (sorted[mid - 1], sorted[mid]);
        // overflow-free integer average
        Some(a / 2 + b / 2 + (a % 2 + b % 2) / 2)
    }
}

/// Strict-majority vote: true iff more than half of the votes are true.
/// `None` on an empty slice.
pub fn majority_vote(votes: &[bool]) -> Option<bool> {
    if votes.is_empty() {
        return None;
    }
    let ayes = votes.iter().filter(|vote| **vote).count();
    Some(ayes * 2 > votes.len())
}

/// Overflow-free average with the same truncating division the settlement
/// math uses everywhere else.
fn signed_average(a: I256, b: I256) -> I256 {
    let two = I256::from_raw(U256::from(2u64));
    if a.is_negative() == b.is_negative() {
        // same sign: halve first, the sum of halves cannot overflow
        a / two + b / two + (a % two + b % two) / two
    } else {
        // opposite signs: the sum cannot overflow
        (a + b) / two
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn int(value: i64) -> I256 {
        I256::try_from(value).unwrap()
    }

    fn ints(values: &[i64]) -> Vec<I256> {
        values.iter().map(|v| int(*v)).collect()
    }

    #[test]
    fn empty_input_has_no_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median_u128(&[]), None);
        assert_eq!(majority_vote(&[]), None);
    }

    #[test]
    fn single_value_is_its_own_median() {
        assert_eq!(median(&ints(&[1])), Some(int(1)));
        assert_eq!(median_u128(&[7]), Some(7));
    }

    #[test]
    fn odd_count_takes_middle_value() {
        assert_eq!(median(&ints(&[1, 2, 3])), Some(int(2)));
        assert_eq!(median(&ints(&[9, 7, 8])), Some(int(8)));
    }

    #[test]
    fn even_count_takes_floor_average_of_middle_pair() {
        assert_eq!(median(&ints(&[1, 2, 3, 4])), Some(int(2)));
        assert_eq!(median(&ints(&[9, 8, 7, 6])), Some(int(7)));
        assert_eq!(median_u128(&[1, 2, 3, 4]), Some(2));
    }

    #[test]
    fn median_of_large_values_does_not_overflow() {
        assert_eq!(median_u128(&[u128::MAX, u128::MAX - 1]), Some(u128::MAX - 1));

        let huge = I256::MAX;
        assert_eq!(median(&[huge, huge]), Some(huge));
        let low = I256::MIN + I256::ONE;
        assert_eq!(median(&[low, low]), Some(low));
    }

    #[test]
    fn median_handles_negative_submissions() {
        assert_eq!(median(&ints(&[-5, -3, -1])), Some(int(-3)));
        assert_eq!(median(&ints(&[-4, -3])), Some(int(-3))); // truncating division
    }

    #[test]
    fn majority_requires_strictly_more_than_half() {
        assert_eq!(majority_vote(&[true, false, true]), Some(true));
        assert_eq!(majority_vote(&[false, true, false]), Some(false));
        assert_eq!(majority_vote(&[true, false]), Some(false)); // tie is a no
        assert_eq!(majority_vote(&[true]), Some(true));
    }

    proptest! {
        #[test]
        fn median_matches_sorted_middle_convention(mut values in prop::collection::vec(any::<i64>(), 1..40)) {
            let computed = median(&ints(&values)).unwrap();
            values.sort_unstable();
            let mid = values.len() / 2;
            let expected = if values.len() % 2 == 1 {
                int(values[mid])
            } else {
                // i128 arithmetic cannot overflow for i64 inputs
                let sum = values[mid - 1] as i128 + values[mid] as i128;
                // truncating, like the engine's settlement math
                I256::try_from(sum / 2).unwrap()
            };
            prop_assert_eq!(computed, expected);
        }

        #[test]
        fn median_is_permutation_invariant(values in prop::collection::vec(any::<u128>(), 1..20), seed in any::<u64>()) {
            use rand::{seq::SliceRandom, SeedableRng};
            let mut shuffled = values.clone();
            shuffled.shuffle(&mut rand::rngs::StdRng::seed_from_u64(seed));
            prop_assert_eq!(median_u128(&values), median_u128(&shuffled));
        }
    }
}
