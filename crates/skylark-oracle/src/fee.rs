// Copyright (c) 2025 Skylark Labs, Inc.
//
// All rights reserved.

//! Tiered service-fee schedule.
//!
//! Accounts move through five flat-fee tiers as their fulfilled-request count
//! crosses the configured thresholds. A tier's fee applies while the count is
//! at or below the next threshold; past the last threshold the fifth tier
//! applies forever. The schedule is expected to be non-increasing by
//! convention, but this is not enforced.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Five-tier flat-fee schedule with the request-count thresholds separating
/// the tiers.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FeeConfig {
    pub fulfillment_flat_fee_tier1: U256,
    pub fulfillment_flat_fee_tier2: U256,
    pub fulfillment_flat_fee_tier3: U256,
    pub fulfillment_flat_fee_tier4: U256,
    pub fulfillment_flat_fee_tier5: U256,
    pub reqs_for_tier2: u64,
    pub reqs_for_tier3: u64,
    pub reqs_for_tier4: u64,
    pub reqs_for_tier5: u64,
}

impl FeeConfig {
    /// A schedule charging the same flat fee at every tier.
    pub fn flat(fee: U256) -> Self {
        Self {
            fulfillment_flat_fee_tier1: fee,
            fulfillment_flat_fee_tier2: fee,
            fulfillment_flat_fee_tier3: fee,
            fulfillment_flat_fee_tier4: fee,
            fulfillment_flat_fee_tier5: fee,
            reqs_for_tier2: 0,
            reqs_for_tier3: 0,
            reqs_for_tier4: 0,
            reqs_for_tier5: 0,
        }
    }

    /// Flat fee for a single submission at the account's current
    /// fulfilled-request count. Tier boundaries are inclusive on the upper
    /// end: a count exactly at `reqs_for_tierN` still pays tier N-1.
    pub fn service_fee(&self, req_count: u64) -> U256 {
        if req_count <= self.reqs_for_tier2 {
            self.fulfillment_flat_fee_tier1
        } else if req_count <= self.reqs_for_tier3 {
            self.fulfillment_flat_fee_tier2
        } else if req_count <= self.reqs_for_tier4 {
            self.fulfillment_flat_fee_tier3
        } else if req_count <= self.reqs_for_tier5 {
            self.fulfillment_flat_fee_tier4
        } else {
            self.fulfillment_flat_fee_tier5
        }
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self::flat(U256::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1 KLAY in kei.
    fn klay(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    fn schedule() -> FeeConfig {
        FeeConfig {
            fulfillment_flat_fee_tier1: klay(5),
            fulfillment_flat_fee_tier2: klay(4),
            fulfillment_flat_fee_tier3: klay(3),
            fulfillment_flat_fee_tier4: klay(2),
            fulfillment_flat_fee_tier5: klay(1),
            reqs_for_tier2: 10,
            reqs_for_tier3: 20,
            reqs_for_tier4: 30,
            reqs_for_tier5: 40,
        }
    }

    #[test]
    fn tier_boundaries_are_inclusive() {
        let config = schedule();
        assert_eq!(config.service_fee(0), klay(5));
        assert_eq!(config.service_fee(10), klay(5));
        assert_eq!(config.service_fee(11), klay(4));
        assert_eq!(config.service_fee(20), klay(4));
        assert_eq!(config.service_fee(21), klay(3));
        assert_eq!(config.service_fee(30), klay(3));
        assert_eq!(config.service_fee(31), klay(2));
        assert_eq!(config.service_fee(40), klay(2));
        assert_eq!(config.service_fee(41), klay(1));
        assert_eq!(config.service_fee(u64::MAX), klay(1));
    }

    #[test]
    fn fee_is_constant_within_a_tier_and_non_increasing_across() {
        let config = schedule();
        let mut prev = config.service_fee(0);
        for req_count in 1..60 {
            let fee = config.service_fee(req_count);
            assert!(fee <= prev, "fee increased at req_count {req_count}");
            prev = fee;
        }
    }

    #[test]
    fn flat_schedule_ignores_req_count() {
        let config = FeeConfig::flat(klay(2));
        for req_count in [0, 1, 100, 10_000] {
            assert_eq!(config.service_fee(req_count), klay(2));
        }
    }
}
