// Copyright (c) 2025 Skylark Labs, Inc.
//
// All rights reserved.

//! Deployment configuration.
//!
//! A TOML file seeds the engine's tunables at deployment time: ledger fee
//! ratios, coordinator gas limits, the tiered fee schedule (KLAY-denominated
//! decimal strings) and the aggregator round parameters.

use std::path::Path;

use alloy_primitives::{utils::parse_ether, U256};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::fee::FeeConfig;

pub mod defaults {
    pub const fn max_gas_limit() -> u64 {
        2_500_000
    }

    pub const fn gas_after_payment_calculation() -> u64 {
        50_000
    }

    /// 25 gkei, the network's fixed unit price.
    pub const fn gas_price() -> u64 {
        25_000_000_000
    }

    pub const fn burn_fee_ratio() -> u8 {
        50
    }

    pub const fn protocol_fee_ratio() -> u8 {
        5
    }

    pub fn flat_fee_tier() -> String {
        "0.25".to_string()
    }

    pub const fn reqs_for_tier() -> u64 {
        0
    }

    pub const fn aggregator_timeout() -> u64 {
        1_800
    }

    pub const fn decimals() -> u8 {
        8
    }

    pub fn description() -> String {
        String::new()
    }

    pub const fn min_submission_count() -> u32 {
        2
    }

    pub const fn max_submission_count() -> u32 {
        3
    }

    pub const fn restart_delay() -> u32 {
        0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSettings {
    #[serde(default = "defaults::burn_fee_ratio")]
    pub burn_fee_ratio: u8,
    #[serde(default = "defaults::protocol_fee_ratio")]
    pub protocol_fee_ratio: u8,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            burn_fee_ratio: defaults::burn_fee_ratio(),
            protocol_fee_ratio: defaults::protocol_fee_ratio(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorSettings {
    #[serde(default = "defaults::max_gas_limit")]
    pub max_gas_limit: u64,
    #[serde(default = "defaults::gas_after_payment_calculation")]
    pub gas_after_payment_calculation: u64,
    /// Flat gas price in kei used to convert callback gas into a fee.
    #[serde(default = "defaults::gas_price")]
    pub gas_price: u64,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            max_gas_limit: defaults::max_gas_limit(),
            gas_after_payment_calculation: defaults::gas_after_payment_calculation(),
            gas_price: defaults::gas_price(),
        }
    }
}

/// Tier fees are decimal KLAY amounts, parsed with 18 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSettings {
    #[serde(default = "defaults::flat_fee_tier")]
    pub fulfillment_flat_fee_tier1: String,
    #[serde(default = "defaults::flat_fee_tier")]
    pub fulfillment_flat_fee_tier2: String,
    #[serde(default = "defaults::flat_fee_tier")]
    pub fulfillment_flat_fee_tier3: String,
    #[serde(default = "defaults::flat_fee_tier")]
    pub fulfillment_flat_fee_tier4: String,
    #[serde(default = "defaults::flat_fee_tier")]
    pub fulfillment_flat_fee_tier5: String,
    #[serde(default = "defaults::reqs_for_tier")]
    pub reqs_for_tier2: u64,
    #[serde(default = "defaults::reqs_for_tier")]
    pub reqs_for_tier3: u64,
    #[serde(default = "defaults::reqs_for_tier")]
    pub reqs_for_tier4: u64,
    #[serde(default = "defaults::reqs_for_tier")]
    pub reqs_for_tier5: u64,
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            fulfillment_flat_fee_tier1: defaults::flat_fee_tier(),
            fulfillment_flat_fee_tier2: defaults::flat_fee_tier(),
            fulfillment_flat_fee_tier3: defaults::flat_fee_tier(),
            fulfillment_flat_fee_tier4: defaults::flat_fee_tier(),
            fulfillment_flat_fee_tier5: defaults::flat_fee_tier(),
            reqs_for_tier2: defaults::reqs_for_tier(),
            reqs_for_tier3: defaults::reqs_for_tier(),
            reqs_for_tier4: defaults::reqs_for_tier(),
            reqs_for_tier5: defaults::reqs_for_tier(),
        }
    }
}

impl FeeSettings {
    pub fn fee_config(&self) -> Result<FeeConfig> {
        fn tier(value: &str) -> Result<U256> {
            Ok(parse_ether(value).with_context(|| format!("invalid fee amount {value:?}"))?)
        }
        Ok(FeeConfig {
            fulfillment_flat_fee_tier1: tier(&self.fulfillment_flat_fee_tier1)?,
            fulfillment_flat_fee_tier2: tier(&self.fulfillment_flat_fee_tier2)?,
            fulfillment_flat_fee_tier3: tier(&self.fulfillment_flat_fee_tier3)?,
            fulfillment_flat_fee_tier4: tier(&self.fulfillment_flat_fee_tier4)?,
            fulfillment_flat_fee_tier5: tier(&self.fulfillment_flat_fee_tier5)?,
            reqs_for_tier2: self.reqs_for_tier2,
            reqs_for_tier3: self.reqs_for_tier3,
            reqs_for_tier4: self.reqs_for_tier4,
            reqs_for_tier5: self.reqs_for_tier5,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorSettings {
    #[serde(default = "defaults::aggregator_timeout")]
    pub timeout: u64,
    #[serde(default = "defaults::decimals")]
    pub decimals: u8,
    #[serde(default = "defaults::description")]
    pub description: String,
    #[serde(default = "defaults::min_submission_count")]
    pub min_submission_count: u32,
    #[serde(default = "defaults::max_submission_count")]
    pub max_submission_count: u32,
    #[serde(default = "defaults::restart_delay")]
    pub restart_delay: u32,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            timeout: defaults::aggregator_timeout(),
            decimals: defaults::decimals(),
            description: defaults::description(),
            min_submission_count: defaults::min_submission_count(),
            max_submission_count: defaults::max_submission_count(),
            restart_delay: defaults::restart_delay(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub coordinator: CoordinatorSettings,
    #[serde(default)]
    pub fee: FeeSettings,
    #[serde(default)]
    pub aggregator: AggregatorSettings,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&data).context("failed to parse config file")?;
        // surface schedule mistakes at load time, not at the first request
        config.fee.fee_config()?;
        Ok(config)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let data = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config file {}", path.display()))
    }
}
