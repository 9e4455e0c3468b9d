// Copyright (c) 2025 Skylark Labs, Inc.
//
// All rights reserved.

//! Owner-gated redirection in front of an [`Aggregator`].
//!
//! Consumers read through the proxy; the aggregator behind it is swapped
//! with a two-step propose/confirm handshake. Every confirmation bumps the
//! phase id, and proxy round ids encode the phase in their upper bits so a
//! historical round keeps resolving against the aggregator that produced it.

use std::collections::BTreeMap;

use alloy_primitives::Address;
use thiserror::Error;

use crate::{
    events::{EventLog, ProxyEvent},
    types::AdminCap,
};

use super::{Aggregator, AggregatorError, RoundData};

/// Bit offset of the phase id inside a proxy round id.
pub const PHASE_OFFSET: u32 = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    #[error("caller does not hold the proxy admin capability")]
    OnlyOwner,

    #[error("confirmed aggregator does not match the proposed one")]
    InvalidProposedAggregator,

    #[error("no aggregator has been proposed")]
    NoProposedAggregator,

    #[error("aggregator {0} is not present in the directory")]
    UnknownAggregator(Address),

    #[error("round id {0} does not decode to a known phase")]
    InvalidRoundId(u128),

    #[error(transparent)]
    Aggregator(#[from] AggregatorError),
}

/// Resolver from aggregator address to instance, supplied by the host at
/// read time.
pub trait AggregatorDirectory {
    fn aggregator(&self, address: Address) -> Option<&Aggregator>;
}

impl AggregatorDirectory for std::collections::HashMap<Address, Aggregator> {
    fn aggregator(&self, address: Address) -> Option<&Aggregator> {
        self.get(&address)
    }
}

pub struct AggregatorProxy {
    address: Address,
    phase_id: u16,
    phase_aggregators: BTreeMap<u16, Address>,
    proposed: Option<Address>,
    events: EventLog<ProxyEvent>,
}

impl AggregatorProxy {
    pub fn new(address: Address, aggregator: Address) -> (Self, AdminCap) {
        let mut phase_aggregators = BTreeMap::new();
        phase_aggregators.insert(1, aggregator);
        let proxy =
            Self { address, phase_id: 1, phase_aggregators, proposed: None, events: EventLog::default() };
        (proxy, AdminCap::new(address))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn events(&self) -> &EventLog<ProxyEvent> {
        &self.events
    }

    pub fn phase_id(&self) -> u16 {
        self.phase_id
    }

    /// The aggregator currently served to readers.
    pub fn aggregator(&self) -> Address {
        // phase 1 is seeded at construction; the map is never empty
        self.phase_aggregators.get(&self.phase_id).copied().unwrap_or(Address::ZERO)
    }

    pub fn proposed_aggregator(&self) -> Option<Address> {
        self.proposed
    }

    pub fn phase_aggregators(&self, phase_id: u16) -> Option<Address> {
        self.phase_aggregators.get(&phase_id).copied()
    }

    fn check_admin(&self, admin: &AdminCap) -> Result<(), ProxyError> {
        if admin.component() != self.address {
            return Err(ProxyError::OnlyOwner);
        }
        Ok(())
    }

    pub fn propose_aggregator(
        &mut self,
        admin: &AdminCap,
        aggregator: Address,
    ) -> Result<(), ProxyError> {
        self.check_admin(admin)?;
        let current = self.aggregator();
        self.proposed = Some(aggregator);
        self.events.push(ProxyEvent::AggregatorProposed { current, proposed: aggregator });
        Ok(())
    }

    /// Confirm the previously proposed aggregator, opening a new phase.
    pub fn confirm_aggregator(
        &mut self,
        admin: &AdminCap,
        aggregator: Address,
    ) -> Result<(), ProxyError> {
        self.check_admin(admin)?;
        if self.proposed != Some(aggregator) {
            return Err(ProxyError::InvalidProposedAggregator);
        }
        let previous = self.aggregator();
        self.proposed = None;
        self.phase_id += 1;
        self.phase_aggregators.insert(self.phase_id, aggregator);
        self.events.push(ProxyEvent::AggregatorConfirmed { previous, latest: aggregator });
        tracing::info!("Aggregator confirmed: {aggregator}, phase {}", self.phase_id);
        Ok(())
    }

    // Reads ////////////////////////////////////////////////////////////////

    pub fn latest_round_data(
        &self,
        directory: &dyn AggregatorDirectory,
    ) -> Result<RoundData, ProxyError> {
        let address = self.aggregator();
        let aggregator =
            directory.aggregator(address).ok_or(ProxyError::UnknownAggregator(address))?;
        Ok(self.add_phase(self.phase_id, aggregator.latest_round_data()?))
    }

    /// Resolve a phase-encoded round id against the aggregator of its phase.
    pub fn round_data(
        &self,
        directory: &dyn AggregatorDirectory,
        proxy_round_id: u128,
    ) -> Result<RoundData, ProxyError> {
        let phase_id = (proxy_round_id >> PHASE_OFFSET) as u16;
        let round_id = u32::try_from(proxy_round_id & ((1u128 << PHASE_OFFSET) - 1))
            .map_err(|_| ProxyError::InvalidRoundId(proxy_round_id))?;
        let address = self
            .phase_aggregators(phase_id)
            .ok_or(ProxyError::InvalidRoundId(proxy_round_id))?;
        let aggregator =
            directory.aggregator(address).ok_or(ProxyError::UnknownAggregator(address))?;
        Ok(self.add_phase(phase_id, aggregator.round_data(round_id)?))
    }

    pub fn proposed_latest_round_data(
        &self,
        directory: &dyn AggregatorDirectory,
    ) -> Result<RoundData, ProxyError> {
        let address = self.proposed.ok_or(ProxyError::NoProposedAggregator)?;
        let aggregator =
            directory.aggregator(address).ok_or(ProxyError::UnknownAggregator(address))?;
        Ok(aggregator.latest_round_data()?)
    }

    pub fn proposed_round_data(
        &self,
        directory: &dyn AggregatorDirectory,
        round_id: u32,
    ) -> Result<RoundData, ProxyError> {
        let address = self.proposed.ok_or(ProxyError::NoProposedAggregator)?;
        let aggregator =
            directory.aggregator(address).ok_or(ProxyError::UnknownAggregator(address))?;
        Ok(aggregator.round_data(round_id)?)
    }

    pub fn decimals(&self, directory: &dyn AggregatorDirectory) -> Result<u8, ProxyError> {
        let address = self.aggregator();
        let aggregator =
            directory.aggregator(address).ok_or(ProxyError::UnknownAggregator(address))?;
        Ok(aggregator.decimals())
    }

    fn add_phase(&self, phase_id: u16, mut data: RoundData) -> RoundData {
        data.round_id = proxy_round_id(phase_id, data.round_id as u32);
        data.answered_in_round = proxy_round_id(phase_id, data.answered_in_round as u32);
        data
    }
}

/// Phase-encoded round id: `phase_id << 64 | round_id`.
pub fn proxy_round_id(phase_id: u16, round_id: u32) -> u128 {
    ((phase_id as u128) << PHASE_OFFSET) | round_id as u128
}
