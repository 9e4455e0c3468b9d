// Copyright (c) 2025 Skylark Labs, Inc.
//
// All rights reserved.

//! Shared request/fulfillment skeleton for both coordinators.
//!
//! A coordinator owns the oracle registry, the fee configuration and the live
//! commitment store. Requests reserve a fee against the ledger and store a
//! [`RequestCommitment`]; fulfillments must present a field-for-field match
//! of the stored commitment, which is deleted exactly once.

pub mod request_response;
pub mod vrf;

use std::collections::HashMap;

use alloy_primitives::{keccak256, Address, B256, U256};
use thiserror::Error;

use crate::{
    events::{CoordinatorEvent, EventLog},
    fee::FeeConfig,
    ledger::{Ledger, LedgerError, RATIO_DENOMINATOR},
    types::{AccId, AccountType, AdminCap, BlockContext, JobId, RequestCommitment, RequestId},
};

pub use request_response::RequestResponseCoordinator;
pub use vrf::VrfCoordinator;

/// Upper bound on registered oracles per coordinator.
pub const MAX_ORACLES: usize = 255;

/// Default flat gas price used to convert a callback gas limit into a fee
/// component (25 gkei, the network's fixed unit price).
pub const DEFAULT_GAS_PRICE: u64 = 25_000_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("caller does not hold the coordinator admin capability")]
    OnlyOwner,

    #[error("callback gas limit {requested} exceeds maximum {max}")]
    GasLimitTooBig { requested: u64, max: u64 },

    #[error("sender is not an authorized consumer of the account")]
    InvalidConsumer,

    #[error("no oracle registered for key hash {0}")]
    InvalidKeyHash(B256),

    #[error("requested {requested} words, maximum is {max}")]
    NumWordsTooBig { requested: u32, max: u32 },

    #[error("oracle {0} is already registered")]
    OracleAlreadyRegistered(Address),

    #[error("oracle {0} is not registered")]
    NoSuchOracle(Address),

    #[error("oracle registry is full")]
    TooManyOracles,

    #[error("oracle {0} is not registered for fulfillment")]
    UnregisteredOracleFulfillment(Address),

    #[error("no proving key registered for the calling oracle under {0}")]
    NoSuchProvingKey(B256),

    #[error("no request corresponds to the given id")]
    NoCorrespondingRequest,

    #[error("supplied commitment does not match the stored one")]
    IncorrectCommitment,

    #[error("caller is not the request owner")]
    NotRequestOwner,

    #[error("oracle {0} already submitted to this request")]
    OracleAlreadySubmitted(Address),

    #[error("job {0:?} does not exist")]
    InvalidJobId(JobId),

    #[error("invalid submission count {requested} (maximum {max})")]
    InvalidNumSubmission { requested: u32, max: u32 },

    #[error("fulfillment type does not match the requested job")]
    IncompatibleJobId,

    #[error("insufficient payment: needed {needed}, available {available}")]
    InsufficientPayment { needed: U256, available: U256 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Gas and fee-schedule configuration, replaced atomically by `set_config`.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub max_gas_limit: u64,
    pub gas_after_payment_calculation: u64,
    pub fee_config: FeeConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_gas_limit: 2_500_000,
            gas_after_payment_calculation: 0,
            fee_config: FeeConfig::default(),
        }
    }
}

/// Deterministic request id for a `(sender, account, nonce)` triple.
pub fn compute_request_id(sender: Address, acc_id: AccId, nonce: u64) -> RequestId {
    let mut buf = Vec::with_capacity(36);
    buf.extend_from_slice(sender.as_slice());
    buf.extend_from_slice(&acc_id.to_be_bytes());
    buf.extend_from_slice(&nonce.to_be_bytes());
    RequestId(keccak256(&buf))
}

/// State shared by both coordinators.
pub(crate) struct CoordinatorBase {
    address: Address,
    oracles: Vec<Address>,
    config: CoordinatorConfig,
    gas_price: U256,
    commitments: HashMap<RequestId, RequestCommitment>,
    events: EventLog<CoordinatorEvent>,
}

impl CoordinatorBase {
    pub(crate) fn new(address: Address) -> Self {
        Self {
            address,
            oracles: Vec::new(),
            config: CoordinatorConfig::default(),
            gas_price: U256::from(DEFAULT_GAS_PRICE),
            commitments: HashMap::new(),
            events: EventLog::default(),
        }
    }

    pub(crate) fn address(&self) -> Address {
        self.address
    }

    pub(crate) fn events(&self) -> &EventLog<CoordinatorEvent> {
        &self.events
    }

    pub(crate) fn push_event(&mut self, event: CoordinatorEvent) {
        self.events.push(event);
    }

    pub(crate) fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub(crate) fn check_admin(&self, admin: &AdminCap) -> Result<(), CoordinatorError> {
        if admin.component() != self.address {
            return Err(CoordinatorError::OnlyOwner);
        }
        Ok(())
    }

    pub(crate) fn set_config(
        &mut self,
        admin: &AdminCap,
        max_gas_limit: u64,
        gas_after_payment_calculation: u64,
        fee_config: FeeConfig,
    ) -> Result<(), CoordinatorError> {
        self.check_admin(admin)?;
        self.config =
            CoordinatorConfig { max_gas_limit, gas_after_payment_calculation, fee_config };
        self.events
            .push(CoordinatorEvent::ConfigSet { max_gas_limit, gas_after_payment_calculation });
        Ok(())
    }

    pub(crate) fn set_gas_price(
        &mut self,
        admin: &AdminCap,
        gas_price: U256,
    ) -> Result<(), CoordinatorError> {
        self.check_admin(admin)?;
        self.gas_price = gas_price;
        Ok(())
    }

    // Oracle registry //////////////////////////////////////////////////////

    pub(crate) fn insert_oracle(&mut self, oracle: Address) -> Result<(), CoordinatorError> {
        if self.oracles.contains(&oracle) {
            return Err(CoordinatorError::OracleAlreadyRegistered(oracle));
        }
        if self.oracles.len() >= MAX_ORACLES {
            return Err(CoordinatorError::TooManyOracles);
        }
        self.oracles.push(oracle);
        Ok(())
    }

    pub(crate) fn remove_oracle(&mut self, oracle: Address) -> Result<(), CoordinatorError> {
        if !self.oracles.contains(&oracle) {
            return Err(CoordinatorError::NoSuchOracle(oracle));
        }
        self.oracles.retain(|o| *o != oracle);
        Ok(())
    }

    pub(crate) fn is_oracle(&self, oracle: Address) -> bool {
        self.oracles.contains(&oracle)
    }

    pub(crate) fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    // Fee estimation ///////////////////////////////////////////////////////

    pub(crate) fn gas_cost(&self, callback_gas_limit: u64) -> U256 {
        self.gas_price
            * U256::from(callback_gas_limit + self.config.gas_after_payment_calculation)
    }

    /// Fee for a regular account: tiered service fee per submission plus the
    /// callback gas component.
    pub(crate) fn estimate_fee(
        &self,
        req_count: u64,
        num_submission: u32,
        callback_gas_limit: u64,
    ) -> U256 {
        self.config.fee_config.service_fee(req_count) * U256::from(num_submission)
            + self.gas_cost(callback_gas_limit)
    }

    /// Fee adjusted for the account's billing mode.
    pub(crate) fn estimate_fee_by_acc(
        &self,
        req_count: u64,
        num_submission: u32,
        callback_gas_limit: u64,
        acc_type: AccountType,
        fee_ratio: u32,
    ) -> U256 {
        match acc_type {
            AccountType::FiatSubscription => U256::ZERO,
            // the subscription price is checked separately at request time
            AccountType::KlaySubscription => self.gas_cost(callback_gas_limit),
            AccountType::KlayDiscount => {
                let service = self.config.fee_config.service_fee(req_count)
                    * U256::from(num_submission)
                    * U256::from(fee_ratio)
                    / U256::from(RATIO_DENOMINATOR);
                service + self.gas_cost(callback_gas_limit)
            }
            AccountType::KlayRegular | AccountType::Temporary => {
                self.estimate_fee(req_count, num_submission, callback_gas_limit)
            }
        }
    }

    // Request path /////////////////////////////////////////////////////////

    /// Validations shared by every prepaid request; returns nothing but
    /// guarantees the subsequent nonce bump and commitment insert cannot
    /// fail for account-related reasons.
    pub(crate) fn validate_request(
        &self,
        ledger: &Ledger,
        ctx: &BlockContext,
        sender: Address,
        acc_id: AccId,
        callback_gas_limit: u64,
        num_submission: u32,
    ) -> Result<(), CoordinatorError> {
        if callback_gas_limit > self.config.max_gas_limit {
            return Err(CoordinatorError::GasLimitTooBig {
                requested: callback_gas_limit,
                max: self.config.max_gas_limit,
            });
        }
        if !ledger.is_consumer(acc_id, sender)? {
            return Err(CoordinatorError::InvalidConsumer);
        }
        let account = ledger.get_account(acc_id)?;
        let fee = self.estimate_fee_by_acc(
            account.req_count(),
            num_submission,
            callback_gas_limit,
            account.acc_type(),
            account.fee_ratio(),
        );
        if !ledger.can_cover_fee(acc_id, fee, ctx)? {
            return Err(CoordinatorError::InsufficientPayment {
                needed: fee,
                available: account.balance(),
            });
        }
        Ok(())
    }

    /// Set up the temporary account for a direct-payment request. Returns
    /// the account id and the excess to refund to the caller.
    pub(crate) fn begin_direct_request(
        &mut self,
        ledger: &mut Ledger,
        sender: Address,
        value: U256,
        callback_gas_limit: u64,
        num_submission: u32,
    ) -> Result<(AccId, U256), CoordinatorError> {
        if callback_gas_limit > self.config.max_gas_limit {
            return Err(CoordinatorError::GasLimitTooBig {
                requested: callback_gas_limit,
                max: self.config.max_gas_limit,
            });
        }
        let fee = self.estimate_fee(0, num_submission, callback_gas_limit);
        if value < fee {
            return Err(CoordinatorError::InsufficientPayment { needed: fee, available: value });
        }
        let acc_id = ledger.create_temporary_account(self.address, sender)?;
        ledger.deposit_temporary(self.address, acc_id, fee)?;
        Ok((acc_id, value - fee))
    }

    pub(crate) fn insert_commitment(
        &mut self,
        request_id: RequestId,
        commitment: RequestCommitment,
    ) {
        self.commitments.insert(request_id, commitment);
    }

    // Fulfillment path /////////////////////////////////////////////////////

    /// Check the caller-supplied commitment against the stored one without
    /// consuming it.
    pub(crate) fn verify_commitment(
        &self,
        request_id: RequestId,
        supplied: &RequestCommitment,
    ) -> Result<(), CoordinatorError> {
        let stored = self
            .commitments
            .get(&request_id)
            .ok_or(CoordinatorError::NoCorrespondingRequest)?;
        if stored != supplied {
            return Err(CoordinatorError::IncorrectCommitment);
        }
        Ok(())
    }

    /// Verify and delete the stored commitment. The delete happens exactly
    /// once: a second fulfillment attempt finds no commitment.
    pub(crate) fn consume_commitment(
        &mut self,
        request_id: RequestId,
        supplied: &RequestCommitment,
    ) -> Result<RequestCommitment, CoordinatorError> {
        self.verify_commitment(request_id, supplied)?;
        self.commitments
            .remove(&request_id)
            .ok_or(CoordinatorError::NoCorrespondingRequest)
    }

    pub(crate) fn get_commitment(&self, request_id: RequestId) -> Option<&RequestCommitment> {
        self.commitments.get(&request_id)
    }

    pub(crate) fn has_pending_request(&self, acc_id: AccId) -> bool {
        self.commitments.values().any(|commitment| commitment.acc_id == acc_id)
    }

    /// Delete the commitment at the original requester's demand.
    pub(crate) fn cancel_request(
        &mut self,
        sender: Address,
        request_id: RequestId,
    ) -> Result<RequestCommitment, CoordinatorError> {
        let stored = self
            .commitments
            .get(&request_id)
            .ok_or(CoordinatorError::NoCorrespondingRequest)?;
        if stored.sender != sender {
            return Err(CoordinatorError::NotRequestOwner);
        }
        let stored = self
            .commitments
            .remove(&request_id)
            .ok_or(CoordinatorError::NoCorrespondingRequest)?;
        self.events.push(CoordinatorEvent::RequestCanceled { request_id });
        tracing::debug!("Request {request_id} canceled by {sender}");
        Ok(stored)
    }

    // Settlement ///////////////////////////////////////////////////////////

    /// Settle the fee for a consumed commitment. `primary` is the oracle
    /// completing the request (its share rides through the burn/protocol
    /// split); `extras` are earlier submitters paid a direct operator fee.
    /// Returns the total payment drawn from the account.
    pub(crate) fn settle_fee(
        &self,
        ledger: &mut Ledger,
        ctx: &BlockContext,
        commitment: &RequestCommitment,
        primary: Address,
        extras: &[Address],
    ) -> Result<U256, CoordinatorError> {
        let acc_id = commitment.acc_id;

        if commitment.is_direct_payment {
            let settlement = ledger.charge_fee_temporary(self.address, acc_id, primary)?;
            return Ok(settlement.total);
        }

        let gas_fee = self.gas_cost(commitment.callback_gas_limit);
        let (acc_type, req_count, fee_ratio, balance) = {
            let account = ledger.get_account(acc_id)?;
            (account.acc_type(), account.req_count(), account.fee_ratio(), account.balance())
        };

        match acc_type {
            AccountType::FiatSubscription => {
                ledger.increase_sub_req_count(self.address, acc_id, ctx)?;
                Ok(U256::ZERO)
            }
            AccountType::KlaySubscription => {
                let (paid, price, elapsed) = {
                    let account = ledger.get_account(acc_id)?;
                    (
                        account.subscription_paid(),
                        account.subscription_price(),
                        account.periods_elapsed(ctx.timestamp),
                    )
                };
                // the price falls due again once the window rolls
                let mut payment = gas_fee;
                if !paid || elapsed > 0 {
                    payment += price;
                }
                if balance < payment {
                    return Err(LedgerError::InsufficientBalance {
                        needed: payment,
                        available: balance,
                    }
                    .into());
                }
                ledger.increase_sub_req_count(self.address, acc_id, ctx)?;
                if !ledger.subscription_paid(acc_id)? {
                    ledger.set_subscription_paid(self.address, acc_id)?;
                }
                ledger.charge_fee(self.address, acc_id, payment, primary)?;
                Ok(payment)
            }
            _ => {
                let mut service = self.config.fee_config.service_fee(req_count);
                if acc_type == AccountType::KlayDiscount {
                    service = service * U256::from(fee_ratio) / U256::from(RATIO_DENOMINATOR);
                }
                let total = service * U256::from(1 + extras.len() as u64) + gas_fee;
                // all charges below must land or none; check the whole amount first
                if balance < total {
                    return Err(LedgerError::InsufficientBalance {
                        needed: total,
                        available: balance,
                    }
                    .into());
                }
                ledger.charge_fee(self.address, acc_id, service + gas_fee, primary)?;
                for oracle in extras {
                    ledger.charge_operator_fee(self.address, acc_id, service, *oracle)?;
                }
                Ok(total)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const COORD: Address = address!("00000000000000000000000000000000000000cc");
    const SENDER: Address = address!("0000000000000000000000000000000000000011");

    #[test]
    fn request_ids_are_deterministic_and_collision_free() {
        let id = compute_request_id(SENDER, 1, 2);
        assert_eq!(id, compute_request_id(SENDER, 1, 2));
        assert_ne!(id, compute_request_id(SENDER, 1, 3));
        assert_ne!(id, compute_request_id(SENDER, 2, 2));
        assert_ne!(id, compute_request_id(COORD, 1, 2));
    }

    #[test]
    fn oracle_registry_enforces_bounds() {
        let mut base = CoordinatorBase::new(COORD);
        base.insert_oracle(SENDER).unwrap();
        assert_eq!(
            base.insert_oracle(SENDER),
            Err(CoordinatorError::OracleAlreadyRegistered(SENDER))
        );

        for i in 1..MAX_ORACLES {
            let oracle = Address::from_word(keccak256(i.to_be_bytes()));
            base.insert_oracle(oracle).unwrap();
        }
        let one_too_many = Address::from_word(keccak256(b"one too many"));
        assert_eq!(base.insert_oracle(one_too_many), Err(CoordinatorError::TooManyOracles));

        base.remove_oracle(SENDER).unwrap();
        assert_eq!(base.remove_oracle(SENDER), Err(CoordinatorError::NoSuchOracle(SENDER)));
    }

    #[test]
    fn fee_estimates_respect_account_type() {
        let mut base = CoordinatorBase::new(COORD);
        base.config.fee_config = FeeConfig::flat(U256::from(100u64));
        base.gas_price = U256::from(1u64);

        let regular = base.estimate_fee_by_acc(0, 2, 500, AccountType::KlayRegular, 0);
        assert_eq!(regular, U256::from(700u64));

        let discount = base.estimate_fee_by_acc(0, 2, 500, AccountType::KlayDiscount, 8_000);
        assert_eq!(discount, U256::from(660u64));

        assert_eq!(
            base.estimate_fee_by_acc(0, 2, 500, AccountType::FiatSubscription, 0),
            U256::ZERO
        );
        assert_eq!(
            base.estimate_fee_by_acc(0, 2, 500, AccountType::KlaySubscription, 0),
            U256::from(500u64)
        );
    }
}
