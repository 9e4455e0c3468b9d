// Copyright (c) 2025 Skylark Labs, Inc.
//
// All rights reserved.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};

use crate::types::{AccId, AccountType};

/// Ratio denominator for per-account fee ratios (basis points).
pub const RATIO_DENOMINATOR: u32 = 10_000;

/// One prepayment account: balance, authorized consumers, per-consumer
/// nonces, and the billing-mode fields for its [`AccountType`].
#[derive(Clone, Debug)]
pub struct Account {
    pub(crate) acc_id: AccId,
    pub(crate) owner: Address,
    pub(crate) requested_owner: Option<Address>,
    pub(crate) balance: U256,
    pub(crate) consumers: Vec<Address>,
    pub(crate) nonces: HashMap<Address, u64>,
    pub(crate) req_count: u64,
    pub(crate) acc_type: AccountType,
    /// Basis points of the service fee this account pays; only consulted for
    /// discount accounts.
    pub(crate) fee_ratio: u32,
    pub(crate) start_time: u64,
    pub(crate) period: u64,
    pub(crate) req_period_count: u64,
    pub(crate) subscription_price: U256,
    pub(crate) subscription_paid: bool,
    pub(crate) period_req_count: u64,
}

impl Account {
    fn empty(acc_id: AccId, owner: Address, acc_type: AccountType) -> Self {
        Self {
            acc_id,
            owner,
            requested_owner: None,
            balance: U256::ZERO,
            consumers: Vec::new(),
            nonces: HashMap::new(),
            req_count: 0,
            acc_type,
            fee_ratio: 0,
            start_time: 0,
            period: 0,
            req_period_count: 0,
            subscription_price: U256::ZERO,
            subscription_paid: false,
            period_req_count: 0,
        }
    }

    pub(crate) fn new_regular(acc_id: AccId, owner: Address) -> Self {
        Self::empty(acc_id, owner, AccountType::KlayRegular)
    }

    pub(crate) fn new_temporary(acc_id: AccId, owner: Address) -> Self {
        Self::empty(acc_id, owner, AccountType::Temporary)
    }

    pub(crate) fn new_fiat_subscription(
        acc_id: AccId,
        owner: Address,
        start_time: u64,
        period: u64,
        req_period_count: u64,
    ) -> Self {
        let mut account = Self::empty(acc_id, owner, AccountType::FiatSubscription);
        account.start_time = start_time;
        account.period = period;
        account.req_period_count = req_period_count;
        account
    }

    pub(crate) fn new_klay_subscription(
        acc_id: AccId,
        owner: Address,
        start_time: u64,
        period: u64,
        req_period_count: u64,
        subscription_price: U256,
    ) -> Self {
        let mut account = Self::empty(acc_id, owner, AccountType::KlaySubscription);
        account.start_time = start_time;
        account.period = period;
        account.req_period_count = req_period_count;
        account.subscription_price = subscription_price;
        account
    }

    pub(crate) fn new_klay_discount(acc_id: AccId, owner: Address, fee_ratio: u32) -> Self {
        let mut account = Self::empty(acc_id, owner, AccountType::KlayDiscount);
        account.fee_ratio = fee_ratio;
        account
    }

    pub fn acc_id(&self) -> AccId {
        self.acc_id
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn requested_owner(&self) -> Option<Address> {
        self.requested_owner
    }

    pub fn balance(&self) -> U256 {
        self.balance
    }

    pub fn consumers(&self) -> &[Address] {
        &self.consumers
    }

    pub fn req_count(&self) -> u64 {
        self.req_count
    }

    pub fn acc_type(&self) -> AccountType {
        self.acc_type
    }

    pub fn fee_ratio(&self) -> u32 {
        self.fee_ratio
    }

    pub fn subscription_price(&self) -> U256 {
        self.subscription_price
    }

    pub fn subscription_paid(&self) -> bool {
        self.subscription_paid
    }

    pub fn period_req_count(&self) -> u64 {
        self.period_req_count
    }

    pub fn has_consumer(&self, consumer: Address) -> bool {
        self.consumers.contains(&consumer)
    }

    pub fn nonce(&self, consumer: Address) -> u64 {
        self.nonces.get(&consumer).copied().unwrap_or(0)
    }

    /// Number of whole periods elapsed since `start_time` at `timestamp`.
    pub(crate) fn periods_elapsed(&self, timestamp: u64) -> u64 {
        if self.period == 0 || timestamp <= self.start_time {
            return 0;
        }
        (timestamp - self.start_time) / self.period
    }

    /// Whether another request fits in the quota of the period containing
    /// `timestamp`, without mutating the window.
    pub(crate) fn quota_available(&self, timestamp: u64) -> bool {
        if self.periods_elapsed(timestamp) > 0 {
            // the window rolls on settlement, opening a fresh quota
            return self.req_period_count > 0;
        }
        self.period_req_count < self.req_period_count
    }
}
