// Copyright (c) 2025 Skylark Labs, Inc.
//
// All rights reserved.

//! Prepayment ledger: account lifecycle, funding, consumer authorization and
//! fee settlement.
//!
//! The ledger is the payment solution shared by all coordinators. Every
//! operation is a complete transaction: it validates against current state
//! and either applies fully (appending its events) or returns a typed error
//! having mutated nothing.

mod account;

use std::collections::{BTreeMap, HashMap};

use alloy_primitives::{Address, U256};
use thiserror::Error;

pub use account::{Account, RATIO_DENOMINATOR};

use crate::{
    events::{EventLog, LedgerEvent},
    types::{AccId, AccountType, AdminCap, BlockContext, Settlement},
};

/// Upper bound on authorized consumers per account.
pub const MAX_CONSUMERS: usize = 100;

/// Default share of every charged fee that is burned, in percent.
pub const DEFAULT_BURN_FEE_RATIO: u8 = 50;

/// Default share of every charged fee paid to the protocol, in percent.
pub const DEFAULT_PROTOCOL_FEE_RATIO: u8 = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("caller does not hold the ledger admin capability")]
    OnlyOwner,

    #[error("account {0} does not exist")]
    InvalidAccount(AccId),

    #[error("caller must be the account owner")]
    MustBeAccountOwner,

    #[error("caller must be the requested owner")]
    MustBeRequestedOwner,

    #[error("caller is not a registered coordinator")]
    InvalidCoordinator,

    #[error("coordinator is already registered")]
    CoordinatorExists,

    #[error("consumer {0} is not authorized for the account")]
    InvalidConsumer(Address),

    #[error("account already has the maximum number of consumers")]
    TooManyConsumers,

    #[error("insufficient balance: needed {needed}, available {available}")]
    InsufficientBalance { needed: U256, available: U256 },

    #[error("a pending request exists for account {0}")]
    PendingRequestExists(AccId),

    #[error("combined fee ratios may not reach 100%")]
    TooHighFeeRatio,

    #[error("ratio out of bounds")]
    RatioOutOfBounds,

    #[error("account {0} is not a subscription account")]
    NotSubscriptionAccount(AccId),

    #[error("account {0} is not a temporary account")]
    NotTemporaryAccount(AccId),

    #[error("subscription request quota exhausted for the current period")]
    PeriodRequestCountExceeded,
}

/// Read-only probe into a coordinator's live commitments, used to guard
/// withdrawals and account cancellation while requests are outstanding.
pub trait RequestProbe {
    fn has_pending_request(&self, acc_id: AccId) -> bool;
}

/// The prepayment ledger.
pub struct Ledger {
    address: Address,
    accounts: BTreeMap<AccId, Account>,
    next_acc_id: AccId,
    coordinators: Vec<Address>,
    burn_fee_ratio: u8,
    protocol_fee_ratio: u8,
    protocol_fee_recipient: Address,
    operator_balances: HashMap<Address, U256>,
    events: EventLog<LedgerEvent>,
}

impl Ledger {
    /// Create a ledger at `address`; the returned [`AdminCap`] is the only
    /// handle to its administrative surface.
    pub fn new(address: Address, protocol_fee_recipient: Address) -> (Self, AdminCap) {
        let ledger = Self {
            address,
            accounts: BTreeMap::new(),
            next_acc_id: 0,
            coordinators: Vec::new(),
            burn_fee_ratio: DEFAULT_BURN_FEE_RATIO,
            protocol_fee_ratio: DEFAULT_PROTOCOL_FEE_RATIO,
            protocol_fee_recipient,
            operator_balances: HashMap::new(),
            events: EventLog::default(),
        };
        (ledger, AdminCap::new(address))
    }

    pub fn type_and_version() -> &'static str {
        "Ledger v0.1"
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn events(&self) -> &EventLog<LedgerEvent> {
        &self.events
    }

    fn check_admin(&self, admin: &AdminCap) -> Result<(), LedgerError> {
        if admin.component() != self.address {
            return Err(LedgerError::OnlyOwner);
        }
        Ok(())
    }

    fn check_coordinator(&self, caller: Address) -> Result<(), LedgerError> {
        if !self.coordinators.contains(&caller) {
            return Err(LedgerError::InvalidCoordinator);
        }
        Ok(())
    }

    fn account(&self, acc_id: AccId) -> Result<&Account, LedgerError> {
        self.accounts.get(&acc_id).ok_or(LedgerError::InvalidAccount(acc_id))
    }

    fn account_mut(&mut self, acc_id: AccId) -> Result<&mut Account, LedgerError> {
        self.accounts.get_mut(&acc_id).ok_or(LedgerError::InvalidAccount(acc_id))
    }

    fn owned_account(&self, sender: Address, acc_id: AccId) -> Result<&Account, LedgerError> {
        let account = self.account(acc_id)?;
        if account.owner != sender {
            return Err(LedgerError::MustBeAccountOwner);
        }
        Ok(account)
    }

    fn next_id(&mut self) -> AccId {
        self.next_acc_id += 1;
        self.next_acc_id
    }

    fn assert_no_pending(
        &self,
        acc_id: AccId,
        coordinators: &[&dyn RequestProbe],
    ) -> Result<(), LedgerError> {
        if coordinators.iter().any(|probe| probe.has_pending_request(acc_id)) {
            return Err(LedgerError::PendingRequestExists(acc_id));
        }
        Ok(())
    }

    // Account lifecycle ////////////////////////////////////////////////////

    /// Open a fresh regular account owned by `owner`. Every call creates a
    /// distinct account.
    pub fn create_account(&mut self, owner: Address) -> AccId {
        let acc_id = self.next_id();
        self.accounts.insert(acc_id, Account::new_regular(acc_id, owner));
        self.events.push(LedgerEvent::AccountCreated {
            acc_id,
            owner,
            acc_type: AccountType::KlayRegular,
        });
        tracing::info!("Created account {acc_id} for owner {owner}");
        acc_id
    }

    pub fn create_fiat_subscription_account(
        &mut self,
        admin: &AdminCap,
        start_time: u64,
        period: u64,
        req_period_count: u64,
        owner: Address,
    ) -> Result<AccId, LedgerError> {
        self.check_admin(admin)?;
        let acc_id = self.next_id();
        self.accounts.insert(
            acc_id,
            Account::new_fiat_subscription(acc_id, owner, start_time, period, req_period_count),
        );
        self.events.push(LedgerEvent::AccountCreated {
            acc_id,
            owner,
            acc_type: AccountType::FiatSubscription,
        });
        Ok(acc_id)
    }

    pub fn create_klay_subscription_account(
        &mut self,
        admin: &AdminCap,
        start_time: u64,
        period: u64,
        req_period_count: u64,
        subscription_price: U256,
        owner: Address,
    ) -> Result<AccId, LedgerError> {
        self.check_admin(admin)?;
        let acc_id = self.next_id();
        self.accounts.insert(
            acc_id,
            Account::new_klay_subscription(
                acc_id,
                owner,
                start_time,
                period,
                req_period_count,
                subscription_price,
            ),
        );
        self.events.push(LedgerEvent::AccountCreated {
            acc_id,
            owner,
            acc_type: AccountType::KlaySubscription,
        });
        Ok(acc_id)
    }

    pub fn create_klay_discount_account(
        &mut self,
        admin: &AdminCap,
        fee_ratio: u32,
        owner: Address,
    ) -> Result<AccId, LedgerError> {
        self.check_admin(admin)?;
        if fee_ratio > RATIO_DENOMINATOR {
            return Err(LedgerError::RatioOutOfBounds);
        }
        let acc_id = self.next_id();
        self.accounts.insert(acc_id, Account::new_klay_discount(acc_id, owner, fee_ratio));
        self.events.push(LedgerEvent::AccountCreated {
            acc_id,
            owner,
            acc_type: AccountType::KlayDiscount,
        });
        Ok(acc_id)
    }

    /// Close an account, paying its remaining balance to `to`. Fails while
    /// any coordinator still holds a commitment against the account.
    pub fn cancel_account(
        &mut self,
        sender: Address,
        acc_id: AccId,
        to: Address,
        coordinators: &[&dyn RequestProbe],
    ) -> Result<U256, LedgerError> {
        self.owned_account(sender, acc_id)?;
        self.assert_no_pending(acc_id, coordinators)?;
        // validated above
        let account = self.accounts.remove(&acc_id).ok_or(LedgerError::InvalidAccount(acc_id))?;
        let balance = account.balance;
        self.events.push(LedgerEvent::AccountCanceled { acc_id, to, balance });
        tracing::info!("Canceled account {acc_id}, refunded {balance} to {to}");
        Ok(balance)
    }

    // Funding //////////////////////////////////////////////////////////////

    pub fn deposit(
        &mut self,
        sender: Address,
        acc_id: AccId,
        amount: U256,
    ) -> Result<(), LedgerError> {
        self.owned_account(sender, acc_id)?;
        let account = self.account_mut(acc_id)?;
        let old_balance = account.balance;
        account.balance += amount;
        let new_balance = account.balance;
        self.events.push(LedgerEvent::AccountBalanceIncreased { acc_id, old_balance, new_balance });
        tracing::debug!("Deposit of {amount} to account {acc_id}, balance {new_balance}");
        Ok(())
    }

    pub fn withdraw(
        &mut self,
        sender: Address,
        acc_id: AccId,
        amount: U256,
        coordinators: &[&dyn RequestProbe],
    ) -> Result<(), LedgerError> {
        let account = self.owned_account(sender, acc_id)?;
        if account.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available: account.balance,
            });
        }
        self.assert_no_pending(acc_id, coordinators)?;

        let account = self.account_mut(acc_id)?;
        let old_balance = account.balance;
        account.balance -= amount;
        let new_balance = account.balance;
        self.events.push(LedgerEvent::AccountBalanceDecreased { acc_id, old_balance, new_balance });
        tracing::debug!("Withdrawal of {amount} from account {acc_id}, balance {new_balance}");
        Ok(())
    }

    /// Refund and delete a temporary account once its request was canceled.
    pub fn withdraw_temporary(
        &mut self,
        sender: Address,
        acc_id: AccId,
        coordinators: &[&dyn RequestProbe],
    ) -> Result<U256, LedgerError> {
        let account = self.owned_account(sender, acc_id)?;
        if account.acc_type != AccountType::Temporary {
            return Err(LedgerError::NotTemporaryAccount(acc_id));
        }
        self.assert_no_pending(acc_id, coordinators)?;

        // validated above
        let account = self.accounts.remove(&acc_id).ok_or(LedgerError::InvalidAccount(acc_id))?;
        let old_balance = account.balance;
        self.events.push(LedgerEvent::AccountBalanceDecreased {
            acc_id,
            old_balance,
            new_balance: U256::ZERO,
        });
        Ok(old_balance)
    }

    // Consumer management //////////////////////////////////////////////////

    /// Authorize `consumer` for the account. A no-op (no event) when already
    /// authorized; seeds the consumer nonce at 1.
    pub fn add_consumer(
        &mut self,
        sender: Address,
        acc_id: AccId,
        consumer: Address,
    ) -> Result<(), LedgerError> {
        let account = self.owned_account(sender, acc_id)?;
        if account.has_consumer(consumer) {
            return Ok(());
        }
        if account.consumers.len() >= MAX_CONSUMERS {
            return Err(LedgerError::TooManyConsumers);
        }
        let account = self.account_mut(acc_id)?;
        account.consumers.push(consumer);
        account.nonces.insert(consumer, 1);
        self.events.push(LedgerEvent::AccountConsumerAdded { acc_id, consumer });
        Ok(())
    }

    pub fn remove_consumer(
        &mut self,
        sender: Address,
        acc_id: AccId,
        consumer: Address,
    ) -> Result<(), LedgerError> {
        let account = self.owned_account(sender, acc_id)?;
        if !account.has_consumer(consumer) {
            return Err(LedgerError::InvalidConsumer(consumer));
        }
        let account = self.account_mut(acc_id)?;
        account.consumers.retain(|c| *c != consumer);
        self.events.push(LedgerEvent::AccountConsumerRemoved { acc_id, consumer });
        Ok(())
    }

    // Ownership transfer ///////////////////////////////////////////////////

    pub fn request_account_owner_transfer(
        &mut self,
        sender: Address,
        acc_id: AccId,
        to: Address,
    ) -> Result<(), LedgerError> {
        self.owned_account(sender, acc_id)?;
        let account = self.account_mut(acc_id)?;
        account.requested_owner = Some(to);
        self.events.push(LedgerEvent::AccountOwnerTransferRequested { acc_id, from: sender, to });
        Ok(())
    }

    pub fn accept_account_owner_transfer(
        &mut self,
        sender: Address,
        acc_id: AccId,
    ) -> Result<(), LedgerError> {
        let account = self.account(acc_id)?;
        if account.requested_owner != Some(sender) {
            return Err(LedgerError::MustBeRequestedOwner);
        }
        let account = self.account_mut(acc_id)?;
        let from = account.owner;
        account.owner = sender;
        account.requested_owner = None;
        self.events.push(LedgerEvent::AccountOwnerTransferred { acc_id, from, to: sender });
        Ok(())
    }

    // Administrative surface ///////////////////////////////////////////////

    pub fn add_coordinator(
        &mut self,
        admin: &AdminCap,
        coordinator: Address,
    ) -> Result<(), LedgerError> {
        self.check_admin(admin)?;
        if self.coordinators.contains(&coordinator) {
            return Err(LedgerError::CoordinatorExists);
        }
        self.coordinators.push(coordinator);
        self.events.push(LedgerEvent::CoordinatorAdded { coordinator });
        Ok(())
    }

    pub fn remove_coordinator(
        &mut self,
        admin: &AdminCap,
        coordinator: Address,
    ) -> Result<(), LedgerError> {
        self.check_admin(admin)?;
        if !self.coordinators.contains(&coordinator) {
            return Err(LedgerError::InvalidCoordinator);
        }
        self.coordinators.retain(|c| *c != coordinator);
        self.events.push(LedgerEvent::CoordinatorRemoved { coordinator });
        Ok(())
    }

    pub fn coordinators(&self) -> &[Address] {
        &self.coordinators
    }

    pub fn set_burn_fee_ratio(&mut self, admin: &AdminCap, ratio: u8) -> Result<(), LedgerError> {
        self.check_admin(admin)?;
        if ratio > 100 {
            return Err(LedgerError::RatioOutOfBounds);
        }
        if ratio + self.protocol_fee_ratio >= 100 {
            return Err(LedgerError::TooHighFeeRatio);
        }
        self.burn_fee_ratio = ratio;
        Ok(())
    }

    pub fn set_protocol_fee_ratio(
        &mut self,
        admin: &AdminCap,
        ratio: u8,
    ) -> Result<(), LedgerError> {
        self.check_admin(admin)?;
        if ratio > 100 {
            return Err(LedgerError::RatioOutOfBounds);
        }
        if ratio + self.burn_fee_ratio >= 100 {
            return Err(LedgerError::TooHighFeeRatio);
        }
        self.protocol_fee_ratio = ratio;
        Ok(())
    }

    pub fn set_protocol_fee_recipient(
        &mut self,
        admin: &AdminCap,
        recipient: Address,
    ) -> Result<(), LedgerError> {
        self.check_admin(admin)?;
        self.protocol_fee_recipient = recipient;
        Ok(())
    }

    pub fn burn_fee_ratio(&self) -> u8 {
        self.burn_fee_ratio
    }

    pub fn protocol_fee_ratio(&self) -> u8 {
        self.protocol_fee_ratio
    }

    pub fn protocol_fee_recipient(&self) -> Address {
        self.protocol_fee_recipient
    }

    /// Set the fee ratio (basis points of the service fee paid) on a
    /// discount account.
    pub fn set_fee_ratio(
        &mut self,
        admin: &AdminCap,
        acc_id: AccId,
        fee_ratio: u32,
    ) -> Result<(), LedgerError> {
        self.check_admin(admin)?;
        if fee_ratio > RATIO_DENOMINATOR {
            return Err(LedgerError::RatioOutOfBounds);
        }
        self.account_mut(acc_id)?.fee_ratio = fee_ratio;
        Ok(())
    }

    pub fn update_account_detail(
        &mut self,
        admin: &AdminCap,
        acc_id: AccId,
        start_time: u64,
        period: u64,
        req_period_count: u64,
        subscription_price: U256,
    ) -> Result<(), LedgerError> {
        self.check_admin(admin)?;
        let account = self.account_mut(acc_id)?;
        if !account.acc_type.is_subscription() {
            return Err(LedgerError::NotSubscriptionAccount(acc_id));
        }
        account.start_time = start_time;
        account.period = period;
        account.req_period_count = req_period_count;
        account.subscription_price = subscription_price;
        Ok(())
    }

    // Coordinator surface //////////////////////////////////////////////////

    /// Bump and return the request nonce for `(acc_id, consumer)`. The first
    /// request of an authorized consumer observes nonce 2; nonce 1 marks the
    /// authorization itself.
    pub fn increase_nonce(
        &mut self,
        coordinator: Address,
        acc_id: AccId,
        consumer: Address,
    ) -> Result<u64, LedgerError> {
        self.check_coordinator(coordinator)?;
        let account = self.account(acc_id)?;
        if !account.has_consumer(consumer) {
            return Err(LedgerError::InvalidConsumer(consumer));
        }
        let account = self.account_mut(acc_id)?;
        let nonce = account.nonce(consumer) + 1;
        account.nonces.insert(consumer, nonce);
        Ok(nonce)
    }

    /// Open a single-use account backing one direct-payment request.
    pub fn create_temporary_account(
        &mut self,
        coordinator: Address,
        owner: Address,
    ) -> Result<AccId, LedgerError> {
        self.check_coordinator(coordinator)?;
        let acc_id = self.next_id();
        self.accounts.insert(acc_id, Account::new_temporary(acc_id, owner));
        self.events.push(LedgerEvent::TemporaryAccountCreated { acc_id, owner });
        Ok(acc_id)
    }

    /// Fund a temporary account with the fee attached to a direct-payment
    /// request.
    pub fn deposit_temporary(
        &mut self,
        coordinator: Address,
        acc_id: AccId,
        amount: U256,
    ) -> Result<(), LedgerError> {
        self.check_coordinator(coordinator)?;
        let account = self.account_mut(acc_id)?;
        if account.acc_type != AccountType::Temporary {
            return Err(LedgerError::NotTemporaryAccount(acc_id));
        }
        let old_balance = account.balance;
        account.balance += amount;
        let new_balance = account.balance;
        self.events.push(LedgerEvent::AccountBalanceIncreased { acc_id, old_balance, new_balance });
        Ok(())
    }

    /// Debit `fee` from the account, split it between burn, protocol and the
    /// fulfilling operator, and count the fulfilled request.
    pub fn charge_fee(
        &mut self,
        coordinator: Address,
        acc_id: AccId,
        fee: U256,
        operator: Address,
    ) -> Result<Settlement, LedgerError> {
        self.check_coordinator(coordinator)?;
        let account = self.account(acc_id)?;
        if account.balance < fee {
            return Err(LedgerError::InsufficientBalance { needed: fee, available: account.balance });
        }

        let burned = fee * U256::from(self.burn_fee_ratio) / U256::from(100u8);
        let protocol = fee * U256::from(self.protocol_fee_ratio) / U256::from(100u8);
        let operator_share = fee - burned - protocol;
        let recipient = self.protocol_fee_recipient;

        let account = self.account_mut(acc_id)?;
        let old_balance = account.balance;
        account.balance -= fee;
        let new_balance = account.balance;
        // subscription accounts count fulfillments through the period quota
        if !account.acc_type.is_subscription() {
            account.req_count += 1;
        }

        *self.operator_balances.entry(operator).or_default() += operator_share;
        *self.operator_balances.entry(recipient).or_default() += protocol;

        self.events.push(LedgerEvent::AccountBalanceDecreased { acc_id, old_balance, new_balance });
        self.events.push(LedgerEvent::BurnedFee { acc_id, amount: burned });
        self.events.push(LedgerEvent::ProtocolFeePaid { acc_id, recipient, amount: protocol });
        tracing::debug!(
            "Charged {fee} to account {acc_id}: burned {burned}, protocol {protocol}, operator {operator_share}"
        );
        Ok(Settlement { total: fee, burned, protocol, operator: operator_share })
    }

    /// Drain and delete a temporary account, splitting its whole balance the
    /// same way [`Ledger::charge_fee`] does.
    pub fn charge_fee_temporary(
        &mut self,
        coordinator: Address,
        acc_id: AccId,
        operator: Address,
    ) -> Result<Settlement, LedgerError> {
        self.check_coordinator(coordinator)?;
        let account = self.account(acc_id)?;
        if account.acc_type != AccountType::Temporary {
            return Err(LedgerError::NotTemporaryAccount(acc_id));
        }
        let fee = account.balance;

        let burned = fee * U256::from(self.burn_fee_ratio) / U256::from(100u8);
        let protocol = fee * U256::from(self.protocol_fee_ratio) / U256::from(100u8);
        let operator_share = fee - burned - protocol;
        let recipient = self.protocol_fee_recipient;

        self.accounts.remove(&acc_id);
        *self.operator_balances.entry(operator).or_default() += operator_share;
        *self.operator_balances.entry(recipient).or_default() += protocol;

        self.events.push(LedgerEvent::AccountBalanceDecreased {
            acc_id,
            old_balance: fee,
            new_balance: U256::ZERO,
        });
        self.events.push(LedgerEvent::BurnedFee { acc_id, amount: burned });
        Ok(Settlement { total: fee, burned, protocol, operator: operator_share })
    }

    /// Debit `amount` and credit it entirely to one operator, without the
    /// burn/protocol split. Used for per-submission oracle payout.
    pub fn charge_operator_fee(
        &mut self,
        coordinator: Address,
        acc_id: AccId,
        amount: U256,
        operator: Address,
    ) -> Result<(), LedgerError> {
        self.check_coordinator(coordinator)?;
        let account = self.account(acc_id)?;
        if account.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available: account.balance,
            });
        }
        let account = self.account_mut(acc_id)?;
        let old_balance = account.balance;
        account.balance -= amount;
        let new_balance = account.balance;
        *self.operator_balances.entry(operator).or_default() += amount;
        self.events.push(LedgerEvent::AccountBalanceDecreased { acc_id, old_balance, new_balance });
        self.events.push(LedgerEvent::OperatorFeePaid { acc_id, operator, amount });
        Ok(())
    }

    /// Count a fulfilled request against a subscription account's period
    /// quota, rolling the period window forward when it has elapsed.
    pub fn increase_sub_req_count(
        &mut self,
        coordinator: Address,
        acc_id: AccId,
        ctx: &BlockContext,
    ) -> Result<(), LedgerError> {
        self.check_coordinator(coordinator)?;
        let account = self.account(acc_id)?;
        if !account.acc_type.is_subscription() {
            return Err(LedgerError::NotSubscriptionAccount(acc_id));
        }
        if !account.quota_available(ctx.timestamp) {
            return Err(LedgerError::PeriodRequestCountExceeded);
        }

        let account = self.account_mut(acc_id)?;
        let elapsed = account.periods_elapsed(ctx.timestamp);
        if elapsed > 0 {
            account.start_time += elapsed * account.period;
            account.period_req_count = 0;
            account.subscription_paid = false;
        }
        account.period_req_count += 1;
        account.req_count += 1;
        let period_req_count = account.period_req_count;
        self.events.push(LedgerEvent::AccountPeriodReqIncreased { acc_id, period_req_count });
        Ok(())
    }

    /// Mark the current period's subscription price as paid.
    pub fn set_subscription_paid(
        &mut self,
        coordinator: Address,
        acc_id: AccId,
    ) -> Result<(), LedgerError> {
        self.check_coordinator(coordinator)?;
        let account = self.account_mut(acc_id)?;
        if account.acc_type != AccountType::KlaySubscription {
            return Err(LedgerError::NotSubscriptionAccount(acc_id));
        }
        account.subscription_paid = true;
        self.events.push(LedgerEvent::AccountSubscriptionPaidSet { acc_id });
        Ok(())
    }

    // Operator balances ////////////////////////////////////////////////////

    pub fn operator_balance(&self, operator: Address) -> U256 {
        self.operator_balances.get(&operator).copied().unwrap_or(U256::ZERO)
    }

    pub fn withdraw_operator_fee(
        &mut self,
        operator: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        let available = self.operator_balance(operator);
        if available < amount {
            return Err(LedgerError::InsufficientBalance { needed: amount, available });
        }
        self.operator_balances.insert(operator, available - amount);
        Ok(())
    }

    // Read surface /////////////////////////////////////////////////////////

    pub fn get_account(&self, acc_id: AccId) -> Result<&Account, LedgerError> {
        self.account(acc_id)
    }

    pub fn balance_of(&self, acc_id: AccId) -> Result<U256, LedgerError> {
        Ok(self.account(acc_id)?.balance())
    }

    pub fn req_count_of(&self, acc_id: AccId) -> Result<u64, LedgerError> {
        Ok(self.account(acc_id)?.req_count())
    }

    pub fn nonce_of(&self, acc_id: AccId, consumer: Address) -> Result<u64, LedgerError> {
        Ok(self.account(acc_id)?.nonce(consumer))
    }

    pub fn account_owner(&self, acc_id: AccId) -> Result<Address, LedgerError> {
        Ok(self.account(acc_id)?.owner())
    }

    pub fn account_type_of(&self, acc_id: AccId) -> Result<AccountType, LedgerError> {
        Ok(self.account(acc_id)?.acc_type())
    }

    pub fn fee_ratio_of(&self, acc_id: AccId) -> Result<u32, LedgerError> {
        Ok(self.account(acc_id)?.fee_ratio())
    }

    pub fn is_consumer(&self, acc_id: AccId, consumer: Address) -> Result<bool, LedgerError> {
        Ok(self.account(acc_id)?.has_consumer(consumer))
    }

    pub fn subscription_paid(&self, acc_id: AccId) -> Result<bool, LedgerError> {
        Ok(self.account(acc_id)?.subscription_paid())
    }

    pub fn subscription_price_of(&self, acc_id: AccId) -> Result<U256, LedgerError> {
        Ok(self.account(acc_id)?.subscription_price())
    }

    /// Whether a request on this account can cover `fee` at request time,
    /// per the account's billing mode.
    pub fn can_cover_fee(
        &self,
        acc_id: AccId,
        fee: U256,
        ctx: &BlockContext,
    ) -> Result<bool, LedgerError> {
        let account = self.account(acc_id)?;
        Ok(match account.acc_type {
            AccountType::FiatSubscription => account.quota_available(ctx.timestamp),
            AccountType::KlaySubscription => {
                let due = if account.subscription_paid
                    && account.periods_elapsed(ctx.timestamp) == 0
                {
                    fee
                } else {
                    fee + account.subscription_price
                };
                account.quota_available(ctx.timestamp) && account.balance >= due
            }
            _ => account.balance >= fee,
        })
    }
}
