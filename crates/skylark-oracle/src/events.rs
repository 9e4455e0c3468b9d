// Copyright (c) 2025 Skylark Labs, Inc.
//
// All rights reserved.

//! Append-only event outboxes.
//!
//! Every component owns an [`EventLog`]; a committed state transition appends
//! its events exactly once, in order, and a failed operation appends nothing.
//! External listeners read the log by offset — the engine never removes or
//! rewrites entries.

use alloy_primitives::{Address, B256, I256, U256};
use serde::{Deserialize, Serialize};

use crate::types::{AccId, AccountType, DataResponse, JobId, RequestId};

/// Ordered, append-only log of `T`.
#[derive(Debug, Clone)]
pub struct EventLog<T> {
    events: Vec<T>,
}

impl<T> Default for EventLog<T> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<T> EventLog<T> {
    pub(crate) fn push(&mut self, event: T) {
        self.events.push(event);
    }

    pub fn all(&self) -> &[T] {
        &self.events
    }

    /// Entries appended at or after `offset`; the listener cursor interface.
    pub fn since(&self, offset: usize) -> &[T] {
        &self.events[offset.min(self.events.len())..]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last(&self) -> Option<&T> {
        self.events.last()
    }
}

/// Events emitted by the prepayment [`crate::ledger::Ledger`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum LedgerEvent {
    AccountCreated { acc_id: AccId, owner: Address, acc_type: AccountType },
    TemporaryAccountCreated { acc_id: AccId, owner: Address },
    AccountCanceled { acc_id: AccId, to: Address, balance: U256 },
    AccountBalanceIncreased { acc_id: AccId, old_balance: U256, new_balance: U256 },
    AccountBalanceDecreased { acc_id: AccId, old_balance: U256, new_balance: U256 },
    AccountConsumerAdded { acc_id: AccId, consumer: Address },
    AccountConsumerRemoved { acc_id: AccId, consumer: Address },
    AccountOwnerTransferRequested { acc_id: AccId, from: Address, to: Address },
    AccountOwnerTransferred { acc_id: AccId, from: Address, to: Address },
    AccountPeriodReqIncreased { acc_id: AccId, period_req_count: u64 },
    AccountSubscriptionPaidSet { acc_id: AccId },
    BurnedFee { acc_id: AccId, amount: U256 },
    ProtocolFeePaid { acc_id: AccId, recipient: Address, amount: U256 },
    OperatorFeePaid { acc_id: AccId, operator: Address, amount: U256 },
    CoordinatorAdded { coordinator: Address },
    CoordinatorRemoved { coordinator: Address },
}

/// Events emitted by both request coordinators.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum CoordinatorEvent {
    OracleRegistered {
        oracle: Address,
        /// Proving key hash; `None` for request-response oracles.
        key_hash: Option<B256>,
    },
    OracleDeregistered {
        oracle: Address,
        key_hash: Option<B256>,
    },
    ConfigSet {
        max_gas_limit: u64,
        gas_after_payment_calculation: u64,
    },
    RandomWordsRequested {
        key_hash: B256,
        request_id: RequestId,
        pre_seed: U256,
        acc_id: AccId,
        callback_gas_limit: u64,
        num_words: u32,
        sender: Address,
        is_direct_payment: bool,
    },
    RandomWordsFulfilled {
        request_id: RequestId,
        output_seed: U256,
        payment: U256,
        success: bool,
    },
    DataRequested {
        request_id: RequestId,
        job_id: JobId,
        acc_id: AccId,
        callback_gas_limit: u64,
        num_submission: u32,
        sender: Address,
        is_direct_payment: bool,
        block_num: u64,
    },
    DataRequestFulfilled {
        request_id: RequestId,
        response: DataResponse,
        payment: U256,
        success: bool,
    },
    RequestCanceled {
        request_id: RequestId,
    },
}

/// Events emitted by the push-based [`crate::aggregator::Aggregator`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum AggregatorEvent {
    NewRound { round_id: u32, started_by: Address, started_at: u64 },
    SubmissionReceived { submission: I256, round_id: u32, oracle: Address },
    AnswerUpdated { current: I256, round_id: u32, updated_at: u64 },
    OraclePermissionsUpdated { oracle: Address, whitelisted: bool },
    RoundDetailsUpdated { min_submission_count: u32, max_submission_count: u32, restart_delay: u32 },
    RequesterPermissionsSet { requester: Address, authorized: bool, delay: u32 },
}

/// Events emitted by the [`crate::aggregator::AggregatorProxy`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ProxyEvent {
    AggregatorProposed { current: Address, proposed: Address },
    AggregatorConfirmed { previous: Address, latest: Address },
}
