// Copyright (c) 2025 Skylark Labs, Inc.
//
// All rights reserved.

//! Coordination and billing engine for the Skylark decentralized oracle
//! network.
//!
//! Independent off-chain reporters submit data — random values or typed
//! responses — that the engine verifies against per-request commitments,
//! aggregates deterministically, and bills through a multi-type prepayment
//! ledger. Every operation is a complete, serially-ordered state transition:
//! it either applies fully (appending its events to the component's outbox)
//! or returns a typed error having mutated nothing.

pub mod aggregation;
pub mod aggregator;
pub mod config;
pub mod consumer;
pub mod coordinator;
pub mod events;
pub mod fee;
pub mod ledger;
pub mod types;

pub use aggregator::{Aggregator, AggregatorError, AggregatorProxy, ProxyError};
pub use config::Config;
pub use consumer::{CallbackError, DataConsumer, RandomnessConsumer};
pub use coordinator::{CoordinatorError, RequestResponseCoordinator, VrfCoordinator};
pub use fee::FeeConfig;
pub use ledger::{Ledger, LedgerError};
pub use types::{
    AccId, AccountType, AdminCap, BlockContext, DataResponse, JobId, JobType, Proof,
    RequestCommitment, RequestId,
};
