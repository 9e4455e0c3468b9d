// Copyright (c) 2025 Skylark Labs, Inc.
//
// All rights reserved.

//! Core identity and protocol types shared across the engine.

use std::fmt;

use alloy_primitives::{keccak256, Address, B256, I256, U256};
use serde::{Deserialize, Serialize};

/// Prepayment account identifier, unique per ledger, assigned sequentially.
pub type AccId = u64;

/// Identifier of a single oracle request.
///
/// Derived with keccak256 at request time; the exact preimage differs per
/// coordinator (see [`crate::coordinator`]), but an id is never reused and a
/// commitment lives under exactly one id.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub B256);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

/// Identifier of a request-response job type (`keccak256` of the type name).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct JobId(pub B256);

/// The response types a request-response oracle job can produce.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum JobType {
    Uint128,
    Int256,
    Bool,
    String,
    Bytes32,
    Bytes,
}

impl JobType {
    pub const ALL: [JobType; 6] = [
        JobType::Uint128,
        JobType::Int256,
        JobType::Bool,
        JobType::String,
        JobType::Bytes32,
        JobType::Bytes,
    ];

    /// Canonical name hashed into the job id.
    pub fn name(self) -> &'static str {
        match self {
            JobType::Uint128 => "uint128",
            JobType::Int256 => "int256",
            JobType::Bool => "bool",
            JobType::String => "string",
            JobType::Bytes32 => "bytes32",
            JobType::Bytes => "bytes",
        }
    }

    pub fn id(self) -> JobId {
        JobId(keccak256(self.name().as_bytes()))
    }

    pub fn from_id(id: JobId) -> Option<JobType> {
        JobType::ALL.into_iter().find(|job| job.id() == id)
    }

    /// Numeric jobs aggregate by median or majority and require an
    /// independent-majority submission count.
    pub fn is_numeric(self) -> bool {
        matches!(self, JobType::Uint128 | JobType::Int256 | JobType::Bool)
    }
}

/// A typed oracle response, tagged with the job type that produced it.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum DataResponse {
    Uint128(u128),
    Int256(I256),
    Bool(bool),
    String(String),
    Bytes32(B256),
    Bytes(Vec<u8>),
}

impl DataResponse {
    pub fn job_type(&self) -> JobType {
        match self {
            DataResponse::Uint128(_) => JobType::Uint128,
            DataResponse::Int256(_) => JobType::Int256,
            DataResponse::Bool(_) => JobType::Bool,
            DataResponse::String(_) => JobType::String,
            DataResponse::Bytes32(_) => JobType::Bytes32,
            DataResponse::Bytes(_) => JobType::Bytes,
        }
    }
}

/// Billing mode of a prepayment account.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum AccountType {
    /// Single-use account backing one direct-payment request.
    Temporary,
    /// Requests gated by an off-chain-paid period quota; no balance debit.
    FiatSubscription,
    /// Period quota plus a once-per-period subscription price debit.
    KlaySubscription,
    /// Balance debit at a per-account ratio of the service fee.
    KlayDiscount,
    /// Plain balance-debited account.
    KlayRegular,
}

impl AccountType {
    pub fn is_subscription(self) -> bool {
        matches!(self, AccountType::FiatSubscription | AccountType::KlaySubscription)
    }
}

/// Host-supplied chain context for one state transition.
///
/// The engine never reads a wall clock; round timeouts and commitment block
/// numbers are all relative to the context of the transaction being applied.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct BlockContext {
    pub number: u64,
    pub timestamp: u64,
}

/// Unforgeable capability granting administrative access to one component.
///
/// Issued exactly once, by the component constructor. Administrative
/// operations take `&AdminCap` and verify it was minted for the component it
/// is used on; there is no ambient owner address to impersonate.
#[derive(Clone, Debug)]
pub struct AdminCap {
    component: Address,
}

impl AdminCap {
    pub(crate) fn new(component: Address) -> Self {
        Self { component }
    }

    pub fn component(&self) -> Address {
        self.component
    }
}

/// The exact request parameters fixed at request time.
///
/// Stored whole, keyed by [`RequestId`]. Fulfillment and cancellation supply
/// their own copy; field-for-field equality with the stored value is the sole
/// authorization, and the stored value is deleted exactly once.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RequestCommitment {
    pub block_num: u64,
    pub acc_id: AccId,
    pub callback_gas_limit: u64,
    /// Number of oracle submissions required; number of words for randomness
    /// requests.
    pub num_submission: u32,
    pub sender: Address,
    pub is_direct_payment: bool,
    pub job_id: JobId,
}

/// VRF proof container submitted by an oracle at fulfillment time.
///
/// The elliptic-curve contents are opaque to the engine: proof generation and
/// curve verification happen off-chain. The engine only binds the proof to a
/// proving key ([`Proof::key_hash`]) and derives the output from it.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Proof {
    /// Public proving key (affine point).
    pub pk: [U256; 2],
    /// Proof gamma point.
    pub gamma: [U256; 2],
    pub c: U256,
    pub s: U256,
    /// The pre-seed the proof was generated for.
    pub seed: U256,
    pub u_point: [U256; 2],
    pub v_components: [U256; 4],
}

impl Proof {
    /// Hash identifying the proving key, as registered by oracles.
    pub fn key_hash(&self) -> B256 {
        keccak256(encode_words(&self.pk))
    }

    /// The verified random output this proof commits to.
    pub fn randomness(&self) -> U256 {
        U256::from_be_bytes(keccak256(encode_words(&self.gamma)).0)
    }
}

/// Fixed-width big-endian concatenation, the canonical encoding for every
/// digest preimage in the engine.
pub(crate) fn encode_words(words: &[U256]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(words.len() * 32);
    for word in words {
        buf.extend_from_slice(&word.to_be_bytes::<32>());
    }
    buf
}

/// Breakdown of one fee settlement applied by the ledger.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Settlement {
    pub total: U256,
    pub burned: U256,
    pub protocol: U256,
    pub operator: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_are_distinct_and_reversible() {
        for job in JobType::ALL {
            assert_eq!(JobType::from_id(job.id()), Some(job));
        }
        let ids: std::collections::HashSet<_> = JobType::ALL.iter().map(|j| j.id()).collect();
        assert_eq!(ids.len(), JobType::ALL.len());
    }

    #[test]
    fn unknown_job_id_does_not_resolve() {
        assert_eq!(JobType::from_id(JobId(keccak256(b"nonexistant-job"))), None);
    }

    #[test]
    fn proof_key_hash_depends_only_on_proving_key() {
        let proof_a = Proof {
            pk: [U256::from(1u64), U256::from(2u64)],
            gamma: [U256::from(3u64), U256::from(4u64)],
            c: U256::from(5u64),
            s: U256::from(6u64),
            seed: U256::from(7u64),
            u_point: [U256::ZERO, U256::ZERO],
            v_components: [U256::ZERO; 4],
        };
        let mut proof_b = proof_a.clone();
        proof_b.gamma = [U256::from(9u64), U256::from(9u64)];
        proof_b.seed = U256::from(42u64);

        assert_eq!(proof_a.key_hash(), proof_b.key_hash());
        assert_ne!(proof_a.randomness(), proof_b.randomness());
    }
}
