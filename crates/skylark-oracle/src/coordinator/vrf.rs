// Copyright (c) 2025 Skylark Labs, Inc.
//
// All rights reserved.

//! Randomness coordinator.
//!
//! Oracles register a proving key; consumers request random words against a
//! key hash. The fulfillment proof is an opaque verified input — the
//! coordinator binds it to the calling oracle's key, rederives the request id
//! from it, checks the commitment, and expands the proof output into the
//! requested number of words.

use std::collections::HashMap;

use alloy_primitives::{keccak256, Address, B256, U256};

use crate::{
    consumer::RandomnessConsumer,
    events::{CoordinatorEvent, EventLog},
    fee::FeeConfig,
    ledger::{Ledger, RequestProbe},
    types::{
        encode_words, AccId, AdminCap, BlockContext, JobId, Proof, RequestCommitment, RequestId,
    },
};

use super::{compute_request_id, CoordinatorBase, CoordinatorError};

/// Upper bound on words per randomness request.
pub const MAX_NUM_WORDS: u32 = 500;

/// Result of a settled randomness fulfillment.
#[derive(Clone, Debug, PartialEq)]
pub struct VrfFulfillment {
    pub request_id: RequestId,
    pub random_words: Vec<U256>,
    pub payment: U256,
    pub success: bool,
}

pub struct VrfCoordinator {
    base: CoordinatorBase,
    /// oracle → proving key hash; an oracle holds exactly one key.
    oracle_keys: HashMap<Address, B256>,
    /// key hash → oracles; several oracles may share a key.
    key_oracles: HashMap<B256, Vec<Address>>,
    request_counter: u64,
}

impl VrfCoordinator {
    pub fn new(address: Address) -> (Self, AdminCap) {
        let coordinator = Self {
            base: CoordinatorBase::new(address),
            oracle_keys: HashMap::new(),
            key_oracles: HashMap::new(),
            request_counter: 0,
        };
        (coordinator, AdminCap::new(address))
    }

    pub fn type_and_version() -> &'static str {
        "VrfCoordinator v0.1"
    }

    /// Job id stamped into every randomness commitment.
    pub fn job_id() -> JobId {
        JobId(keccak256(b"randomWords"))
    }

    pub fn address(&self) -> Address {
        self.base.address()
    }

    pub fn events(&self) -> &EventLog<CoordinatorEvent> {
        self.base.events()
    }

    pub fn set_config(
        &mut self,
        admin: &AdminCap,
        max_gas_limit: u64,
        gas_after_payment_calculation: u64,
        fee_config: FeeConfig,
    ) -> Result<(), CoordinatorError> {
        self.base.set_config(admin, max_gas_limit, gas_after_payment_calculation, fee_config)
    }

    pub fn set_gas_price(
        &mut self,
        admin: &AdminCap,
        gas_price: U256,
    ) -> Result<(), CoordinatorError> {
        self.base.set_gas_price(admin, gas_price)
    }

    // Oracle registry //////////////////////////////////////////////////////

    /// Register `oracle` under the key hash of `public_proving_key`. An
    /// oracle may hold only one key, but a key may be shared by several
    /// oracles.
    pub fn register_oracle(
        &mut self,
        admin: &AdminCap,
        oracle: Address,
        public_proving_key: [U256; 2],
    ) -> Result<B256, CoordinatorError> {
        self.base.check_admin(admin)?;
        self.base.insert_oracle(oracle)?;
        let key_hash = keccak256(encode_words(&public_proving_key));
        self.oracle_keys.insert(oracle, key_hash);
        self.key_oracles.entry(key_hash).or_default().push(oracle);
        self.base
            .push_event(CoordinatorEvent::OracleRegistered { oracle, key_hash: Some(key_hash) });
        tracing::info!("Registered VRF oracle {oracle} with key hash {key_hash}");
        Ok(key_hash)
    }

    pub fn deregister_oracle(
        &mut self,
        admin: &AdminCap,
        oracle: Address,
    ) -> Result<(), CoordinatorError> {
        self.base.check_admin(admin)?;
        self.base.remove_oracle(oracle)?;
        let key_hash = self.oracle_keys.remove(&oracle);
        if let Some(key_hash) = key_hash {
            if let Some(oracles) = self.key_oracles.get_mut(&key_hash) {
                oracles.retain(|o| *o != oracle);
                // the key hash disappears with its last oracle
                if oracles.is_empty() {
                    self.key_oracles.remove(&key_hash);
                }
            }
        }
        self.base.push_event(CoordinatorEvent::OracleDeregistered { oracle, key_hash });
        Ok(())
    }

    pub fn oracle_to_key_hash(&self, oracle: Address) -> Option<B256> {
        self.oracle_keys.get(&oracle).copied()
    }

    pub fn key_hash_to_oracles(&self, key_hash: B256) -> &[Address] {
        self.key_oracles.get(&key_hash).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Gas limit bound and the currently registered key hashes.
    pub fn get_request_config(&self) -> (u64, Vec<B256>) {
        (self.base.config().max_gas_limit, self.key_oracles.keys().copied().collect())
    }

    // Requests /////////////////////////////////////////////////////////////

    /// Randomness requests carry a single submission regardless of word
    /// count.
    pub fn estimate_fee(&self, req_count: u64, callback_gas_limit: u64) -> U256 {
        self.base.estimate_fee(req_count, 1, callback_gas_limit)
    }

    /// Fee estimate adjusted for an account's billing mode.
    pub fn estimate_fee_by_acc(
        &self,
        req_count: u64,
        callback_gas_limit: u64,
        acc_type: crate::types::AccountType,
        fee_ratio: u32,
    ) -> U256 {
        self.base.estimate_fee_by_acc(req_count, 1, callback_gas_limit, acc_type, fee_ratio)
    }

    pub fn request_random_words(
        &mut self,
        ledger: &mut Ledger,
        ctx: &BlockContext,
        sender: Address,
        key_hash: B256,
        acc_id: AccId,
        callback_gas_limit: u64,
        num_words: u32,
    ) -> Result<RequestId, CoordinatorError> {
        self.validate_key_hash(key_hash)?;
        self.validate_num_words(num_words)?;
        self.base.validate_request(ledger, ctx, sender, acc_id, callback_gas_limit, 1)?;

        let nonce = ledger.increase_nonce(self.base.address(), acc_id, sender)?;
        let (request_id, pre_seed) = self.derive_request_id(key_hash, sender, acc_id, nonce);
        let commitment = RequestCommitment {
            block_num: ctx.number,
            acc_id,
            callback_gas_limit,
            num_submission: num_words,
            sender,
            is_direct_payment: false,
            job_id: Self::job_id(),
        };
        self.base.insert_commitment(request_id, commitment);
        self.base.push_event(CoordinatorEvent::RandomWordsRequested {
            key_hash,
            request_id,
            pre_seed,
            acc_id,
            callback_gas_limit,
            num_words,
            sender,
            is_direct_payment: false,
        });
        tracing::debug!("Random words requested: {request_id}, account {acc_id}");
        Ok(request_id)
    }

    /// Direct-payment request: the fee is covered by `value` attached to the
    /// call; the excess is returned for refund.
    pub fn request_random_words_direct(
        &mut self,
        ledger: &mut Ledger,
        ctx: &BlockContext,
        sender: Address,
        key_hash: B256,
        callback_gas_limit: u64,
        num_words: u32,
        value: U256,
    ) -> Result<(RequestId, AccId, U256), CoordinatorError> {
        self.validate_key_hash(key_hash)?;
        self.validate_num_words(num_words)?;

        let (acc_id, refund) =
            self.base.begin_direct_request(ledger, sender, value, callback_gas_limit, 1)?;
        // temporary accounts are single-use; the nonce is fixed
        let (request_id, pre_seed) = self.derive_request_id(key_hash, sender, acc_id, 1);
        let commitment = RequestCommitment {
            block_num: ctx.number,
            acc_id,
            callback_gas_limit,
            num_submission: num_words,
            sender,
            is_direct_payment: true,
            job_id: Self::job_id(),
        };
        self.base.insert_commitment(request_id, commitment);
        self.base.push_event(CoordinatorEvent::RandomWordsRequested {
            key_hash,
            request_id,
            pre_seed,
            acc_id,
            callback_gas_limit,
            num_words,
            sender,
            is_direct_payment: true,
        });
        Ok((request_id, acc_id, refund))
    }

    // Fulfillment //////////////////////////////////////////////////////////

    pub fn fulfill_random_words(
        &mut self,
        ledger: &mut Ledger,
        consumer: &mut dyn RandomnessConsumer,
        ctx: &BlockContext,
        oracle: Address,
        proof: &Proof,
        commitment: &RequestCommitment,
    ) -> Result<VrfFulfillment, CoordinatorError> {
        let key_hash = proof.key_hash();
        if self.oracle_keys.get(&oracle) != Some(&key_hash) {
            return Err(CoordinatorError::NoSuchProvingKey(key_hash));
        }

        // the id is rederivable from the proof alone; a forged seed simply
        // finds no commitment
        let request_id = request_id_from_proof(key_hash, proof.seed);
        self.base.verify_commitment(request_id, commitment)?;

        let payment = self.base.settle_fee(ledger, ctx, commitment, oracle, &[])?;
        let stored = self.base.consume_commitment(request_id, commitment)?;

        let randomness = proof.randomness();
        let random_words: Vec<U256> = (0..stored.num_submission)
            .map(|i| U256::from_be_bytes(keccak256(encode_words(&[randomness, U256::from(i)])).0))
            .collect();

        let success = match consumer.raw_fulfill_random_words(request_id, &random_words) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("Consumer callback for {request_id} failed: {err}");
                false
            }
        };

        self.base.push_event(CoordinatorEvent::RandomWordsFulfilled {
            request_id,
            output_seed: randomness,
            payment,
            success,
        });
        tracing::debug!("Random words fulfilled: {request_id}, payment {payment}");
        Ok(VrfFulfillment { request_id, random_words, payment, success })
    }

    pub fn cancel_request(
        &mut self,
        sender: Address,
        request_id: RequestId,
    ) -> Result<(), CoordinatorError> {
        self.base.cancel_request(sender, request_id)?;
        Ok(())
    }

    pub fn get_commitment(&self, request_id: RequestId) -> Option<&RequestCommitment> {
        self.base.get_commitment(request_id)
    }

    // Internals ////////////////////////////////////////////////////////////

    fn validate_key_hash(&self, key_hash: B256) -> Result<(), CoordinatorError> {
        if self.key_oracles.get(&key_hash).map_or(true, Vec::is_empty) {
            return Err(CoordinatorError::InvalidKeyHash(key_hash));
        }
        Ok(())
    }

    fn validate_num_words(&self, num_words: u32) -> Result<(), CoordinatorError> {
        if num_words > MAX_NUM_WORDS {
            return Err(CoordinatorError::NumWordsTooBig {
                requested: num_words,
                max: MAX_NUM_WORDS,
            });
        }
        Ok(())
    }

    /// Pre-seed from the monotonic request counter over the nonce-derived
    /// id; the effective request id binds the pre-seed to the proving key so
    /// fulfillment can recompute it from the proof.
    fn derive_request_id(
        &mut self,
        key_hash: B256,
        sender: Address,
        acc_id: AccId,
        nonce: u64,
    ) -> (RequestId, U256) {
        self.request_counter += 1;
        let base_id = compute_request_id(sender, acc_id, nonce);
        let mut buf = Vec::with_capacity(40);
        buf.extend_from_slice(&self.request_counter.to_be_bytes());
        buf.extend_from_slice(base_id.0.as_slice());
        let pre_seed = U256::from_be_bytes(keccak256(&buf).0);
        (request_id_from_proof(key_hash, pre_seed), pre_seed)
    }
}

fn request_id_from_proof(key_hash: B256, pre_seed: U256) -> RequestId {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(key_hash.as_slice());
    buf.extend_from_slice(&pre_seed.to_be_bytes::<32>());
    RequestId(keccak256(&buf))
}

impl RequestProbe for VrfCoordinator {
    fn has_pending_request(&self, acc_id: AccId) -> bool {
        self.base.has_pending_request(acc_id)
    }
}
