// Copyright (c) 2025 Skylark Labs, Inc.
//
// All rights reserved.

//! Generic typed-data coordinator.
//!
//! A request names a job type (`uint128`, `int256`, `bool`, `string`,
//! `bytes32`, `bytes`) and a submission count. Oracles submit independently,
//! at most once each; the Nth submission aggregates the responses — median
//! for the integer jobs, majority vote for bool, first submission for the
//! unordered types — settles the fee across all submitters, and delivers the
//! result to the consumer.

use std::collections::HashMap;

use alloy_primitives::{Address, B256, I256, U256};

use crate::{
    aggregation::{majority_vote, median, median_u128},
    consumer::DataConsumer,
    events::{CoordinatorEvent, EventLog},
    fee::FeeConfig,
    ledger::{Ledger, RequestProbe},
    types::{
        AccId, AdminCap, BlockContext, DataResponse, JobId, JobType, RequestCommitment, RequestId,
    },
};

use super::{compute_request_id, CoordinatorBase, CoordinatorError};

/// Result of one fulfillment submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataFulfillment {
    /// Whether this submission completed the request.
    pub completed: bool,
    /// Total payment drawn from the account; zero until completion.
    pub payment: U256,
    /// Consumer callback outcome; `true` for intermediate submissions.
    pub success: bool,
    /// The aggregated response delivered to the consumer, on completion.
    pub response: Option<DataResponse>,
}

impl DataFulfillment {
    fn recorded() -> Self {
        Self { completed: false, payment: U256::ZERO, success: true, response: None }
    }
}

#[derive(Default, Clone, Debug)]
struct SubmissionState {
    oracles: Vec<Address>,
    responses: Vec<DataResponse>,
}

pub struct RequestResponseCoordinator {
    base: CoordinatorBase,
    submissions: HashMap<RequestId, SubmissionState>,
}

impl RequestResponseCoordinator {
    pub fn new(address: Address) -> (Self, AdminCap) {
        let coordinator =
            Self { base: CoordinatorBase::new(address), submissions: HashMap::new() };
        (coordinator, AdminCap::new(address))
    }

    pub fn type_and_version() -> &'static str {
        "RequestResponseCoordinator v0.1"
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

    pub fn estimate_fee(
        &self,
        req_count: u64,
        num_submission: u32,
        callback_gas_limit: u64,
    ) -> U256 {
        self.base.estimate_fee(req_count, num_submission, callback_gas_limit)
    }

    /// Fee estimate adjusted for an account's billing mode.
    pub fn estimate_fee_by_acc(
        &self,
        req_count: u64,
        num_submission: u32,
        callback_gas_limit: u64,
        acc_type: crate::types::AccountType,
        fee_ratio: u32,
    ) -> U256 {
        self.base
            .estimate_fee_by_acc(req_count, num_submission, callback_gas_limit, acc_type, fee_ratio)
    }

    // Oracle registry //////////////////////////////////////////////////////

    pub fn register_oracle(
        &mut self,
        admin: &AdminCap,
        oracle: Address,
    ) -> Result<(), CoordinatorError> {
        self.base.check_admin(admin)?;
        self.base.insert_oracle(oracle)?;
        self.base.push_event(CoordinatorEvent::OracleRegistered { oracle, key_hash: None });
        tracing::info!("Registered request-response oracle {oracle}");
        Ok(())
    }

    pub fn deregister_oracle(
        &mut self,
        admin: &AdminCap,
        oracle: Address,
    ) -> Result<(), CoordinatorError> {
        self.base.check_admin(admin)?;
        self.base.remove_oracle(oracle)?;
        self.base.push_event(CoordinatorEvent::OracleDeregistered { oracle, key_hash: None });
        Ok(())
    }

    pub fn is_oracle_registered(&self, oracle: Address) -> bool {
        self.base.is_oracle(oracle)
    }

    // Requests /////////////////////////////////////////////////////////////

    /// Job must exist; bool jobs need an odd submission count so majority
    /// voting cannot tie; the integer/bool jobs cap the submission count at
    /// half the registered oracles (aggregation needs an independent
    /// majority), except for the trivial single-submission request.
    pub fn validate_num_submission(
        &self,
        job_id: JobId,
        num_submission: u32,
    ) -> Result<(), CoordinatorError> {
        let job =
            JobType::from_id(job_id).ok_or(CoordinatorError::InvalidJobId(job_id))?;
        if num_submission == 0 {
            return Err(CoordinatorError::InvalidNumSubmission { requested: 0, max: 1 });
        }
        if job == JobType::Bool && num_submission % 2 == 0 {
            return Err(CoordinatorError::InvalidNumSubmission {
                requested: num_submission,
                max: num_submission - 1,
            });
        }
        if job.is_numeric() && num_submission != 1 {
            let max = (self.base.oracle_count() / 2) as u32;
            if num_submission > max {
                return Err(CoordinatorError::InvalidNumSubmission {
                    requested: num_submission,
                    max,
                });
            }
        }
        Ok(())
    }

    pub fn request_data(
        &mut self,
        ledger: &mut Ledger,
        ctx: &BlockContext,
        sender: Address,
        acc_id: AccId,
        callback_gas_limit: u64,
        num_submission: u32,
        job: JobType,
    ) -> Result<RequestId, CoordinatorError> {
        let job_id = job.id();
        self.validate_num_submission(job_id, num_submission)?;
        self.base.validate_request(ledger, ctx, sender, acc_id, callback_gas_limit, num_submission)?;

        let nonce = ledger.increase_nonce(self.base.address(), acc_id, sender)?;
        let request_id = compute_request_id(sender, acc_id, nonce);
        let commitment = RequestCommitment {
            block_num: ctx.number,
            acc_id,
            callback_gas_limit,
            num_submission,
            sender,
            is_direct_payment: false,
            job_id,
        };
        self.base.insert_commitment(request_id, commitment);
        self.base.push_event(CoordinatorEvent::DataRequested {
            request_id,
            job_id,
            acc_id,
            callback_gas_limit,
            num_submission,
            sender,
            is_direct_payment: false,
            block_num: ctx.number,
        });
        tracing::debug!("Data requested: {request_id}, job {}, account {acc_id}", job.name());
        Ok(request_id)
    }

    /// Direct-payment request; returns the request id, the backing temporary
    /// account and the excess value to refund.
    pub fn request_data_direct(
        &mut self,
        ledger: &mut Ledger,
        ctx: &BlockContext,
        sender: Address,
        callback_gas_limit: u64,
        num_submission: u32,
        job: JobType,
        value: U256,
    ) -> Result<(RequestId, AccId, U256), CoordinatorError> {
        let job_id = job.id();
        self.validate_num_submission(job_id, num_submission)?;

        let (acc_id, refund) = self.base.begin_direct_request(
            ledger,
            sender,
            value,
            callback_gas_limit,
            num_submission,
        )?;
        let request_id = compute_request_id(sender, acc_id, 1);
        let commitment = RequestCommitment {
            block_num: ctx.number,
            acc_id,
            callback_gas_limit,
            num_submission,
            sender,
            is_direct_payment: true,
            job_id,
        };
        self.base.insert_commitment(request_id, commitment);
        self.base.push_event(CoordinatorEvent::DataRequested {
            request_id,
            job_id,
            acc_id,
            callback_gas_limit,
            num_submission,
            sender,
            is_direct_payment: true,
            block_num: ctx.number,
        });
        Ok((request_id, acc_id, refund))
    }

    // Fulfillment entry points, one per job type ///////////////////////////

    #[allow(clippy::too_many_arguments)]
    pub fn fulfill_data_request_uint128(
        &mut self,
        ledger: &mut Ledger,
        consumer: &mut dyn DataConsumer,
        ctx: &BlockContext,
        oracle: Address,
        request_id: RequestId,
        response: u128,
        commitment: &RequestCommitment,
    ) -> Result<DataFulfillment, CoordinatorError> {
        self.fulfill(ledger, consumer, ctx, oracle, request_id, DataResponse::Uint128(response), commitment)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn fulfill_data_request_int256(
        &mut self,
        ledger: &mut Ledger,
        consumer: &mut dyn DataConsumer,
        ctx: &BlockContext,
        oracle: Address,
        request_id: RequestId,
        response: I256,
        commitment: &RequestCommitment,
    ) -> Result<DataFulfillment, CoordinatorError> {
        self.fulfill(ledger, consumer, ctx, oracle, request_id, DataResponse::Int256(response), commitment)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn fulfill_data_request_bool(
        &mut self,
        ledger: &mut Ledger,
        consumer: &mut dyn DataConsumer,
        ctx: &BlockContext,
        oracle: Address,
        request_id: RequestId,
        response: bool,
        commitment: &RequestCommitment,
    ) -> Result<DataFulfillment, CoordinatorError> {
        self.fulfill(ledger, consumer, ctx, oracle, request_id, DataResponse::Bool(response), commitment)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn fulfill_data_request_string(
        &mut self,
        ledger: &mut Ledger,
        consumer: &mut dyn DataConsumer,
        ctx: &BlockContext,
        oracle: Address,
        request_id: RequestId,
        response: String,
        commitment: &RequestCommitment,
    ) -> Result<DataFulfillment, CoordinatorError> {
        self.fulfill(ledger, consumer, ctx, oracle, request_id, DataResponse::String(response), commitment)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn fulfill_data_request_bytes32(
        &mut self,
        ledger: &mut Ledger,
        consumer: &mut dyn DataConsumer,
        ctx: &BlockContext,
        oracle: Address,
        request_id: RequestId,
        response: B256,
        commitment: &RequestCommitment,
    ) -> Result<DataFulfillment, CoordinatorError> {
        self.fulfill(ledger, consumer, ctx, oracle, request_id, DataResponse::Bytes32(response), commitment)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn fulfill_data_request_bytes(
        &mut self,
        ledger: &mut Ledger,
        consumer: &mut dyn DataConsumer,
        ctx: &BlockContext,
        oracle: Address,
        request_id: RequestId,
        response: Vec<u8>,
        commitment: &RequestCommitment,
    ) -> Result<DataFulfillment, CoordinatorError> {
        self.fulfill(ledger, consumer, ctx, oracle, request_id, DataResponse::Bytes(response), commitment)
    }

    #[allow(clippy::too_many_arguments)]
    fn fulfill(
        &mut self,
        ledger: &mut Ledger,
        consumer: &mut dyn DataConsumer,
        ctx: &BlockContext,
        oracle: Address,
        request_id: RequestId,
        response: DataResponse,
        commitment: &RequestCommitment,
    ) -> Result<DataFulfillment, CoordinatorError> {
        // the entry point must match the job named by the commitment, before
        // any lookup
        if JobType::from_id(commitment.job_id) != Some(response.job_type()) {
            return Err(CoordinatorError::IncompatibleJobId);
        }
        if !self.base.is_oracle(oracle) {
            return Err(CoordinatorError::UnregisteredOracleFulfillment(oracle));
        }
        self.base.verify_commitment(request_id, commitment)?;

        let (already_submitted, earlier_oracles, mut responses) =
            match self.submissions.get(&request_id) {
                Some(state) => (
                    state.oracles.contains(&oracle),
                    state.oracles.clone(),
                    state.responses.clone(),
                ),
                None => (false, Vec::new(), Vec::new()),
            };
        if already_submitted {
            return Err(CoordinatorError::OracleAlreadySubmitted(oracle));
        }
        let count_after = earlier_oracles.len() + 1;

        if (count_after as u32) < commitment.num_submission {
            let state = self.submissions.entry(request_id).or_default();
            state.oracles.push(oracle);
            state.responses.push(response);
            tracing::debug!(
                "Submission {count_after}/{} recorded for {request_id}",
                commitment.num_submission
            );
            return Ok(DataFulfillment::recorded());
        }

        // final submission: aggregate and settle before touching our state,
        // so a failed settlement leaves the request intact
        responses.push(response.clone());
        let aggregated = aggregate(response.job_type(), &responses).unwrap_or(response);

        let payment =
            self.base.settle_fee(ledger, ctx, commitment, oracle, &earlier_oracles)?;
        self.submissions.remove(&request_id);
        self.base.consume_commitment(request_id, commitment)?;

        let callback = match &aggregated {
            DataResponse::Uint128(v) => consumer.raw_fulfill_data_request_uint128(request_id, *v),
            DataResponse::Int256(v) => consumer.raw_fulfill_data_request_int256(request_id, *v),
            DataResponse::Bool(v) => consumer.raw_fulfill_data_request_bool(request_id, *v),
            DataResponse::String(v) => consumer.raw_fulfill_data_request_string(request_id, v),
            DataResponse::Bytes32(v) => consumer.raw_fulfill_data_request_bytes32(request_id, *v),
            DataResponse::Bytes(v) => consumer.raw_fulfill_data_request_bytes(request_id, v),
        };
        let success = match callback {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("Consumer callback for {request_id} failed: {err}");
                false
            }
        };

        self.base.push_event(CoordinatorEvent::DataRequestFulfilled {
            request_id,
            response: aggregated.clone(),
            payment,
            success,
        });
        tracing::debug!("Data request fulfilled: {request_id}, payment {payment}");
        Ok(DataFulfillment { completed: true, payment, success, response: Some(aggregated) })
    }

    pub fn cancel_request(
        &mut self,
        sender: Address,
        request_id: RequestId,
    ) -> Result<(), CoordinatorError> {
        self.base.cancel_request(sender, request_id)?;
        self.submissions.remove(&request_id);
        Ok(())
    }

    /// Whether the commitment made under `(consumer, acc_id, nonce)` is
    /// still outstanding.
    pub fn pending_request_exists(&self, consumer: Address, acc_id: AccId, nonce: u64) -> bool {
        self.base.get_commitment(compute_request_id(consumer, acc_id, nonce)).is_some()
    }

    pub fn get_commitment(&self, request_id: RequestId) -> Option<&RequestCommitment> {
        self.base.get_commitment(request_id)
    }
}

/// Aggregate completed submissions per the job's convention. `None` only on
/// an empty slice, which the fulfillment path never produces.
fn aggregate(job: JobType, responses: &[DataResponse]) -> Option<DataResponse> {
    match job {
        JobType::Uint128 => {
            let values: Vec<u128> = responses
                .iter()
                .filter_map(|r| match r {
                    DataResponse::Uint128(v) => Some(*v),
                    _ => None,
                })
                .collect();
            median_u128(&values).map(DataResponse::Uint128)
        }
        JobType::Int256 => {
            let values: Vec<I256> = responses
                .iter()
                .filter_map(|r| match r {
                    DataResponse::Int256(v) => Some(*v),
                    _ => None,
                })
                .collect();
            median(&values).map(DataResponse::Int256)
        }
        JobType::Bool => {
            let votes: Vec<bool> = responses
                .iter()
                .filter_map(|r| match r {
                    DataResponse::Bool(v) => Some(*v),
                    _ => None,
                })
                .collect();
            majority_vote(&votes).map(DataResponse::Bool)
        }
        // no aggregation is defined for the unordered types; the first
        // submission wins
        _ => responses.first().cloned(),
    }
}

impl RequestProbe for RequestResponseCoordinator {
    fn has_pending_request(&self, acc_id: AccId) -> bool {
        self.base.has_pending_request(acc_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::CallbackError;
    use alloy_primitives::address;

    const LEDGER: Address = address!("00000000000000000000000000000000000000aa");
    const PROTOCOL: Address = address!("00000000000000000000000000000000000000bb");
    const COORD: Address = address!("00000000000000000000000000000000000000cd");
    const OWNER: Address = address!("0000000000000000000000000000000000000001");

    const CTX: BlockContext = BlockContext { number: 20, timestamp: 2_000 };

    fn oracle(index: u8) -> Address {
        Address::with_last_byte(0x80 + index)
    }

    #[derive(Default)]
    struct Recorder {
        uint128: Option<u128>,
        int256: Option<I256>,
        boolean: Option<bool>,
        string: Option<String>,
        bytes32: Option<B256>,
        bytes: Option<Vec<u8>>,
        fail: bool,
    }

    impl DataConsumer for Recorder {
        fn raw_fulfill_data_request_uint128(
            &mut self,
            _request_id: RequestId,
            response: u128,
        ) -> Result<(), CallbackError> {
            if self.fail {
                return Err(CallbackError("consumer reverted".into()));
            }
            self.uint128 = Some(response);
            Ok(())
        }

        fn raw_fulfill_data_request_int256(
            &mut self,
            _request_id: RequestId,
            response: I256,
        ) -> Result<(), CallbackError> {
            self.int256 = Some(response);
            Ok(())
        }

        fn raw_fulfill_data_request_bool(
            &mut self,
            _request_id: RequestId,
            response: bool,
        ) -> Result<(), CallbackError> {
            self.boolean = Some(response);
            Ok(())
        }

        fn raw_fulfill_data_request_string(
            &mut self,
            _request_id: RequestId,
            response: &str,
        ) -> Result<(), CallbackError> {
            self.string = Some(response.to_string());
            Ok(())
        }

        fn raw_fulfill_data_request_bytes32(
            &mut self,
            _request_id: RequestId,
            response: B256,
        ) -> Result<(), CallbackError> {
            self.bytes32 = Some(response);
            Ok(())
        }

        fn raw_fulfill_data_request_bytes(
            &mut self,
            _request_id: RequestId,
            response: &[u8],
        ) -> Result<(), CallbackError> {
            self.bytes = Some(response.to_vec());
            Ok(())
        }
    }

    fn setup(oracle_count: u8) -> (Ledger, RequestResponseCoordinator, AccId) {
        let (mut ledger, ledger_admin) = Ledger::new(LEDGER, PROTOCOL);
        let (mut coordinator, admin) = RequestResponseCoordinator::new(COORD);
        ledger.add_coordinator(&ledger_admin, COORD).unwrap();

        coordinator
            .set_config(&admin, 2_500_000, 0, FeeConfig::flat(U256::from(100u64)))
            .unwrap();
        coordinator.set_gas_price(&admin, U256::from(1u64)).unwrap();
        for i in 0..oracle_count {
            coordinator.register_oracle(&admin, oracle(i)).unwrap();
        }

        let acc_id = ledger.create_account(OWNER);
        ledger.add_consumer(OWNER, acc_id, OWNER).unwrap();
        ledger.deposit(OWNER, acc_id, U256::from(100_000u64)).unwrap();
        (ledger, coordinator, acc_id)
    }

    fn request(
        ledger: &mut Ledger,
        coordinator: &mut RequestResponseCoordinator,
        acc_id: AccId,
        num_submission: u32,
        job: JobType,
    ) -> (RequestId, RequestCommitment) {
        let request_id = coordinator
            .request_data(ledger, &CTX, OWNER, acc_id, 1_000, num_submission, job)
            .unwrap();
        let commitment = coordinator.get_commitment(request_id).unwrap().clone();
        (request_id, commitment)
    }

    #[test]
    fn validate_num_submission_rules() {
        let (_ledger, coordinator, _acc) = setup(4);

        let bogus = JobId(alloy_primitives::keccak256(b"nonexistant-job"));
        assert_eq!(
            coordinator.validate_num_submission(bogus, 1),
            Err(CoordinatorError::InvalidJobId(bogus))
        );

        // bool majority cannot tie
        assert!(matches!(
            coordinator.validate_num_submission(JobType::Bool.id(), 2),
            Err(CoordinatorError::InvalidNumSubmission { .. })
        ));

        // numeric jobs are capped at half the oracle count
        assert!(matches!(
            coordinator.validate_num_submission(JobType::Uint128.id(), 4),
            Err(CoordinatorError::InvalidNumSubmission { requested: 4, max: 2 })
        ));
        coordinator.validate_num_submission(JobType::Uint128.id(), 2).unwrap();
        // a single submission is always allowed
        coordinator.validate_num_submission(JobType::Int256.id(), 1).unwrap();
        // unordered types are not capped
        coordinator.validate_num_submission(JobType::Bytes.id(), 4).unwrap();

        assert!(matches!(
            coordinator.validate_num_submission(JobType::Uint128.id(), 0),
            Err(CoordinatorError::InvalidNumSubmission { .. })
        ));
    }

    #[test]
    fn uint128_submissions_aggregate_by_median() {
        let (mut ledger, mut coordinator, acc_id) = setup(4);
        let (request_id, commitment) =
            request(&mut ledger, &mut coordinator, acc_id, 2, JobType::Uint128);
        let mut consumer = Recorder::default();

        let first = coordinator
            .fulfill_data_request_uint128(
                &mut ledger,
                &mut consumer,
                &CTX,
                oracle(0),
                request_id,
                1,
                &commitment,
            )
            .unwrap();
        assert!(!first.completed);
        assert_eq!(consumer.uint128, None);
        // the commitment stays live until the final submission
        assert!(coordinator.get_commitment(request_id).is_some());

        let last = coordinator
            .fulfill_data_request_uint128(
                &mut ledger,
                &mut consumer,
                &CTX,
                oracle(1),
                request_id,
                2,
                &commitment,
            )
            .unwrap();
        assert!(last.completed);
        assert_eq!(consumer.uint128, Some(1)); // median([1, 2]) == 1
        assert!(coordinator.get_commitment(request_id).is_none());
        // both submitters were paid
        assert!(ledger.operator_balance(oracle(0)) > U256::ZERO);
        assert!(ledger.operator_balance(oracle(1)) > U256::ZERO);
    }

    #[test]
    fn int256_median_handles_negatives() {
        let (mut ledger, mut coordinator, acc_id) = setup(4);
        let (request_id, commitment) =
            request(&mut ledger, &mut coordinator, acc_id, 2, JobType::Int256);
        let mut consumer = Recorder::default();

        for (i, value) in [-10i64, 11].into_iter().enumerate() {
            coordinator
                .fulfill_data_request_int256(
                    &mut ledger,
                    &mut consumer,
                    &CTX,
                    oracle(i as u8),
                    request_id,
                    I256::try_from(value).unwrap(),
                    &commitment,
                )
                .unwrap();
        }
        assert_eq!(consumer.int256, Some(I256::ZERO)); // (-10 + 11) / 2
    }

    #[test]
    fn bool_submissions_aggregate_by_majority() {
        let (mut ledger, mut coordinator, acc_id) = setup(6);
        let (request_id, commitment) =
            request(&mut ledger, &mut coordinator, acc_id, 3, JobType::Bool);
        let mut consumer = Recorder::default();

        for (i, vote) in [true, false, true].into_iter().enumerate() {
            coordinator
                .fulfill_data_request_bool(
                    &mut ledger,
                    &mut consumer,
                    &CTX,
                    oracle(i as u8),
                    request_id,
                    vote,
                    &commitment,
                )
                .unwrap();
        }
        assert_eq!(consumer.boolean, Some(true));
    }

    #[test]
    fn unordered_types_pass_the_first_submission_through() {
        let (mut ledger, mut coordinator, acc_id) = setup(1);
        let mut consumer = Recorder::default();

        let (request_id, commitment) =
            request(&mut ledger, &mut coordinator, acc_id, 1, JobType::String);
        coordinator
            .fulfill_data_request_string(
                &mut ledger,
                &mut consumer,
                &CTX,
                oracle(0),
                request_id,
                "hello".to_string(),
                &commitment,
            )
            .unwrap();
        assert_eq!(consumer.string.as_deref(), Some("hello"));

        let (request_id, commitment) =
            request(&mut ledger, &mut coordinator, acc_id, 1, JobType::Bytes);
        coordinator
            .fulfill_data_request_bytes(
                &mut ledger,
                &mut consumer,
                &CTX,
                oracle(0),
                request_id,
                vec![0x12, 0x34],
                &commitment,
            )
            .unwrap();
        assert_eq!(consumer.bytes.as_deref(), Some(&[0x12u8, 0x34][..]));

        let (request_id, commitment) =
            request(&mut ledger, &mut coordinator, acc_id, 1, JobType::Bytes32);
        let word = B256::repeat_byte(0x42);
        coordinator
            .fulfill_data_request_bytes32(
                &mut ledger,
                &mut consumer,
                &CTX,
                oracle(0),
                request_id,
                word,
                &commitment,
            )
            .unwrap();
        assert_eq!(consumer.bytes32, Some(word));
    }

    #[test]
    fn oracle_may_submit_only_once_per_request() {
        let (mut ledger, mut coordinator, acc_id) = setup(4);
        let (request_id, commitment) =
            request(&mut ledger, &mut coordinator, acc_id, 2, JobType::Int256);
        let mut consumer = Recorder::default();

        coordinator
            .fulfill_data_request_int256(
                &mut ledger,
                &mut consumer,
                &CTX,
                oracle(0),
                request_id,
                I256::try_from(123).unwrap(),
                &commitment,
            )
            .unwrap();
        assert_eq!(
            coordinator.fulfill_data_request_int256(
                &mut ledger,
                &mut consumer,
                &CTX,
                oracle(0),
                request_id,
                I256::try_from(123).unwrap(),
                &commitment,
            ),
            Err(CoordinatorError::OracleAlreadySubmitted(oracle(0)))
        );
    }

    #[test]
    fn unregistered_oracle_cannot_fulfill() {
        let (mut ledger, mut coordinator, acc_id) = setup(1);
        let (request_id, commitment) =
            request(&mut ledger, &mut coordinator, acc_id, 1, JobType::Int256);
        let mut consumer = Recorder::default();

        let outsider = Address::with_last_byte(0xff);
        assert_eq!(
            coordinator.fulfill_data_request_int256(
                &mut ledger,
                &mut consumer,
                &CTX,
                outsider,
                request_id,
                I256::ZERO,
                &commitment,
            ),
            Err(CoordinatorError::UnregisteredOracleFulfillment(outsider))
        );
    }

    #[test]
    fn incompatible_entry_point_is_rejected_before_lookup() {
        let (mut ledger, mut coordinator, acc_id) = setup(1);
        let (_request_id, commitment) =
            request(&mut ledger, &mut coordinator, acc_id, 1, JobType::Int256);
        let mut consumer = Recorder::default();

        // wrong entry point, even with a bogus request id
        let wrong_id = RequestId(B256::repeat_byte(0x11));
        assert_eq!(
            coordinator.fulfill_data_request_bytes(
                &mut ledger,
                &mut consumer,
                &CTX,
                oracle(0),
                wrong_id,
                vec![1],
                &commitment,
            ),
            Err(CoordinatorError::IncompatibleJobId)
        );
    }

    #[test]
    fn commitment_tampering_and_unknown_ids_are_rejected() {
        let (mut ledger, mut coordinator, acc_id) = setup(1);
        let (request_id, commitment) =
            request(&mut ledger, &mut coordinator, acc_id, 1, JobType::Int256);
        let mut consumer = Recorder::default();

        let wrong_id = RequestId(B256::repeat_byte(0x11));
        assert_eq!(
            coordinator.fulfill_data_request_int256(
                &mut ledger,
                &mut consumer,
                &CTX,
                oracle(0),
                wrong_id,
                I256::ZERO,
                &commitment,
            ),
            Err(CoordinatorError::NoCorrespondingRequest)
        );

        let mut tampered = commitment.clone();
        tampered.num_submission += 1;
        assert_eq!(
            coordinator.fulfill_data_request_int256(
                &mut ledger,
                &mut consumer,
                &CTX,
                oracle(0),
                request_id,
                I256::ZERO,
                &tampered,
            ),
            Err(CoordinatorError::IncorrectCommitment)
        );
    }

    #[test]
    fn pending_request_tracking_follows_nonces() {
        let (mut ledger, mut coordinator, acc_id) = setup(1);
        let (request_id, commitment) =
            request(&mut ledger, &mut coordinator, acc_id, 1, JobType::Int256);

        // nonce 1 marks authorization, nonce 2 is the first request
        assert!(coordinator.pending_request_exists(OWNER, acc_id, 2));
        assert!(!coordinator.pending_request_exists(OWNER, acc_id, 3));

        let mut consumer = Recorder::default();
        coordinator
            .fulfill_data_request_int256(
                &mut ledger,
                &mut consumer,
                &CTX,
                oracle(0),
                request_id,
                I256::try_from(123).unwrap(),
                &commitment,
            )
            .unwrap();
        assert!(!coordinator.pending_request_exists(OWNER, acc_id, 2));
    }

    #[test]
    fn cancel_clears_partial_submissions() {
        let (mut ledger, mut coordinator, acc_id) = setup(4);
        let (request_id, commitment) =
            request(&mut ledger, &mut coordinator, acc_id, 2, JobType::Int256);
        let mut consumer = Recorder::default();

        coordinator
            .fulfill_data_request_int256(
                &mut ledger,
                &mut consumer,
                &CTX,
                oracle(0),
                request_id,
                I256::ZERO,
                &commitment,
            )
            .unwrap();
        coordinator.cancel_request(OWNER, request_id).unwrap();
        assert!(coordinator.submissions.is_empty());
        assert!(!coordinator.has_pending_request(acc_id));
    }
}
