// Copyright (c) 2025 Skylark Labs, Inc.
//
// All rights reserved.

//! Push-based submission consensus for continuously updated values.
//!
//! A bounded oracle set reports per round; once a round collects the minimum
//! submission count the median of its submissions becomes the latest answer,
//! recomputed on every further submission up to the maximum. Round
//! progression is governed by round-number comparison plus a per-round
//! timeout against the host-supplied block timestamp; a timed-out round
//! carries the previous round's answer forward.

pub mod proxy;

use std::collections::HashMap;

use alloy_primitives::{Address, I256};
use thiserror::Error;

use crate::{
    aggregation::median,
    events::{AggregatorEvent, EventLog},
    types::{AdminCap, BlockContext},
};

pub use proxy::{AggregatorDirectory, AggregatorProxy, ProxyError};

/// Upper bound on the aggregator's oracle set.
pub const MAX_ORACLE_COUNT: usize = 77;

const ROUND_MAX: u32 = u32::MAX;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregatorError {
    #[error("caller does not hold the aggregator admin capability")]
    OnlyOwner,

    #[error("not enabled oracle")]
    NotEnabledOracle,

    #[error("not yet enabled oracle")]
    NotYetEnabledOracle,

    #[error("no longer allowed oracle")]
    NoLongerAllowedOracle,

    #[error("cannot report on previous rounds")]
    ReportOnPreviousRound,

    #[error("invalid round to report")]
    InvalidRoundToReport,

    #[error("previous round not supersedable")]
    PreviousRoundNotSupersedable,

    #[error("round not accepting submissions")]
    RoundNotAcceptingSubmissions,

    #[error("cannot remove an oracle that is not enabled")]
    OracleNotEnabled,

    #[error("cannot add an oracle that is already enabled")]
    OracleAlreadyEnabled,

    #[error("oracle set is full")]
    TooManyOracles,

    #[error("min submission count exceeds max submission count")]
    MinSubmissionGtMaxSubmission,

    #[error("max submission count exceeds oracle count")]
    MaxSubmissionGtOracleNum,

    #[error("restart delay must be less than the oracle count")]
    RestartDelayExceedOracleNum,

    #[error("min submission count must not be zero")]
    MinSubmissionZero,

    #[error("requester is not authorized")]
    RequesterNotAuthorized,

    #[error("previous round not supersedable")]
    PrevRoundNotSupersedable,

    #[error("must delay requests")]
    MustDelayRequests,

    #[error("no data present")]
    NoDataPresent,
}

/// One completed or in-progress round, as visible to readers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundData {
    pub round_id: u128,
    pub answer: I256,
    pub started_at: u64,
    pub updated_at: u64,
    pub answered_in_round: u128,
}

/// Eligibility snapshot returned by [`Aggregator::oracle_round_state`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OracleRoundState {
    pub eligible_to_submit: bool,
    pub round_id: u32,
    pub latest_submission: Option<I256>,
    pub started_at: u64,
    pub timeout: u64,
    pub oracle_count: u32,
}

#[derive(Clone, Debug, Default)]
struct OracleStatus {
    starting_round: u32,
    ending_round: u32,
    last_reported_round: u32,
    last_started_round: u32,
    latest_submission: Option<I256>,
}

#[derive(Clone, Debug, Default)]
struct Round {
    answer: Option<I256>,
    started_at: u64,
    updated_at: u64,
    answered_in_round: u32,
}

#[derive(Clone, Debug)]
struct RoundDetails {
    submissions: Vec<I256>,
    max_submissions: u32,
    min_submissions: u32,
    timeout: u64,
}

#[derive(Clone, Debug, Default)]
struct Requester {
    authorized: bool,
    delay: u32,
    last_started_round: u32,
}

pub struct Aggregator {
    address: Address,
    oracles: HashMap<Address, OracleStatus>,
    /// Enabled oracles in registration order.
    oracle_addresses: Vec<Address>,
    rounds: HashMap<u32, Round>,
    details: HashMap<u32, RoundDetails>,
    requesters: HashMap<Address, Requester>,
    reporting_round_id: u32,
    latest_round_id: u32,
    min_submission_count: u32,
    max_submission_count: u32,
    restart_delay: u32,
    timeout: u64,
    decimals: u8,
    description: String,
    events: EventLog<AggregatorEvent>,
}

impl Aggregator {
    pub fn new(
        address: Address,
        timeout: u64,
        decimals: u8,
        description: impl Into<String>,
    ) -> (Self, AdminCap) {
        let aggregator = Self {
            address,
            oracles: HashMap::new(),
            oracle_addresses: Vec::new(),
            rounds: HashMap::new(),
            details: HashMap::new(),
            requesters: HashMap::new(),
            reporting_round_id: 0,
            latest_round_id: 0,
            min_submission_count: 0,
            max_submission_count: 0,
            restart_delay: 0,
            timeout,
            decimals,
            description: description.into(),
            events: EventLog::default(),
        };
        (aggregator, AdminCap::new(address))
    }

    pub fn type_and_version() -> &'static str {
        "Aggregator v0.1"
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn events(&self) -> &EventLog<AggregatorEvent> {
        &self.events
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn oracles(&self) -> &[Address] {
        &self.oracle_addresses
    }

    pub fn oracle_count(&self) -> u32 {
        self.oracle_addresses.len() as u32
    }

    pub fn min_submission_count(&self) -> u32 {
        self.min_submission_count
    }

    pub fn max_submission_count(&self) -> u32 {
        self.max_submission_count
    }

    pub fn restart_delay(&self) -> u32 {
        self.restart_delay
    }

    fn check_admin(&self, admin: &AdminCap) -> Result<(), AggregatorError> {
        if admin.component() != self.address {
            return Err(AggregatorError::OnlyOwner);
        }
        Ok(())
    }

    // Oracle management ////////////////////////////////////////////////////

    fn oracle_enabled(&self, oracle: Address) -> bool {
        self.oracle_addresses.contains(&oracle)
    }

    /// Apply an oracle-set change and the round parameters governing future
    /// rounds. Validates the whole change against the resulting set before
    /// mutating anything.
    pub fn change_oracles(
        &mut self,
        admin: &AdminCap,
        removed: &[Address],
        added: &[Address],
        min_submission_count: u32,
        max_submission_count: u32,
        restart_delay: u32,
    ) -> Result<(), AggregatorError> {
        self.check_admin(admin)?;

        for oracle in removed {
            if !self.oracle_enabled(*oracle) {
                return Err(AggregatorError::OracleNotEnabled);
            }
        }
        for oracle in added {
            if self.oracle_enabled(*oracle) && !removed.contains(oracle) {
                return Err(AggregatorError::OracleAlreadyEnabled);
            }
        }
        let count = self.oracle_addresses.len() - removed.len() + added.len();
        if count > MAX_ORACLE_COUNT {
            return Err(AggregatorError::TooManyOracles);
        }
        if min_submission_count > max_submission_count {
            return Err(AggregatorError::MinSubmissionGtMaxSubmission);
        }
        if max_submission_count as usize > count {
            return Err(AggregatorError::MaxSubmissionGtOracleNum);
        }
        if count > 0 && restart_delay as usize >= count {
            return Err(AggregatorError::RestartDelayExceedOracleNum);
        }
        if count > 0 && min_submission_count == 0 {
            return Err(AggregatorError::MinSubmissionZero);
        }

        for oracle in removed {
            // removed oracles keep submission rights for the round in flight
            if let Some(status) = self.oracles.get_mut(oracle) {
                status.ending_round = self.reporting_round_id + 1;
            }
            self.oracle_addresses.retain(|o| o != oracle);
            self.events
                .push(AggregatorEvent::OraclePermissionsUpdated { oracle: *oracle, whitelisted: false });
        }
        for oracle in added {
            let starting_round = self.starting_round_for(*oracle);
            let status = self.oracles.entry(*oracle).or_default();
            status.starting_round = starting_round;
            status.ending_round = ROUND_MAX;
            self.oracle_addresses.push(*oracle);
            self.events
                .push(AggregatorEvent::OraclePermissionsUpdated { oracle: *oracle, whitelisted: true });
        }

        self.min_submission_count = min_submission_count;
        self.max_submission_count = max_submission_count;
        self.restart_delay = restart_delay;
        self.events.push(AggregatorEvent::RoundDetailsUpdated {
            min_submission_count,
            max_submission_count,
            restart_delay,
        });
        tracing::debug!(
            "Oracle set changed: {count} oracles, min {min_submission_count}, max {max_submission_count}"
        );
        Ok(())
    }

    fn starting_round_for(&self, oracle: Address) -> u32 {
        let current = self.reporting_round_id;
        if current != 0 {
            if let Some(status) = self.oracles.get(&oracle) {
                // rejoining during the round it was removed for
                if status.ending_round == current {
                    return current;
                }
            }
        }
        current + 1
    }

    // Submissions //////////////////////////////////////////////////////////

    /// Submit `value` for `round_id`. Returns the new answer when this
    /// submission reached or extended quorum.
    pub fn submit(
        &mut self,
        ctx: &BlockContext,
        oracle: Address,
        round_id: u32,
        submission: I256,
    ) -> Result<Option<I256>, AggregatorError> {
        self.validate_oracle_round(oracle, round_id, ctx)?;
        self.oracle_initialize_new_round(round_id, oracle, ctx);
        self.record_submission(submission, round_id, oracle)?;
        let updated = self.update_round_answer(round_id, ctx);
        self.delete_round_details(round_id);
        Ok(updated)
    }

    fn validate_oracle_round(
        &self,
        oracle: Address,
        round_id: u32,
        ctx: &BlockContext,
    ) -> Result<(), AggregatorError> {
        let status = self.oracles.get(&oracle).ok_or(AggregatorError::NotEnabledOracle)?;
        if status.starting_round == 0 {
            return Err(AggregatorError::NotEnabledOracle);
        }
        if status.starting_round > round_id {
            return Err(AggregatorError::NotYetEnabledOracle);
        }
        if status.ending_round < round_id {
            return Err(AggregatorError::NoLongerAllowedOracle);
        }
        if status.last_reported_round >= round_id {
            return Err(AggregatorError::ReportOnPreviousRound);
        }
        let reporting = self.reporting_round_id;
        if round_id != reporting
            && round_id != reporting + 1
            && !self.previous_and_current_unanswered(round_id, reporting)
        {
            return Err(AggregatorError::InvalidRoundToReport);
        }
        if round_id != 1 && !self.supersedable(round_id - 1, ctx) {
            return Err(AggregatorError::PreviousRoundNotSupersedable);
        }
        Ok(())
    }

    fn previous_and_current_unanswered(&self, round_id: u32, reporting: u32) -> bool {
        round_id + 1 == reporting && self.round(reporting).updated_at == 0
    }

    fn round(&self, round_id: u32) -> Round {
        self.rounds.get(&round_id).cloned().unwrap_or_default()
    }

    fn supersedable(&self, round_id: u32, ctx: &BlockContext) -> bool {
        round_id == 0 || self.round(round_id).updated_at > 0 || self.timed_out(round_id, ctx)
    }

    fn timed_out(&self, round_id: u32, ctx: &BlockContext) -> bool {
        let started_at = self.round(round_id).started_at;
        let timeout = self.details.get(&round_id).map_or(0, |details| details.timeout);
        started_at > 0 && timeout > 0 && started_at + timeout < ctx.timestamp
    }

    fn accepting_submissions(&self, round_id: u32) -> bool {
        self.details.contains_key(&round_id)
    }

    fn delayed(&self, oracle: Address, round_id: u32) -> bool {
        let last_started = self.oracles.get(&oracle).map_or(0, |status| status.last_started_round);
        last_started == 0 || round_id > last_started + self.restart_delay
    }

    fn oracle_initialize_new_round(&mut self, round_id: u32, oracle: Address, ctx: &BlockContext) {
        if round_id != self.reporting_round_id + 1 {
            return;
        }
        if !self.delayed(oracle, round_id) {
            return;
        }
        self.initialize_new_round(round_id, oracle, ctx);
        if let Some(status) = self.oracles.get_mut(&oracle) {
            status.last_started_round = round_id;
        }
    }

    fn initialize_new_round(&mut self, round_id: u32, started_by: Address, ctx: &BlockContext) {
        if round_id > 1 {
            self.update_timed_out_round_info(round_id - 1, ctx);
        }
        self.reporting_round_id = round_id;
        self.details.insert(
            round_id,
            RoundDetails {
                submissions: Vec::new(),
                max_submissions: self.max_submission_count,
                min_submissions: self.min_submission_count,
                timeout: self.timeout,
            },
        );
        let round = self.rounds.entry(round_id).or_default();
        round.started_at = ctx.timestamp;
        self.events.push(AggregatorEvent::NewRound {
            round_id,
            started_by,
            started_at: ctx.timestamp,
        });
        tracing::debug!("Round {round_id} started by {started_by}");
    }

    /// A timed-out round adopts the previous round's answer so readers never
    /// observe a gap.
    fn update_timed_out_round_info(&mut self, round_id: u32, ctx: &BlockContext) {
        if !self.timed_out(round_id, ctx) || self.round(round_id).updated_at > 0 {
            return;
        }
        let previous = self.round(round_id.saturating_sub(1));
        let round = self.rounds.entry(round_id).or_default();
        round.answer = previous.answer;
        round.answered_in_round = previous.answered_in_round;
        round.updated_at = ctx.timestamp;
        self.details.remove(&round_id);
    }

    fn record_submission(
        &mut self,
        submission: I256,
        round_id: u32,
        oracle: Address,
    ) -> Result<(), AggregatorError> {
        let details = self
            .details
            .get_mut(&round_id)
            .ok_or(AggregatorError::RoundNotAcceptingSubmissions)?;
        if details.submissions.len() as u32 >= details.max_submissions {
            return Err(AggregatorError::RoundNotAcceptingSubmissions);
        }
        details.submissions.push(submission);
        if let Some(status) = self.oracles.get_mut(&oracle) {
            status.last_reported_round = round_id;
            status.latest_submission = Some(submission);
        }
        self.events.push(AggregatorEvent::SubmissionReceived { submission, round_id, oracle });
        Ok(())
    }

    fn update_round_answer(&mut self, round_id: u32, ctx: &BlockContext) -> Option<I256> {
        let details = self.details.get(&round_id)?;
        if (details.submissions.len() as u32) < details.min_submissions {
            return None;
        }
        let new_answer = median(&details.submissions)?;
        let round = self.rounds.entry(round_id).or_default();
        round.answer = Some(new_answer);
        round.updated_at = ctx.timestamp;
        round.answered_in_round = round_id;
        self.latest_round_id = round_id;
        self.events.push(AggregatorEvent::AnswerUpdated {
            current: new_answer,
            round_id,
            updated_at: ctx.timestamp,
        });
        tracing::debug!("Answer updated to {new_answer} in round {round_id}");
        Some(new_answer)
    }

    fn delete_round_details(&mut self, round_id: u32) {
        let full = self
            .details
            .get(&round_id)
            .map_or(false, |details| details.submissions.len() as u32 >= details.max_submissions);
        if full {
            self.details.remove(&round_id);
        }
    }

    // External requesters //////////////////////////////////////////////////

    /// Grant or revoke new-round permission. Re-setting an identical
    /// permission is a no-op and emits nothing.
    pub fn set_requester_permissions(
        &mut self,
        admin: &AdminCap,
        requester: Address,
        authorized: bool,
        delay: u32,
    ) -> Result<(), AggregatorError> {
        self.check_admin(admin)?;
        let current = self.requesters.get(&requester);
        let current_authorized = current.map_or(false, |r| r.authorized);
        if authorized == current_authorized && current.map_or(0, |r| r.delay) == delay {
            return Ok(());
        }
        if authorized {
            let entry = self.requesters.entry(requester).or_default();
            entry.authorized = true;
            entry.delay = delay;
        } else if let Some(entry) = self.requesters.get_mut(&requester) {
            entry.authorized = false;
            entry.delay = delay;
        } else {
            return Ok(());
        }
        self.events.push(AggregatorEvent::RequesterPermissionsSet { requester, authorized, delay });
        Ok(())
    }

    /// Start a new round at an authorized requester's demand.
    pub fn request_new_round(
        &mut self,
        ctx: &BlockContext,
        requester: Address,
    ) -> Result<u32, AggregatorError> {
        let state = self
            .requesters
            .get(&requester)
            .filter(|r| r.authorized)
            .ok_or(AggregatorError::RequesterNotAuthorized)?;

        let current = self.reporting_round_id;
        if !(current == 0 || self.supersedable(current, ctx)) {
            return Err(AggregatorError::PrevRoundNotSupersedable);
        }
        let new_round = current + 1;
        if state.last_started_round > 0 && new_round <= state.last_started_round + state.delay {
            return Err(AggregatorError::MustDelayRequests);
        }

        self.initialize_new_round(new_round, requester, ctx);
        if let Some(state) = self.requesters.get_mut(&requester) {
            state.last_started_round = new_round;
        }
        Ok(new_round)
    }

    // Reads ////////////////////////////////////////////////////////////////

    pub fn latest_round_data(&self) -> Result<RoundData, AggregatorError> {
        self.round_data(self.latest_round_id)
    }

    pub fn round_data(&self, round_id: u32) -> Result<RoundData, AggregatorError> {
        let round = self.rounds.get(&round_id).ok_or(AggregatorError::NoDataPresent)?;
        if round.updated_at == 0 {
            return Err(AggregatorError::NoDataPresent);
        }
        Ok(RoundData {
            round_id: round_id as u128,
            answer: round.answer.unwrap_or(I256::ZERO),
            started_at: round.started_at,
            updated_at: round.updated_at,
            answered_in_round: round.answered_in_round as u128,
        })
    }

    pub fn latest_answer(&self) -> Result<I256, AggregatorError> {
        Ok(self.latest_round_data()?.answer)
    }

    pub fn current_round_started_at(&self) -> u64 {
        self.round(self.reporting_round_id).started_at
    }

    /// Suggested round and eligibility for `oracle`; pass `queried_round_id`
    /// 0 to let the aggregator pick the round the oracle should report to.
    pub fn oracle_round_state(
        &self,
        oracle: Address,
        queried_round_id: u32,
        ctx: &BlockContext,
    ) -> OracleRoundState {
        let status = self.oracles.get(&oracle).cloned().unwrap_or_default();

        let (round_id, eligible) = if queried_round_id == 0 {
            let reporting = self.reporting_round_id;
            let should_supersede = status.last_reported_round == reporting
                || !self.accepting_submissions(reporting);
            if self.supersedable(reporting, ctx) && should_supersede {
                let suggested = reporting + 1;
                (suggested, self.delayed(oracle, suggested))
            } else {
                (
                    reporting,
                    self.accepting_submissions(reporting)
                        && status.last_reported_round < reporting,
                )
            }
        } else {
            (
                queried_round_id,
                self.validate_oracle_round(oracle, queried_round_id, ctx).is_ok()
                    && self.accepting_submissions(queried_round_id),
            )
        };

        let enabled = status.starting_round != 0
            && status.starting_round <= round_id
            && status.ending_round >= round_id;
        OracleRoundState {
            eligible_to_submit: eligible && enabled,
            round_id,
            latest_submission: status.latest_submission,
            started_at: self.round(round_id).started_at,
            timeout: self.details.get(&round_id).map_or(0, |details| details.timeout),
            oracle_count: self.oracle_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const AGG: Address = address!("00000000000000000000000000000000000000a1");
    const ORACLE0: Address = address!("0000000000000000000000000000000000000010");
    const ORACLE1: Address = address!("0000000000000000000000000000000000000011");
    const ORACLE2: Address = address!("0000000000000000000000000000000000000012");
    const REQUESTER: Address = address!("0000000000000000000000000000000000000020");

    const TIMEOUT: u64 = 1_800;

    fn ctx(timestamp: u64) -> BlockContext {
        BlockContext { number: timestamp, timestamp }
    }

    fn int(value: i64) -> I256 {
        I256::try_from(value).unwrap()
    }

    fn setup() -> (Aggregator, AdminCap) {
        Aggregator::new(AGG, TIMEOUT, 8, "KLAY/USD")
    }

    /// Mirror of the operator tooling: min is capped at 2, max tracks the
    /// resulting oracle count.
    fn change_oracles(
        aggregator: &mut Aggregator,
        admin: &AdminCap,
        removed: &[Address],
        added: &[Address],
    ) {
        let count = aggregator.oracle_count() as usize - removed.len() + added.len();
        let max = count as u32;
        let min = max.min(2);
        aggregator.change_oracles(admin, removed, added, min, max, 0).unwrap();
    }

    #[test]
    fn add_and_remove_oracles() {
        let (mut aggregator, admin) = setup();
        change_oracles(&mut aggregator, &admin, &[], &[ORACLE0, ORACLE1]);
        assert_eq!(aggregator.oracle_count(), 2);

        assert_eq!(
            aggregator.change_oracles(&admin, &[ORACLE2], &[], 1, 1, 0),
            Err(AggregatorError::OracleNotEnabled)
        );
        assert_eq!(
            aggregator.change_oracles(&admin, &[], &[ORACLE0], 1, 2, 0),
            Err(AggregatorError::OracleAlreadyEnabled)
        );

        change_oracles(&mut aggregator, &admin, &[ORACLE0], &[]);
        assert_eq!(aggregator.oracles(), &[ORACLE1]);
    }

    #[test]
    fn submissions_reach_quorum_and_update_the_answer() {
        let (mut aggregator, admin) = setup();
        aggregator
            .change_oracles(&admin, &[], &[ORACLE0, ORACLE1, ORACLE2], 2, 3, 0)
            .unwrap();

        // first submission starts the round but cannot answer yet
        let first = aggregator.submit(&ctx(100), ORACLE0, 1, int(10)).unwrap();
        assert_eq!(first, None);
        assert!(matches!(
            aggregator.events().all()[..],
            [
                AggregatorEvent::OraclePermissionsUpdated { .. },
                AggregatorEvent::OraclePermissionsUpdated { .. },
                AggregatorEvent::OraclePermissionsUpdated { .. },
                AggregatorEvent::RoundDetailsUpdated { .. },
                AggregatorEvent::NewRound { round_id: 1, .. },
                AggregatorEvent::SubmissionReceived { .. },
            ]
        ));

        // quorum of two: the answer is the floor-median of {10, 11}
        let second = aggregator.submit(&ctx(101), ORACLE1, 1, int(11)).unwrap();
        assert_eq!(second, Some(int(10)));

        // a third submission re-aggregates {10, 11, 12}
        let third = aggregator.submit(&ctx(102), ORACLE2, 1, int(12)).unwrap();
        assert_eq!(third, Some(int(11)));

        let data = aggregator.latest_round_data().unwrap();
        assert_eq!(data.answer, int(11));
        assert_eq!(data.round_id, 1);
        assert_eq!(data.answered_in_round, 1);
    }

    #[test]
    fn round_progression_errors_match_protocol_rules() {
        let (mut aggregator, admin) = setup();
        let answer = int(123);

        // not registered at all
        assert_eq!(
            aggregator.submit(&ctx(1), ORACLE0, 1, answer),
            Err(AggregatorError::NotEnabledOracle)
        );

        aggregator.change_oracles(&admin, &[], &[ORACLE0], 1, 1, 0).unwrap();

        // may only report to the current or next round
        assert_eq!(
            aggregator.submit(&ctx(2), ORACLE0, 2, answer),
            Err(AggregatorError::InvalidRoundToReport)
        );

        aggregator.submit(&ctx(3), ORACLE0, 1, answer).unwrap();
        assert_eq!(
            aggregator.submit(&ctx(4), ORACLE0, 1, answer),
            Err(AggregatorError::ReportOnPreviousRound)
        );

        // with a second oracle and min=2, a lone submission cannot supersede
        aggregator.change_oracles(&admin, &[], &[ORACLE1], 2, 2, 0).unwrap();
        aggregator.submit(&ctx(5), ORACLE0, 2, answer).unwrap();
        assert_eq!(
            aggregator.submit(&ctx(6), ORACLE0, 3, answer),
            Err(AggregatorError::PreviousRoundNotSupersedable)
        );

        // round 2 times out; a removed oracle may still serve the round in
        // flight but nothing beyond it
        let after_timeout = 6 + TIMEOUT + 1;
        aggregator.change_oracles(&admin, &[ORACLE1], &[], 1, 1, 0).unwrap();
        aggregator.submit(&ctx(after_timeout), ORACLE1, 3, answer).unwrap();
        assert_eq!(
            aggregator.submit(&ctx(after_timeout + 1), ORACLE1, 4, answer),
            Err(AggregatorError::NoLongerAllowedOracle)
        );
    }

    #[test]
    fn oracle_set_is_bounded() {
        let (mut aggregator, admin) = setup();
        for i in 0..MAX_ORACLE_COUNT {
            let oracle = Address::from_word(alloy_primitives::keccak256(i.to_be_bytes()));
            let count = (i + 1) as u32;
            aggregator.change_oracles(&admin, &[], &[oracle], count.min(2), count, 0).unwrap();
        }
        let one_too_many = Address::with_last_byte(0xee);
        assert_eq!(
            aggregator.change_oracles(
                &admin,
                &[],
                &[one_too_many],
                2,
                MAX_ORACLE_COUNT as u32 + 1,
                0
            ),
            Err(AggregatorError::TooManyOracles)
        );
    }

    #[test]
    fn round_parameter_validation() {
        let (mut aggregator, admin) = setup();
        assert_eq!(
            aggregator.change_oracles(&admin, &[], &[], 1, 0, 0),
            Err(AggregatorError::MinSubmissionGtMaxSubmission)
        );
        assert_eq!(
            aggregator.change_oracles(&admin, &[], &[], 0, 1, 0),
            Err(AggregatorError::MaxSubmissionGtOracleNum)
        );
        assert_eq!(
            aggregator.change_oracles(&admin, &[], &[ORACLE0], 0, 1, 1),
            Err(AggregatorError::RestartDelayExceedOracleNum)
        );
        assert_eq!(
            aggregator.change_oracles(&admin, &[], &[ORACLE0], 0, 1, 0),
            Err(AggregatorError::MinSubmissionZero)
        );
    }

    #[test]
    fn requester_permissions_and_new_rounds() {
        let (mut aggregator, admin) = setup();

        aggregator.set_requester_permissions(&admin, REQUESTER, true, 0).unwrap();
        let events_before = aggregator.events().len();
        // identical permissions are a no-op
        aggregator.set_requester_permissions(&admin, REQUESTER, true, 0).unwrap();
        assert_eq!(aggregator.events().len(), events_before);

        assert_eq!(
            aggregator.request_new_round(&ctx(50), ORACLE0),
            Err(AggregatorError::RequesterNotAuthorized)
        );

        let round = aggregator.request_new_round(&ctx(50), REQUESTER).unwrap();
        assert_eq!(round, 1);
        assert!(matches!(
            aggregator.events().last(),
            Some(AggregatorEvent::NewRound { round_id: 1, started_by, started_at: 50 })
                if *started_by == REQUESTER
        ));

        aggregator.set_requester_permissions(&admin, REQUESTER, false, 0).unwrap();
        assert_eq!(
            aggregator.request_new_round(&ctx(51), REQUESTER),
            Err(AggregatorError::RequesterNotAuthorized)
        );
    }

    #[test]
    fn new_round_requires_previous_round_quorum() {
        let (mut aggregator, admin) = setup();
        aggregator.set_requester_permissions(&admin, REQUESTER, true, 0).unwrap();
        aggregator
            .change_oracles(&admin, &[], &[ORACLE0, ORACLE1, ORACLE2], 2, 3, 0)
            .unwrap();

        aggregator.submit(&ctx(10), ORACLE0, 1, int(123)).unwrap();
        // only one of two required submissions arrived
        assert_eq!(
            aggregator.request_new_round(&ctx(11), REQUESTER),
            Err(AggregatorError::PrevRoundNotSupersedable)
        );

        aggregator.submit(&ctx(12), ORACLE1, 1, int(124)).unwrap();
        assert_eq!(aggregator.request_new_round(&ctx(13), REQUESTER).unwrap(), 2);
    }

    #[test]
    fn current_round_started_at_tracks_initialization() {
        let (mut aggregator, admin) = setup();
        aggregator.change_oracles(&admin, &[], &[ORACLE0], 1, 1, 0).unwrap();

        for round in 1..=2u32 {
            let now = 100 * round as u64;
            aggregator.submit(&ctx(now), ORACLE0, round, int(123)).unwrap();
            assert_eq!(aggregator.current_round_started_at(), now);
        }
    }

    #[test]
    fn skipped_oracles_are_pointed_at_the_open_round() {
        let (mut aggregator, admin) = setup();
        aggregator.change_oracles(&admin, &[], &[ORACLE0, ORACLE1], 1, 2, 0).unwrap();

        aggregator.submit(&ctx(10), ORACLE0, 1, int(123)).unwrap();
        aggregator.submit(&ctx(11), ORACLE1, 1, int(123)).unwrap();

        let state = aggregator.oracle_round_state(ORACLE0, 0, &ctx(12));
        assert_eq!(state.round_id, 2);
        assert!(state.eligible_to_submit);
        aggregator.submit(&ctx(13), ORACLE0, 2, int(123)).unwrap();

        let state = aggregator.oracle_round_state(ORACLE0, 0, &ctx(14));
        assert_eq!(state.round_id, 3);
        aggregator.submit(&ctx(15), ORACLE0, 3, int(123)).unwrap();

        // oracle1 skipped round 2 entirely; it is pointed at round 3
        let state = aggregator.oracle_round_state(ORACLE1, 0, &ctx(16));
        assert_eq!(state.round_id, 3);
        assert!(state.eligible_to_submit);
    }

    #[test]
    fn oracle_round_state_before_and_after_first_submission() {
        let (mut aggregator, admin) = setup();
        aggregator.change_oracles(&admin, &[], &[ORACLE0], 1, 1, 0).unwrap();

        let state = aggregator.oracle_round_state(ORACLE0, 0, &ctx(5));
        assert_eq!(state.round_id, 1);
        assert_eq!(state.latest_submission, None);
        assert_eq!(state.started_at, 0);
        assert_eq!(state.timeout, 0);
        assert_eq!(state.oracle_count, 1);

        aggregator.submit(&ctx(6), ORACLE0, 1, int(10)).unwrap();
        let state = aggregator.oracle_round_state(ORACLE0, 1, &ctx(7));
        assert_eq!(state.round_id, 1);
        assert_eq!(state.latest_submission, Some(int(10)));
        assert_eq!(state.oracle_count, 1);
    }

    #[test]
    fn timed_out_round_carries_the_previous_answer() {
        let (mut aggregator, admin) = setup();
        aggregator.change_oracles(&admin, &[], &[ORACLE0, ORACLE1], 2, 2, 0).unwrap();

        aggregator.submit(&ctx(10), ORACLE0, 1, int(100)).unwrap();
        aggregator.submit(&ctx(11), ORACLE1, 1, int(102)).unwrap();
        assert_eq!(aggregator.latest_answer().unwrap(), int(101));

        // round 2 opens but never reaches quorum
        aggregator.submit(&ctx(20), ORACLE0, 2, int(200)).unwrap();

        // after the timeout, round 3 supersedes and round 2 inherits the
        // round 1 answer
        let late = 20 + TIMEOUT + 1;
        aggregator.submit(&ctx(late), ORACLE1, 3, int(300)).unwrap();
        let round2 = aggregator.round_data(2).unwrap();
        assert_eq!(round2.answer, int(101));
        assert_eq!(round2.answered_in_round, 1);
    }
}
