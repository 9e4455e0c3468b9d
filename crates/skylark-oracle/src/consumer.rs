// Copyright (c) 2025 Skylark Labs, Inc.
//
// All rights reserved.

//! Consumer callback interfaces.
//!
//! Hosts implement these traits to receive fulfillment data. Callbacks run
//! synchronously inside the fulfillment transition; a callback error is
//! captured and reported as `success = false` on the fulfillment event so
//! that fee settlement and oracle payment are never blocked by consumer-side
//! failures.

use alloy_primitives::{B256, I256, U256};
use thiserror::Error;

use crate::types::RequestId;

/// Failure surfaced by a consumer callback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("consumer callback failed: {0}")]
pub struct CallbackError(pub String);

/// Receiver of randomness fulfillments.
pub trait RandomnessConsumer {
    fn raw_fulfill_random_words(
        &mut self,
        request_id: RequestId,
        random_words: &[U256],
    ) -> Result<(), CallbackError>;
}

/// Receiver of typed data-request fulfillments, one entry point per job type.
pub trait DataConsumer {
    fn raw_fulfill_data_request_uint128(
        &mut self,
        request_id: RequestId,
        response: u128,
    ) -> Result<(), CallbackError>;

    fn raw_fulfill_data_request_int256(
        &mut self,
        request_id: RequestId,
        response: I256,
    ) -> Result<(), CallbackError>;

    fn raw_fulfill_data_request_bool(
        &mut self,
        request_id: RequestId,
        response: bool,
    ) -> Result<(), CallbackError>;

    fn raw_fulfill_data_request_string(
        &mut self,
        request_id: RequestId,
        response: &str,
    ) -> Result<(), CallbackError>;

    fn raw_fulfill_data_request_bytes32(
        &mut self,
        request_id: RequestId,
        response: B256,
    ) -> Result<(), CallbackError>;

    fn raw_fulfill_data_request_bytes(
        &mut self,
        request_id: RequestId,
        response: &[u8],
    ) -> Result<(), CallbackError>;
}
