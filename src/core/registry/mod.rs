#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Ledger registries. Trust tokens and carbon credits only read from the delivery ledger.

pub mod authorization;
pub mod carbon_credit;
pub mod delivery;
pub mod trust_token;

use crate::core::error::TxResult;
use crate::core::state::persistent_state::StateTx;
use crate::core::types::decode_value;
use serde::de::DeserializeOwned;

/// Decode the value at `key` as seen by `tx`.
pub(crate) fn read<T: DeserializeOwned>(tx: &StateTx<'_>, key: &[u8]) -> TxResult<Option<T>> {
    match tx.get(key)? {
        Some(raw) => Ok(Some(decode_value(&raw)?)),
        None => Ok(None),
    }
}
