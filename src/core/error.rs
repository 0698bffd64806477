// Copyright (c) 2026 QuantumEco
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Ledger error taxonomy.
//!
//! Every write checks its preconditions before or inside the transaction that
//! stages its effects, so any error returned from a write path means nothing
//! was committed.

use crate::core::state::persistent_state::{StateError, TxError};
use crate::core::types::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Ledger errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed or out-of-range input.
    #[error("validation: {0}")]
    Validation(String),
    /// Duplicate natural key on creation.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Caller lacks the required role.
    #[error("authorization: {0}")]
    Authorization(String),
    /// Referenced delivery missing or unverified.
    #[error("referential: {0}")]
    Referential(String),
    /// Requested id absent.
    #[error("not found: {0}")]
    NotFound(String),
    /// Balance or processing budget exceeded.
    #[error("resource limit: {0}")]
    ResourceLimit(String),
    /// Configuration rejected.
    #[error("config: {0}")]
    Config(String),
    /// Storage failure.
    #[error("storage: {0}")]
    Storage(StateError),
    /// Persisted value could not be encoded or decoded.
    #[error("codec: {0}")]
    Codec(#[from] CodecError),
    /// The write executor is no longer running.
    #[error("executor unavailable")]
    Unavailable,
}

impl From<StateError> for LedgerError {
    fn from(e: StateError) -> Self {
        match e {
            StateError::ScanLimit(max) => {
                LedgerError::ResourceLimit(format!("scan budget of {max} entries exceeded"))
            }
            other => LedgerError::Storage(other),
        }
    }
}

/// Result alias used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Result of a closure run inside [`crate::core::state::persistent_state::PersistentState::transact`].
pub type TxResult<T> = Result<T, TxError<LedgerError>>;

impl From<LedgerError> for TxError<LedgerError> {
    fn from(e: LedgerError) -> Self {
        TxError::Abort(e)
    }
}

impl From<CodecError> for TxError<LedgerError> {
    fn from(e: CodecError) -> Self {
        TxError::Abort(LedgerError::Codec(e))
    }
}

/// Discriminant of [`LedgerError`], stable for callers and metrics labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// See [`LedgerError::Validation`].
    Validation,
    /// See [`LedgerError::Conflict`].
    Conflict,
    /// See [`LedgerError::Authorization`].
    Authorization,
    /// See [`LedgerError::Referential`].
    Referential,
    /// See [`LedgerError::NotFound`].
    NotFound,
    /// See [`LedgerError::ResourceLimit`].
    ResourceLimit,
    /// Config, storage, codec or executor failure.
    Internal,
}

impl ErrorKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Referential => "referential",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ResourceLimit => "resource_limit",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LedgerError {
    /// Kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_) => ErrorKind::Validation,
            LedgerError::Conflict(_) => ErrorKind::Conflict,
            LedgerError::Authorization(_) => ErrorKind::Authorization,
            LedgerError::Referential(_) => ErrorKind::Referential,
            LedgerError::NotFound(_) => ErrorKind::NotFound,
            LedgerError::ResourceLimit(_) => ErrorKind::ResourceLimit,
            LedgerError::Config(_)
            | LedgerError::Storage(_)
            | LedgerError::Codec(_)
            | LedgerError::Unavailable => ErrorKind::Internal,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation(msg.into())
    }

    pub(crate) fn unauthorized(msg: impl Into<String>) -> Self {
        LedgerError::Authorization(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        LedgerError::NotFound(msg.into())
    }

    pub(crate) fn resource_limit(msg: impl Into<String>) -> Self {
        LedgerError::ResourceLimit(msg.into())
    }
}

/// Reject a score outside `0..=100`; never clamps.
pub(crate) fn check_score(field: &str, value: u32) -> LedgerResult<()> {
    if value > 100 {
        return Err(LedgerError::validation(format!(
            "{field} must be within 0..=100, got {value}"
        )));
    }
    Ok(())
}
