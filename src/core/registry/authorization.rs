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

//! Owner-managed allow-list of principals permitted to record deliveries.
//!
//! The owner is enrolled at genesis and can never be revoked.

use crate::core::{
    clock::SharedClock,
    error::{LedgerError, LedgerResult, TxResult},
    events::{EventBus, LedgerEvent},
    registry::read,
    state::persistent_state::{KvOp, PersistentState, StateTx},
    types::{decode_value, str_key, Principal},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const OWNER_KEY: &[u8] = b"auth/owner";
const COUNT_KEY: &[u8] = b"auth/count";
const VERIFIER_PREFIX: &[u8] = b"auth/v/";

/// Authorization capability consumed by the delivery ledger.
///
/// The `*_in` variants read through a running transaction so a write can
/// check its caller against the same snapshot it commits on.
pub trait AuthorizationPolicy: Send + Sync {
    /// Ledger owner.
    fn owner(&self) -> &Principal;
    /// True if `principal` may record deliveries.
    fn is_authorized(&self, principal: &Principal) -> LedgerResult<bool>;
    /// [`AuthorizationPolicy::is_authorized`] inside `tx`.
    fn is_authorized_in(&self, tx: &StateTx<'_>, principal: &Principal) -> TxResult<bool>;
    /// Add `principal`. Returns false if it was already present.
    fn authorize(&self, caller: &Principal, principal: &Principal) -> LedgerResult<bool>;
    /// Remove `principal`. Returns false if it was not present.
    fn revoke(&self, caller: &Principal, principal: &Principal) -> LedgerResult<bool>;
    /// Current verifier set, sorted. Fails past the scan budget.
    fn verifiers(&self) -> LedgerResult<Vec<Principal>>;
    /// Up to `limit` verifiers sorted after `after`.
    fn verifiers_page(
        &self,
        after: Option<&Principal>,
        limit: usize,
    ) -> LedgerResult<Vec<Principal>>;
    /// Size of the verifier set.
    fn verifier_count(&self) -> LedgerResult<u64>;
    /// [`AuthorizationPolicy::verifier_count`] inside `tx`.
    fn verifier_count_in(&self, tx: &StateTx<'_>) -> TxResult<u64>;
}

/// Stored allow-list entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierEntry {
    /// Authorized principal.
    pub principal: Principal,
    /// Who added it.
    pub added_by: Principal,
    /// When (ms).
    pub added_at_ms: u64,
}

/// sled-backed [`AuthorizationPolicy`].
#[derive(Clone)]
pub struct VerifierSet {
    state: PersistentState,
    owner: Principal,
    clock: SharedClock,
    events: EventBus,
    max_scan: usize,
}

fn verifier_key(p: &Principal) -> Vec<u8> {
    str_key(VERIFIER_PREFIX, p.as_str())
}

fn principals(pairs: &[(Vec<u8>, Vec<u8>)]) -> LedgerResult<Vec<Principal>> {
    pairs
        .iter()
        .map(|(_, v)| -> LedgerResult<Principal> {
            let e: VerifierEntry = decode_value(v)?;
            Ok(e.principal)
        })
        .collect()
}

impl VerifierSet {
    /// Open the set, running genesis on an empty store.
    ///
    /// Fails if the store was created with a different owner.
    pub fn open(
        state: PersistentState,
        owner: Principal,
        clock: SharedClock,
        events: EventBus,
        max_scan: usize,
    ) -> LedgerResult<Self> {
        if owner.is_blank() {
            return Err(LedgerError::Config("ledger owner must not be empty".into()));
        }
        let now = clock.now_ms();
        let stored = state.transact(|tx| -> TxResult<Option<Principal>> {
            let stored: Option<Principal> = read(tx, OWNER_KEY)?;
            if stored.is_none() {
                let entry = VerifierEntry {
                    principal: owner.clone(),
                    added_by: owner.clone(),
                    added_at_ms: now,
                };
                tx.apply(&[
                    KvOp::put(OWNER_KEY.to_vec(), &owner)?,
                    KvOp::put(verifier_key(&owner), &entry)?,
                    KvOp::put(COUNT_KEY.to_vec(), &1u64)?,
                ])?;
            }
            Ok(stored)
        })?;
        match stored {
            Some(stored) if stored != owner => {
                return Err(LedgerError::Config(format!(
                    "configured owner {owner} does not match ledger owner {stored}"
                )));
            }
            Some(_) => {}
            None => info!(%owner, "verifier set genesis"),
        }
        Ok(Self {
            state,
            owner,
            clock,
            events,
            max_scan,
        })
    }

    fn require_owner(&self, caller: &Principal) -> LedgerResult<()> {
        if caller != &self.owner {
            warn!(%caller, "verifier management by non-owner rejected");
            return Err(LedgerError::unauthorized(
                "only the ledger owner may manage verifiers",
            ));
        }
        Ok(())
    }

    /// Stored entry for `principal`.
    pub fn entry(&self, principal: &Principal) -> LedgerResult<Option<VerifierEntry>> {
        match self.state.get(&verifier_key(principal))? {
            Some(raw) => Ok(Some(decode_value(&raw)?)),
            None => Ok(None),
        }
    }
}

impl AuthorizationPolicy for VerifierSet {
    fn owner(&self) -> &Principal {
        &self.owner
    }

    fn is_authorized(&self, principal: &Principal) -> LedgerResult<bool> {
        if principal == &self.owner {
            return Ok(true);
        }
        Ok(self.state.contains(&verifier_key(principal))?)
    }

    fn is_authorized_in(&self, tx: &StateTx<'_>, principal: &Principal) -> TxResult<bool> {
        if principal == &self.owner {
            return Ok(true);
        }
        Ok(tx.contains(&verifier_key(principal))?)
    }

    fn authorize(&self, caller: &Principal, principal: &Principal) -> LedgerResult<bool> {
        self.require_owner(caller)?;
        if principal.is_blank() {
            return Err(LedgerError::validation("verifier principal must not be empty"));
        }
        let key = verifier_key(principal);
        let now = self.clock.now_ms();
        let added = self.state.transact(|tx| -> TxResult<bool> {
            if tx.contains(&key)? {
                return Ok(false);
            }
            let count = self.verifier_count_in(tx)?.saturating_add(1);
            let entry = VerifierEntry {
                principal: principal.clone(),
                added_by: caller.clone(),
                added_at_ms: now,
            };
            tx.apply(&[
                KvOp::put(key.clone(), &entry)?,
                KvOp::put(COUNT_KEY.to_vec(), &count)?,
            ])?;
            Ok(true)
        })?;
        if added {
            self.events.emit(LedgerEvent::VerifierAuthorized {
                principal: principal.clone(),
            });
        }
        Ok(added)
    }

    fn revoke(&self, caller: &Principal, principal: &Principal) -> LedgerResult<bool> {
        self.require_owner(caller)?;
        if principal == &self.owner {
            return Err(LedgerError::validation("the ledger owner cannot be revoked"));
        }
        let key = verifier_key(principal);
        let removed = self.state.transact(|tx| -> TxResult<bool> {
            if !tx.contains(&key)? {
                return Ok(false);
            }
            let count = self.verifier_count_in(tx)?.saturating_sub(1);
            tx.apply(&[
                KvOp::Del { key: key.clone() },
                KvOp::put(COUNT_KEY.to_vec(), &count)?,
            ])?;
            Ok(true)
        })?;
        if removed {
            self.events.emit(LedgerEvent::VerifierRevoked {
                principal: principal.clone(),
            });
        }
        Ok(removed)
    }

    fn verifiers(&self) -> LedgerResult<Vec<Principal>> {
        principals(&self.state.scan_prefix(VERIFIER_PREFIX, self.max_scan)?)
    }

    fn verifiers_page(
        &self,
        after: Option<&Principal>,
        limit: usize,
    ) -> LedgerResult<Vec<Principal>> {
        let after = after.map(verifier_key);
        let pairs = self.state.scan_page(
            VERIFIER_PREFIX,
            after.as_deref(),
            limit.min(self.max_scan),
        )?;
        principals(&pairs)
    }

    fn verifier_count(&self) -> LedgerResult<u64> {
        match self.state.get(COUNT_KEY)? {
            Some(raw) => Ok(decode_value(&raw)?),
            None => Ok(0),
        }
    }

    fn verifier_count_in(&self, tx: &StateTx<'_>) -> TxResult<u64> {
        Ok(read(tx, COUNT_KEY)?.unwrap_or(0))
    }
}
