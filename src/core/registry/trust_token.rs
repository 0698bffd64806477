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

//! Trust token (ETT) registry: non-fungible sustainability certificates
//! minted against verified deliveries.
//!
//! Per-owner balances and a per-score histogram are kept next to the tokens
//! and updated in the same transaction, so both reads are a single key.

use crate::core::{
    clock::SharedClock,
    config::TierPolicy,
    error::{check_score, LedgerError, LedgerResult, TxResult},
    events::{EventBus, LedgerEvent},
    registry::{delivery::DeliveryVerifier, read},
    state::persistent_state::{KvOp, PersistentState, StateTx},
    types::{
        decode_value, id_key, str_key, CodecError, LevelDistribution, NewTrustToken, Principal,
        ScoreHistogram, TrustTier, TrustToken,
    },
};
use tracing::{info, warn};

const TOKEN_PREFIX: &[u8] = b"ett/t/";
const APPROVAL_PREFIX: &[u8] = b"ett/a/";
const BALANCE_PREFIX: &[u8] = b"ett/b/";
const SEQ_KEY: &[u8] = b"ett/seq";
const SCORES_KEY: &[u8] = b"ett/scores";

/// Registry policy.
#[derive(Clone, Debug)]
pub struct TrustTokenSettings {
    /// Only principal allowed to update trust scores.
    pub admin: Principal,
    /// Tier cutoffs for [`TrustTokenRegistry::get_level_distribution`].
    pub tiers: TierPolicy,
    /// Validity applied when the caller passes 0.
    pub default_validity_secs: u64,
}

/// ETT registry.
pub struct TrustTokenRegistry<V: DeliveryVerifier> {
    state: PersistentState,
    deliveries: V,
    clock: SharedClock,
    events: EventBus,
    settings: TrustTokenSettings,
}

fn balance_key(owner: &Principal) -> Vec<u8> {
    str_key(BALANCE_PREFIX, owner.as_str())
}

fn balance_op(owner: &Principal, balance: u64) -> Result<KvOp, CodecError> {
    match balance {
        0 => Ok(KvOp::Del {
            key: balance_key(owner),
        }),
        n => KvOp::put(balance_key(owner), &n),
    }
}

fn load_in(tx: &StateTx<'_>, token_id: u64) -> TxResult<TrustToken> {
    read(tx, &id_key(TOKEN_PREFIX, token_id))?
        .ok_or_else(|| LedgerError::not_found(format!("trust token {token_id}")).into())
}

impl<V: DeliveryVerifier> TrustTokenRegistry<V> {
    /// New registry; `deliveries` is consulted read-only before every mint.
    pub fn new(
        state: PersistentState,
        deliveries: V,
        clock: SharedClock,
        events: EventBus,
        settings: TrustTokenSettings,
    ) -> Self {
        Self {
            state,
            deliveries,
            clock,
            events,
            settings,
        }
    }

    /// Registry policy.
    pub fn settings(&self) -> &TrustTokenSettings {
        &self.settings
    }

    fn load(&self, token_id: u64) -> LedgerResult<TrustToken> {
        match self.state.get(&id_key(TOKEN_PREFIX, token_id))? {
            Some(raw) => Ok(decode_value(&raw)?),
            None => Err(LedgerError::not_found(format!("trust token {token_id}"))),
        }
    }

    fn get_or<T: serde::de::DeserializeOwned>(&self, key: &[u8], default: T) -> LedgerResult<T> {
        match self.state.get(key)? {
            Some(raw) => Ok(decode_value(&raw)?),
            None => Ok(default),
        }
    }

    /// Mint a token for a verified route.
    ///
    /// Records are never deleted, so the route check stays valid for the
    /// transaction that allocates the id.
    pub fn create_ett(&self, caller: &Principal, input: NewTrustToken) -> LedgerResult<TrustToken> {
        if !self.deliveries.is_verified(&input.route_id)? {
            warn!(route_id = %input.route_id, %caller, "ETT mint for unverified route rejected");
            return Err(LedgerError::Referential(format!(
                "delivery must be verified: {}",
                input.route_id
            )));
        }
        check_score("trust_score", input.trust_score)?;
        check_score("sustainability_rating", input.sustainability_rating)?;
        if input.recipient.is_blank() {
            return Err(LedgerError::validation("recipient must not be empty"));
        }

        let now = self.clock.now_ms();
        let validity_secs = match input.validity_period_secs {
            0 => self.settings.default_validity_secs,
            s => s,
        };
        let valid_until_ms = validity_secs
            .checked_mul(1000)
            .and_then(|ms| now.checked_add(ms))
            .ok_or_else(|| LedgerError::validation("validity period out of range"))?;

        let token = self.state.transact(|tx| -> TxResult<TrustToken> {
            let token_id = read::<u64>(tx, SEQ_KEY)?
                .unwrap_or(0)
                .checked_add(1)
                .ok_or_else(|| LedgerError::resource_limit("token id space exhausted"))?;
            let mut scores = read::<ScoreHistogram>(tx, SCORES_KEY)?.unwrap_or_default();
            scores.record(input.trust_score);
            let balance = read::<u64>(tx, &balance_key(&input.recipient))?
                .unwrap_or(0)
                .saturating_add(1);

            let token = TrustToken {
                token_id,
                route_id: input.route_id.clone(),
                owner: input.recipient.clone(),
                trust_score: input.trust_score,
                carbon_impact_grams: input.carbon_impact_grams,
                sustainability_rating: input.sustainability_rating,
                minted_at_ms: now,
                valid_until_ms,
                active: true,
            };
            tx.apply(&[
                KvOp::put(id_key(TOKEN_PREFIX, token_id), &token)?,
                KvOp::put(SEQ_KEY.to_vec(), &token_id)?,
                KvOp::put(SCORES_KEY.to_vec(), &scores)?,
                balance_op(&token.owner, balance)?,
            ])?;
            Ok(token)
        })?;

        info!(token_id = token.token_id, route_id = %token.route_id, owner = %token.owner, "ETT minted");
        self.events.emit(LedgerEvent::EttCreated {
            token_id: token.token_id,
            route_id: token.route_id.clone(),
            trust_score: token.trust_score,
        });
        Ok(token)
    }

    /// Move a token from `from` to `to`. `caller` must be the owner or its approved delegate.
    ///
    /// Any approval is cleared; no token field other than `owner` changes.
    pub fn transfer_from(
        &self,
        caller: &Principal,
        from: &Principal,
        to: &Principal,
        token_id: u64,
    ) -> LedgerResult<TrustToken> {
        let res = self.state.transact(|tx| -> TxResult<TrustToken> {
            let mut token = load_in(tx, token_id)?;
            if &token.owner != from {
                return Err(LedgerError::unauthorized(format!(
                    "{from} does not own trust token {token_id}"
                ))
                .into());
            }
            let approved: Option<Principal> = read(tx, &id_key(APPROVAL_PREFIX, token_id))?;
            if caller != &token.owner && approved.as_ref() != Some(caller) {
                return Err(LedgerError::unauthorized(format!(
                    "{caller} may not transfer trust token {token_id}"
                ))
                .into());
            }
            if to.is_blank() {
                return Err(LedgerError::validation("transfer target must not be empty").into());
            }

            let mut ops = Vec::with_capacity(4);
            if from != to {
                let from_balance = read::<u64>(tx, &balance_key(from))?
                    .unwrap_or(0)
                    .saturating_sub(1);
                let to_balance = read::<u64>(tx, &balance_key(to))?
                    .unwrap_or(0)
                    .saturating_add(1);
                ops.push(balance_op(from, from_balance)?);
                ops.push(balance_op(to, to_balance)?);
            }
            token.owner = to.clone();
            ops.push(KvOp::put(id_key(TOKEN_PREFIX, token_id), &token)?);
            ops.push(KvOp::Del {
                key: id_key(APPROVAL_PREFIX, token_id),
            });
            tx.apply(&ops)?;
            Ok(token)
        });
        let token = match res {
            Err(e @ LedgerError::Authorization(_)) => {
                warn!(token_id, %caller, "unauthorized ETT transfer rejected");
                return Err(e);
            }
            other => other?,
        };

        self.events.emit(LedgerEvent::EttTransferred {
            token_id,
            from: from.clone(),
            to: to.clone(),
        });
        Ok(token)
    }

    /// Owner grants `delegate` the right to transfer `token_id` once.
    pub fn approve(
        &self,
        caller: &Principal,
        token_id: u64,
        delegate: &Principal,
    ) -> LedgerResult<()> {
        self.state.transact(|tx| -> TxResult<()> {
            let token = load_in(tx, token_id)?;
            if caller != &token.owner {
                return Err(LedgerError::unauthorized(format!(
                    "only the owner may approve trust token {token_id}"
                ))
                .into());
            }
            if delegate.is_blank() || delegate == &token.owner {
                return Err(LedgerError::validation(
                    "delegate must be a non-empty principal other than the owner",
                )
                .into());
            }
            tx.apply(&[KvOp::put(id_key(APPROVAL_PREFIX, token_id), delegate)?])?;
            Ok(())
        })?;
        info!(token_id, %delegate, "ETT approval granted");
        Ok(())
    }

    /// Current approved delegate of an existing token.
    pub fn get_approved(&self, token_id: u64) -> LedgerResult<Option<Principal>> {
        self.state.transact(|tx| -> TxResult<Option<Principal>> {
            load_in(tx, token_id)?;
            read(tx, &id_key(APPROVAL_PREFIX, token_id))
        })
    }

    /// Administrator-only score change.
    pub fn update_trust_score(
        &self,
        caller: &Principal,
        token_id: u64,
        new_score: u32,
    ) -> LedgerResult<TrustToken> {
        if caller != &self.settings.admin {
            warn!(%caller, token_id, "trust score update by non-admin rejected");
            return Err(LedgerError::unauthorized(
                "only the trust administrator may update trust scores",
            ));
        }
        check_score("trust_score", new_score)?;

        let (token, old_score) = self.state.transact(|tx| -> TxResult<(TrustToken, u32)> {
            let mut token = load_in(tx, token_id)?;
            let old_score = token.trust_score;
            let mut scores = read::<ScoreHistogram>(tx, SCORES_KEY)?.unwrap_or_default();
            scores.forget(old_score);
            scores.record(new_score);
            token.trust_score = new_score;
            tx.apply(&[
                KvOp::put(id_key(TOKEN_PREFIX, token_id), &token)?,
                KvOp::put(SCORES_KEY.to_vec(), &scores)?,
            ])?;
            Ok((token, old_score))
        })?;

        self.events.emit(LedgerEvent::TrustScoreUpdated {
            token_id,
            old_score,
            new_score,
        });
        Ok(token)
    }

    /// Stored token; `NotFound` if never minted.
    pub fn get_ett_data(&self, token_id: u64) -> LedgerResult<TrustToken> {
        self.load(token_id)
    }

    /// `active && now <= valid_until`.
    pub fn is_valid_ett(&self, token_id: u64) -> LedgerResult<bool> {
        Ok(self.load(token_id)?.is_valid_at(self.clock.now_ms()))
    }

    /// Number of tokens ever minted.
    pub fn get_total_etts(&self) -> LedgerResult<u64> {
        self.get_or(SEQ_KEY, 0)
    }

    /// Tokens currently held by `owner`.
    pub fn balance_of(&self, owner: &Principal) -> LedgerResult<u64> {
        self.get_or(&balance_key(owner), 0)
    }

    /// Tier of a token under the configured cutoffs.
    pub fn tier_of(&self, token_id: u64) -> LedgerResult<TrustTier> {
        Ok(self.settings.tiers.tier_for(self.load(token_id)?.trust_score))
    }

    /// Tokens bucketed by trust tier.
    pub fn get_level_distribution(&self) -> LedgerResult<LevelDistribution> {
        let scores: ScoreHistogram = self.get_or(SCORES_KEY, ScoreHistogram::default())?;
        let mut dist = LevelDistribution::default();
        for (score, n) in scores.iter() {
            dist.add_many(self.settings.tiers.tier_for(score), n);
        }
        Ok(dist)
    }
}
