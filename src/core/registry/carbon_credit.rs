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

//! Carbon credit registry: issue and retire offset credits backed by
//! verified deliveries.
//!
//! `retired_amount_grams` only grows and never exceeds `carbon_amount_grams`.
//! Any retirement, partial or full, marks the credit as traded.

use crate::core::{
    clock::SharedClock,
    error::{LedgerError, LedgerResult, TxResult},
    events::{EventBus, LedgerEvent},
    registry::{
        delivery::{DeliveryVerifier, MAX_FIELD_LEN},
        read,
    },
    state::persistent_state::{KvOp, PersistentState, StateTx},
    types::{
        decode_value, id_key, CarbonCredit, MarketStatistics, MarketTotals, NewCarbonCredit,
        Principal, Retirement, MAX_CREDIT_QUALITY, MIN_CREDIT_QUALITY, MS_PER_YEAR,
    },
};
use tracing::{debug, info, warn};

const CREDIT_PREFIX: &[u8] = b"cc/c/";
const RETIREMENT_PREFIX: &[u8] = b"cc/r/";
const SEQ_KEY: &[u8] = b"cc/seq";
const MARKET_KEY: &[u8] = b"cc/market";

/// Longest accepted retirement reason, in bytes.
pub const MAX_REASON_LEN: usize = 1024;

/// Registry policy.
#[derive(Clone, Debug)]
pub struct CarbonCreditSettings {
    /// Smallest issuable amount in grams.
    pub min_credit_grams: u64,
    /// Longest lifetime in years.
    pub max_credit_years: u32,
    /// Scan budget.
    pub max_scan_entries: usize,
}

fn retirement_key(credit_id: u64, seq: u64) -> Vec<u8> {
    let mut k = id_key(RETIREMENT_PREFIX, credit_id);
    k.extend_from_slice(&seq.to_be_bytes());
    k
}

fn load_in(tx: &StateTx<'_>, credit_id: u64) -> TxResult<CarbonCredit> {
    read(tx, &id_key(CREDIT_PREFIX, credit_id))?
        .ok_or_else(|| LedgerError::not_found(format!("carbon credit {credit_id}")).into())
}

/// Carbon credit registry.
pub struct CarbonCreditRegistry<V: DeliveryVerifier> {
    state: PersistentState,
    deliveries: V,
    clock: SharedClock,
    events: EventBus,
    settings: CarbonCreditSettings,
}

impl<V: DeliveryVerifier> CarbonCreditRegistry<V> {
    /// New registry; `deliveries` is consulted read-only before every issuance.
    pub fn new(
        state: PersistentState,
        deliveries: V,
        clock: SharedClock,
        events: EventBus,
        settings: CarbonCreditSettings,
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
    pub fn settings(&self) -> &CarbonCreditSettings {
        &self.settings
    }

    fn load(&self, credit_id: u64) -> LedgerResult<CarbonCredit> {
        match self.state.get(&id_key(CREDIT_PREFIX, credit_id))? {
            Some(raw) => Ok(decode_value(&raw)?),
            None => Err(LedgerError::not_found(format!("carbon credit {credit_id}"))),
        }
    }

    fn last_id(&self) -> LedgerResult<u64> {
        match self.state.get(SEQ_KEY)? {
            Some(raw) => Ok(decode_value(&raw)?),
            None => Ok(0),
        }
    }

    fn market(&self) -> LedgerResult<MarketTotals> {
        match self.state.get(MARKET_KEY)? {
            Some(raw) => Ok(decode_value(&raw)?),
            None => Ok(MarketTotals::default()),
        }
    }

    /// Issue a credit against a verified route.
    pub fn issue_carbon_credit(
        &self,
        caller: &Principal,
        input: NewCarbonCredit,
    ) -> LedgerResult<CarbonCredit> {
        if !self.deliveries.is_verified(&input.route_id)? {
            warn!(route_id = %input.route_id, %caller, "credit issuance for unverified route rejected");
            return Err(LedgerError::Referential(format!(
                "delivery must be verified: {}",
                input.route_id
            )));
        }
        if input.carbon_amount_grams < self.settings.min_credit_grams {
            return Err(LedgerError::validation(format!(
                "carbon amount {} g is below the minimum of {} g",
                input.carbon_amount_grams, self.settings.min_credit_grams
            )));
        }
        if input.expiration_years == 0 || input.expiration_years > self.settings.max_credit_years
        {
            return Err(LedgerError::validation(format!(
                "expiration_years must be within 1..={}",
                self.settings.max_credit_years
            )));
        }
        if input.standard.trim().is_empty() || input.standard.len() > MAX_FIELD_LEN {
            return Err(LedgerError::validation(
                "standard must be a non-empty label of at most 256 bytes",
            ));
        }
        if !(MIN_CREDIT_QUALITY..=MAX_CREDIT_QUALITY).contains(&input.quality) {
            return Err(LedgerError::validation(format!(
                "quality must be within {MIN_CREDIT_QUALITY}..={MAX_CREDIT_QUALITY}"
            )));
        }

        let now = self.clock.now_ms();
        let expires_at_ms = u64::from(input.expiration_years)
            .checked_mul(MS_PER_YEAR)
            .and_then(|ms| now.checked_add(ms))
            .ok_or_else(|| LedgerError::validation("expiration out of range"))?;

        let credit = self.state.transact(|tx| -> TxResult<CarbonCredit> {
            let market = read::<MarketTotals>(tx, MARKET_KEY)?
                .unwrap_or_default()
                .checked_issue(input.carbon_amount_grams, input.price_per_ton_cents)
                .ok_or_else(|| LedgerError::resource_limit("market aggregate overflow"))?;
            let credit_id = read::<u64>(tx, SEQ_KEY)?
                .unwrap_or(0)
                .checked_add(1)
                .ok_or_else(|| LedgerError::resource_limit("credit id space exhausted"))?;
            let credit = CarbonCredit {
                credit_id,
                route_id: input.route_id.clone(),
                carbon_amount_grams: input.carbon_amount_grams,
                price_per_ton_cents: input.price_per_ton_cents,
                issued_at_ms: now,
                expires_at_ms,
                standard: input.standard.clone(),
                quality: input.quality,
                retired_amount_grams: 0,
                is_traded: false,
                retirement_count: 0,
                issuer: caller.clone(),
            };
            tx.apply(&[
                KvOp::put(id_key(CREDIT_PREFIX, credit_id), &credit)?,
                KvOp::put(SEQ_KEY.to_vec(), &credit_id)?,
                KvOp::put(MARKET_KEY.to_vec(), &market)?,
            ])?;
            Ok(credit)
        })?;

        let credit_id = credit.credit_id;
        info!(
            credit_id,
            route_id = %credit.route_id,
            grams = credit.carbon_amount_grams,
            issuer = %caller,
            "carbon credit issued"
        );
        self.events.emit(LedgerEvent::CarbonCreditIssued {
            credit_id,
            route_id: credit.route_id.clone(),
            carbon_amount: credit.carbon_amount_grams,
        });
        Ok(credit)
    }

    /// Retire `amount` grams. Fails with `ResourceLimit` if that exceeds the remaining balance.
    pub fn retire_carbon_credit(
        &self,
        caller: &Principal,
        credit_id: u64,
        amount: u64,
        reason: &str,
    ) -> LedgerResult<CarbonCredit> {
        let now = self.clock.now_ms();
        let res = self.state.transact(|tx| -> TxResult<CarbonCredit> {
            let mut credit = load_in(tx, credit_id)?;
            if amount == 0 {
                return Err(LedgerError::validation("retirement amount must be positive").into());
            }
            if reason.len() > MAX_REASON_LEN {
                return Err(LedgerError::validation(format!(
                    "reason exceeds {MAX_REASON_LEN} bytes"
                ))
                .into());
            }
            let remaining = credit.remaining_grams();
            if amount > remaining {
                return Err(LedgerError::resource_limit(format!(
                    "retirement of {amount} g exceeds remaining balance of {remaining} g"
                ))
                .into());
            }

            let mut market = read::<MarketTotals>(tx, MARKET_KEY)?.unwrap_or_default();
            market.retired = market
                .retired
                .checked_add(amount)
                .ok_or_else(|| LedgerError::resource_limit("market aggregate overflow"))?;

            credit.retired_amount_grams += amount;
            credit.is_traded = true;
            credit.retirement_count += 1;
            let entry = Retirement {
                credit_id,
                seq: credit.retirement_count,
                amount_grams: amount,
                reason: reason.to_string(),
                retired_by: caller.clone(),
                retired_at_ms: now,
            };
            tx.apply(&[
                KvOp::put(id_key(CREDIT_PREFIX, credit_id), &credit)?,
                KvOp::put(retirement_key(credit_id, entry.seq), &entry)?,
                KvOp::put(MARKET_KEY.to_vec(), &market)?,
            ])?;
            Ok(credit)
        });
        let credit = match res {
            Err(e @ LedgerError::ResourceLimit(_)) => {
                warn!(credit_id, amount, error = %e, "over-retirement rejected");
                return Err(e);
            }
            other => other?,
        };

        info!(credit_id, amount, status = ?credit.status(), "carbon credit retired");
        self.events.emit(LedgerEvent::CarbonCreditRetired {
            credit_id,
            amount,
            reason: reason.to_string(),
        });
        Ok(credit)
    }

    /// Stored credit; `NotFound` if never issued.
    pub fn get_carbon_credit(&self, credit_id: u64) -> LedgerResult<CarbonCredit> {
        self.load(credit_id)
    }

    /// Number of credits ever issued.
    pub fn get_total_credits(&self) -> LedgerResult<u64> {
        self.last_id()
    }

    /// Market aggregates.
    pub fn get_market_statistics(&self) -> LedgerResult<MarketStatistics> {
        Ok(self.market()?.statistics())
    }

    /// Up to `limit` retirements of a credit with `seq > after_seq`, oldest first.
    pub fn get_retirements_page(
        &self,
        credit_id: u64,
        after_seq: u64,
        limit: usize,
    ) -> LedgerResult<Vec<Retirement>> {
        self.load(credit_id)?;
        let after = retirement_key(credit_id, after_seq);
        self.state
            .scan_page(
                &id_key(RETIREMENT_PREFIX, credit_id),
                Some(after.as_slice()),
                limit.min(self.settings.max_scan_entries),
            )?
            .iter()
            .map(|(_, v)| -> LedgerResult<Retirement> { Ok(decode_value(v)?) })
            .collect()
    }

    /// Retirement history of a credit, oldest first. Fails with
    /// `ResourceLimit` past the scan budget; use the paged form then.
    pub fn get_retirements(&self, credit_id: u64) -> LedgerResult<Vec<Retirement>> {
        self.load(credit_id)?;
        debug!(credit_id, "scanning retirements");
        self.state
            .scan_prefix(
                &id_key(RETIREMENT_PREFIX, credit_id),
                self.settings.max_scan_entries,
            )?
            .iter()
            .map(|(_, v)| -> LedgerResult<Retirement> { Ok(decode_value(v)?) })
            .collect()
    }
}
