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

//! Ledger record types and canonical encoding helpers.

use bincode::Options;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Upper bound for any single persisted value.
pub const MAX_VALUE_BYTES: usize = 64 * 1024;

/// Milliseconds in one (365-day) year.
pub const MS_PER_YEAR: u64 = 365 * 24 * 60 * 60 * 1000;

/// Canonical serialization error.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialization")]
    Serialize,
    #[error("deserialization")]
    Deserialize,
    #[error("size limit exceeded")]
    TooLarge,
}

/// Canonical bincode options (deterministic).
fn bincode_opts() -> impl Options {
    // Fixint encoding provides a stable integer representation.
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Encode with deterministic rules.
pub fn encode_canonical<T: Serialize>(v: &T) -> Result<Vec<u8>, CodecError> {
    bincode_opts()
        .serialize(v)
        .map_err(|_| CodecError::Serialize)
}

/// Decode with a hard size cap.
pub fn decode_canonical_limited<T: DeserializeOwned>(
    bytes: &[u8],
    max: usize,
) -> Result<T, CodecError> {
    if bytes.len() > max {
        return Err(CodecError::TooLarge);
    }
    // Cap inside the deserializer too, so length prefixes cannot force huge allocations.
    bincode_opts()
        .with_limit(max as u64)
        .deserialize(bytes)
        .map_err(|_| CodecError::Deserialize)
}

/// Decode a persisted value using the default value cap.
pub fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    decode_canonical_limited(bytes, MAX_VALUE_BYTES)
}

/// Caller identity attached to every write.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Principal(pub String);

impl Principal {
    /// Build a principal from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identifier is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Verified outcome of one optimized route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Unique route key.
    pub route_id: String,
    /// Vehicle that ran the route.
    pub vehicle_id: String,
    /// Avoided emissions in grams CO2e.
    pub carbon_saved_grams: u64,
    /// Cost saving in cents.
    pub cost_saved_cents: u64,
    /// Distance driven in meters.
    pub distance_meters: u64,
    /// Route optimization score (0..=100).
    pub optimization_score: u32,
    /// Number of drops on the route (>= 1).
    pub delivery_count: u32,
    /// Hash of the off-ledger verification evidence.
    pub verification_hash: String,
    /// Hash of the off-ledger route metadata.
    pub metadata_hash: String,
    /// Always true once stored.
    pub verified: bool,
    /// Commit time (ms since UNIX epoch).
    pub created_at_ms: u64,
    /// Verifier that recorded the delivery.
    pub recorded_by: Principal,
}

/// Input for [`crate::core::registry::delivery::DeliveryLedger::add_delivery_record`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewDelivery {
    /// Unique route key.
    pub route_id: String,
    /// Vehicle that ran the route.
    pub vehicle_id: String,
    /// Avoided emissions in grams CO2e.
    pub carbon_saved_grams: u64,
    /// Cost saving in cents.
    pub cost_saved_cents: u64,
    /// Distance driven in meters.
    pub distance_meters: u64,
    /// Route optimization score, must be within 0..=100.
    pub optimization_score: u32,
    /// Number of drops on the route, must be positive.
    pub delivery_count: u32,
    /// Hash of the off-ledger verification evidence.
    pub verification_hash: String,
    /// Hash of the off-ledger route metadata.
    pub metadata_hash: String,
}

/// Network-wide aggregate over every stored delivery.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatistics {
    /// Sum of `carbon_saved_grams`.
    pub total_carbon_saved: u64,
    /// Sum of `cost_saved_cents`.
    pub total_cost_saved: u64,
    /// Number of stored deliveries.
    pub total_deliveries: u64,
    /// Sum of `distance_meters`.
    pub total_distance: u64,
    /// Floor of the mean optimization score.
    pub average_optimization_score: u64,
    /// Size of the verifier set (owner included).
    pub total_verifiers: u64,
}

/// Persisted running totals behind [`NetworkStatistics`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTotals {
    /// Sum of carbon saved.
    pub carbon_saved: u64,
    /// Sum of cost saved.
    pub cost_saved: u64,
    /// Delivery record count.
    pub deliveries: u64,
    /// Sum of distance.
    pub distance: u64,
    /// Sum of optimization scores.
    pub score_sum: u64,
}

impl DeliveryTotals {
    /// Fold one record into the totals; `None` on overflow.
    pub fn checked_apply(&self, d: &NewDelivery) -> Option<Self> {
        Some(Self {
            carbon_saved: self.carbon_saved.checked_add(d.carbon_saved_grams)?,
            cost_saved: self.cost_saved.checked_add(d.cost_saved_cents)?,
            deliveries: self.deliveries.checked_add(1)?,
            distance: self.distance.checked_add(d.distance_meters)?,
            score_sum: self.score_sum.checked_add(u64::from(d.optimization_score))?,
        })
    }

    /// Integer mean score (0 when empty).
    pub fn average_score(&self) -> u64 {
        if self.deliveries == 0 {
            0
        } else {
            self.score_sum / self.deliveries
        }
    }
}

/// Non-fungible sustainability certificate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustToken {
    /// Sequential id, starting at 1.
    pub token_id: u64,
    /// Verified route the token attests to.
    pub route_id: String,
    /// Current holder.
    pub owner: Principal,
    /// Trust score (0..=100).
    pub trust_score: u32,
    /// Carbon impact in grams.
    pub carbon_impact_grams: u64,
    /// Sustainability rating (0..=100).
    pub sustainability_rating: u32,
    /// Mint time (ms).
    pub minted_at_ms: u64,
    /// Expiry (ms).
    pub valid_until_ms: u64,
    /// Set at mint.
    pub active: bool,
}

impl TrustToken {
    /// `active && now <= valid_until`.
    pub fn is_valid_at(&self, now_ms: u64) -> bool {
        self.active && now_ms <= self.valid_until_ms
    }
}

/// Input for minting a trust token.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewTrustToken {
    /// Route the token attests to.
    pub route_id: String,
    /// Initial owner.
    pub recipient: Principal,
    /// Trust score (0..=100).
    pub trust_score: u32,
    /// Carbon impact in grams.
    pub carbon_impact_grams: u64,
    /// Sustainability rating (0..=100).
    pub sustainability_rating: u32,
    /// Validity in seconds; 0 selects the configured default.
    pub validity_period_secs: u64,
}

/// Trust-score grade, best first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TrustTier {
    /// Top grade.
    Platinum,
    /// Second grade.
    Gold,
    /// Third grade.
    Silver,
    /// Everything below silver.
    Bronze,
}

/// Count of trust tokens per tier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDistribution {
    /// Platinum tokens.
    pub platinum: u64,
    /// Gold tokens.
    pub gold: u64,
    /// Silver tokens.
    pub silver: u64,
    /// Bronze tokens.
    pub bronze: u64,
}

impl LevelDistribution {
    /// Count `n` tokens in `tier`.
    pub fn add_many(&mut self, tier: TrustTier, n: u64) {
        let slot = match tier {
            TrustTier::Platinum => &mut self.platinum,
            TrustTier::Gold => &mut self.gold,
            TrustTier::Silver => &mut self.silver,
            TrustTier::Bronze => &mut self.bronze,
        };
        *slot = slot.saturating_add(n);
    }

    /// Sum over all tiers.
    pub fn total(&self) -> u64 {
        self.platinum + self.gold + self.silver + self.bronze
    }
}

/// Number of trust tokens holding each score in `0..=100`.
///
/// Kept per score rather than per tier so tier cutoffs can change between
/// restarts without rescanning tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreHistogram {
    counts: Vec<u64>,
}

impl Default for ScoreHistogram {
    fn default() -> Self {
        Self {
            counts: vec![0; 101],
        }
    }
}

impl ScoreHistogram {
    /// Count one token at `score`. Scores above 100 are ignored.
    pub fn record(&mut self, score: u32) {
        if let Some(slot) = self.counts.get_mut(score as usize) {
            *slot = slot.saturating_add(1);
        }
    }

    /// Drop one token from `score`.
    pub fn forget(&mut self, score: u32) {
        if let Some(slot) = self.counts.get_mut(score as usize) {
            *slot = slot.saturating_sub(1);
        }
    }

    /// `(score, count)` for every score with at least one token.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, n)| **n > 0)
            .map(|(score, n)| (score as u32, *n))
    }
}

/// Lowest accepted carbon credit quality grade.
pub const MIN_CREDIT_QUALITY: u8 = 1;
/// Highest accepted carbon credit quality grade.
pub const MAX_CREDIT_QUALITY: u8 = 5;

/// Carbon offset credit issued against a verified delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarbonCredit {
    /// Sequential id, starting at 1.
    pub credit_id: u64,
    /// Verified route backing the credit.
    pub route_id: String,
    /// Issued amount in grams.
    pub carbon_amount_grams: u64,
    /// Price per metric ton in cents.
    pub price_per_ton_cents: u64,
    /// Issue time (ms).
    pub issued_at_ms: u64,
    /// Expiry (ms).
    pub expires_at_ms: u64,
    /// Certification standard label.
    pub standard: String,
    /// Ordinal quality grade.
    pub quality: u8,
    /// Cumulative retired grams, never above `carbon_amount_grams`.
    pub retired_amount_grams: u64,
    /// Flipped on the first retirement.
    pub is_traded: bool,
    /// Number of retirements recorded against this credit.
    pub retirement_count: u64,
    /// Principal that issued the credit.
    pub issuer: Principal,
}

/// Retirement progress of a credit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditStatus {
    /// Nothing retired yet.
    Issued,
    /// Some, not all, retired.
    PartiallyRetired,
    /// Fully retired.
    FullyRetired,
}

impl CarbonCredit {
    /// Grams still available for retirement.
    pub fn remaining_grams(&self) -> u64 {
        self.carbon_amount_grams
            .saturating_sub(self.retired_amount_grams)
    }

    /// Derived from `retired_amount_grams`.
    pub fn status(&self) -> CreditStatus {
        if self.retired_amount_grams == 0 {
            CreditStatus::Issued
        } else if self.retired_amount_grams < self.carbon_amount_grams {
            CreditStatus::PartiallyRetired
        } else {
            CreditStatus::FullyRetired
        }
    }
}

/// Input for issuing a carbon credit.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewCarbonCredit {
    /// Verified route backing the credit.
    pub route_id: String,
    /// Amount in grams.
    pub carbon_amount_grams: u64,
    /// Price per metric ton in cents.
    pub price_per_ton_cents: u64,
    /// Lifetime in years.
    pub expiration_years: u32,
    /// Certification standard label.
    pub standard: String,
    /// Ordinal quality grade.
    pub quality: u8,
}

/// One persisted retirement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retirement {
    /// Credit retired from.
    pub credit_id: u64,
    /// Per-credit sequence, starting at 1.
    pub seq: u64,
    /// Retired grams.
    pub amount_grams: u64,
    /// Free-form reason.
    pub reason: String,
    /// Caller that retired.
    pub retired_by: Principal,
    /// Commit time (ms).
    pub retired_at_ms: u64,
}

/// Market-wide aggregate over issued credits.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStatistics {
    /// Number of issued credits.
    pub total_credits: u64,
    /// Sum of retired grams.
    pub total_retired: u64,
    /// Sum of issued grams.
    pub total_volume: u64,
    /// Floor of the mean price per ton (cents).
    pub average_price: u64,
}

/// Persisted running totals behind [`MarketStatistics`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketTotals {
    /// Issued credit count.
    pub credits: u64,
    /// Retired grams.
    pub retired: u64,
    /// Issued grams.
    pub volume: u64,
    /// Sum of per-credit prices.
    pub price_sum: u64,
}

impl MarketTotals {
    /// Fold one issuance into the totals; `None` on overflow.
    pub fn checked_issue(&self, grams: u64, price_per_ton: u64) -> Option<Self> {
        Some(Self {
            credits: self.credits.checked_add(1)?,
            retired: self.retired,
            volume: self.volume.checked_add(grams)?,
            price_sum: self.price_sum.checked_add(price_per_ton)?,
        })
    }

    /// Public view.
    pub fn statistics(&self) -> MarketStatistics {
        MarketStatistics {
            total_credits: self.credits,
            total_retired: self.retired,
            total_volume: self.volume,
            average_price: if self.credits == 0 {
                0
            } else {
                self.price_sum / self.credits
            },
        }
    }
}

/// Big-endian id encoding keeps sled prefix scans in id order.
pub fn id_key(prefix: &[u8], id: u64) -> Vec<u8> {
    let mut k = Vec::with_capacity(prefix.len() + 8);
    k.extend_from_slice(prefix);
    k.extend_from_slice(&id.to_be_bytes());
    k
}

/// Key for string-keyed records.
pub fn str_key(prefix: &[u8], id: &str) -> Vec<u8> {
    let mut k = Vec::with_capacity(prefix.len() + id.len());
    k.extend_from_slice(prefix);
    k.extend_from_slice(id.as_bytes());
    k
}
