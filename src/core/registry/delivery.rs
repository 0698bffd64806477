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

//! Append-only registry of verified delivery outcomes.
//!
//! Each accepted record and the network aggregates it contributes to are
//! committed in one transaction, so [`NetworkStatistics`] always equals the
//! fold over stored records. Records are never updated or deleted.

use crate::core::{
    clock::SharedClock,
    error::{check_score, LedgerError, LedgerResult, TxResult},
    events::{EventBus, LedgerEvent},
    registry::{authorization::AuthorizationPolicy, read},
    state::persistent_state::{KvOp, PersistentState},
    types::{
        decode_value, str_key, DeliveryRecord, DeliveryTotals, NetworkStatistics, NewDelivery,
        Principal,
    },
};
use tracing::{debug, info};

const DELIVERY_PREFIX: &[u8] = b"delivery/r/";
const TOTALS_KEY: &[u8] = b"delivery/totals";

/// Longest accepted identifier or hash string, in bytes.
pub const MAX_FIELD_LEN: usize = 256;

/// Storage key of a delivery record.
pub fn delivery_key(route_id: &str) -> Vec<u8> {
    str_key(DELIVERY_PREFIX, route_id)
}

/// Read-only oracle: has this route been verified?
pub trait DeliveryVerifier: Send + Sync {
    /// True iff a verified record exists for `route_id`.
    fn is_verified(&self, route_id: &str) -> LedgerResult<bool>;
}

/// Read-only view over stored delivery records.
#[derive(Clone)]
pub struct DeliveryView {
    state: PersistentState,
}

impl DeliveryView {
    /// View over `state`.
    pub fn new(state: PersistentState) -> Self {
        Self { state }
    }

    /// Stored record, if any.
    pub fn get(&self, route_id: &str) -> LedgerResult<Option<DeliveryRecord>> {
        match self.state.get(&delivery_key(route_id))? {
            Some(raw) => Ok(Some(decode_value(&raw)?)),
            None => Ok(None),
        }
    }

    /// Persisted running totals.
    pub fn totals(&self) -> LedgerResult<DeliveryTotals> {
        match self.state.get(TOTALS_KEY)? {
            Some(raw) => Ok(decode_value(&raw)?),
            None => Ok(DeliveryTotals::default()),
        }
    }
}

impl DeliveryVerifier for DeliveryView {
    fn is_verified(&self, route_id: &str) -> LedgerResult<bool> {
        Ok(self.get(route_id)?.is_some_and(|r| r.verified))
    }
}

/// Required fields must contain a non-whitespace character.
fn check_field(name: &str, value: &str, required: bool) -> LedgerResult<()> {
    if required && value.trim().is_empty() {
        return Err(LedgerError::validation(format!("{name} must not be empty")));
    }
    if value.len() > MAX_FIELD_LEN {
        return Err(LedgerError::validation(format!(
            "{name} exceeds {MAX_FIELD_LEN} bytes"
        )));
    }
    Ok(())
}

/// Delivery registry.
pub struct DeliveryLedger<P: AuthorizationPolicy> {
    state: PersistentState,
    view: DeliveryView,
    policy: P,
    clock: SharedClock,
    events: EventBus,
}

impl<P: AuthorizationPolicy> DeliveryLedger<P> {
    /// New registry over `state`, gated by `policy`.
    pub fn new(state: PersistentState, policy: P, clock: SharedClock, events: EventBus) -> Self {
        Self {
            view: DeliveryView::new(state.clone()),
            state,
            policy,
            clock,
            events,
        }
    }

    /// Authorization policy in use.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Read-only view for dependent registries.
    pub fn view(&self) -> DeliveryView {
        self.view.clone()
    }

    /// Record a verified delivery.
    ///
    /// Preconditions, in order: caller authorized, `route_id` non-blank,
    /// `vehicle_id` non-blank, `route_id` unused, `optimization_score` within
    /// 0..=100, `delivery_count` positive, hashes within length, aggregates do
    /// not overflow. All of them are checked in the transaction that commits
    /// the record, and the first failure aborts with nothing written.
    pub fn add_delivery_record(
        &self,
        caller: &Principal,
        input: NewDelivery,
    ) -> LedgerResult<DeliveryRecord> {
        let key = delivery_key(&input.route_id);
        let now = self.clock.now_ms();
        let (record, totals) =
            self.state
                .transact(|tx| -> TxResult<(DeliveryRecord, DeliveryTotals)> {
                    if !self.policy.is_authorized_in(tx, caller)? {
                        return Err(LedgerError::unauthorized(format!(
                            "{caller} is not an authorized verifier"
                        ))
                        .into());
                    }
                    check_field("route_id", &input.route_id, true)?;
                    check_field("vehicle_id", &input.vehicle_id, true)?;
                    if tx.contains(&key)? {
                        return Err(LedgerError::Conflict(format!(
                            "delivery already verified: {}",
                            input.route_id
                        ))
                        .into());
                    }
                    check_score("optimization_score", input.optimization_score)?;
                    if input.delivery_count == 0 {
                        return Err(
                            LedgerError::validation("delivery_count must be positive").into()
                        );
                    }
                    check_field("verification_hash", &input.verification_hash, false)?;
                    check_field("metadata_hash", &input.metadata_hash, false)?;

                    let totals = read::<DeliveryTotals>(tx, TOTALS_KEY)?
                        .unwrap_or_default()
                        .checked_apply(&input)
                        .ok_or_else(|| LedgerError::resource_limit("network aggregate overflow"))?;
                    let record = DeliveryRecord {
                        route_id: input.route_id.clone(),
                        vehicle_id: input.vehicle_id.clone(),
                        carbon_saved_grams: input.carbon_saved_grams,
                        cost_saved_cents: input.cost_saved_cents,
                        distance_meters: input.distance_meters,
                        optimization_score: input.optimization_score,
                        delivery_count: input.delivery_count,
                        verification_hash: input.verification_hash.clone(),
                        metadata_hash: input.metadata_hash.clone(),
                        verified: true,
                        created_at_ms: now,
                        recorded_by: caller.clone(),
                    };
                    tx.apply(&[
                        KvOp::put(key.clone(), &record)?,
                        KvOp::put(TOTALS_KEY.to_vec(), &totals)?,
                    ])?;
                    Ok((record, totals))
                })?;

        info!(
            route_id = %record.route_id,
            vehicle_id = %record.vehicle_id,
            verifier = %caller,
            deliveries = totals.deliveries,
            "delivery recorded"
        );
        self.events.emit(LedgerEvent::DeliveryRecorded {
            route_id: record.route_id.clone(),
            carbon_saved: record.carbon_saved_grams,
            cost_saved: record.cost_saved_cents,
        });
        Ok(record)
    }

    /// Stored record; `NotFound` if the route was never recorded.
    pub fn get_delivery_record(&self, route_id: &str) -> LedgerResult<DeliveryRecord> {
        debug!(route_id, "get delivery record");
        self.view
            .get(route_id)?
            .ok_or_else(|| LedgerError::not_found(format!("delivery {route_id}")))
    }

    /// True iff `route_id` has a verified record.
    pub fn is_verified(&self, route_id: &str) -> LedgerResult<bool> {
        self.view.is_verified(route_id)
    }

    /// Current network aggregates and verifier count, read from one snapshot.
    pub fn get_network_statistics(&self) -> LedgerResult<NetworkStatistics> {
        self.state.transact(|tx| -> TxResult<NetworkStatistics> {
            let t = read::<DeliveryTotals>(tx, TOTALS_KEY)?.unwrap_or_default();
            Ok(NetworkStatistics {
                total_carbon_saved: t.carbon_saved,
                total_cost_saved: t.cost_saved,
                total_deliveries: t.deliveries,
                total_distance: t.distance,
                average_optimization_score: t.average_score(),
                total_verifiers: self.policy.verifier_count_in(tx)?,
            })
        })
    }

    /// Owner-only; idempotent. Returns false if already authorized.
    pub fn authorize_verifier(
        &self,
        caller: &Principal,
        principal: &Principal,
    ) -> LedgerResult<bool> {
        self.policy.authorize(caller, principal)
    }

    /// Owner-only. Returns false if the principal was not a verifier.
    pub fn revoke_verifier(&self, caller: &Principal, principal: &Principal) -> LedgerResult<bool> {
        self.policy.revoke(caller, principal)
    }

    /// Sorted verifier set (owner included). Fails with `ResourceLimit` once
    /// the set outgrows the scan budget; use the paged form then.
    pub fn get_authorized_verifiers(&self) -> LedgerResult<Vec<Principal>> {
        self.policy.verifiers()
    }

    /// Up to `limit` verifiers sorted after `after`, capped at the scan budget.
    pub fn get_authorized_verifiers_page(
        &self,
        after: Option<&Principal>,
        limit: usize,
    ) -> LedgerResult<Vec<Principal>> {
        self.policy.verifiers_page(after, limit)
    }
}

impl<P: AuthorizationPolicy> DeliveryVerifier for DeliveryLedger<P> {
    fn is_verified(&self, route_id: &str) -> LedgerResult<bool> {
        self.view.is_verified(route_id)
    }
}
