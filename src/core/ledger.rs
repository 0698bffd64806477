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

//! The three registries wired over one state store.
//!
//! Every write checks its preconditions and stages its effects in one sled
//! transaction, so concurrent callers on a shared `Ledger` are linearized by
//! the store. [`crate::core::runtime::executor`] adds ordering, a queue bound
//! and an operation budget on top. Reads may be issued from anywhere.

use crate::core::{
    clock::SharedClock,
    config::NodeConfig,
    error::{LedgerError, LedgerResult},
    events::{EventBus, LedgerEvent},
    registry::{
        authorization::VerifierSet,
        carbon_credit::{CarbonCreditRegistry, CarbonCreditSettings},
        delivery::{delivery_key, DeliveryLedger, DeliveryView},
        trust_token::{TrustTokenRegistry, TrustTokenSettings},
    },
    state::{
        merkle::{Hash32, MerkleProof},
        persistent_state::PersistentState,
    },
    types::{encode_canonical, DeliveryRecord},
};
use tokio::sync::broadcast;
use tracing::info;

/// Delivery record with an inclusion proof against a state root.
#[derive(Clone, Debug)]
pub struct DeliveryProof {
    /// Proven record.
    pub record: DeliveryRecord,
    /// State root at proof time.
    pub root: Hash32,
    /// Inclusion proof of the record's key/value leaf.
    pub proof: MerkleProof,
}

impl DeliveryProof {
    /// Check that the proof covers exactly this record and folds to `root`.
    pub fn verify(&self) -> bool {
        let Ok(value) = encode_canonical(&self.record) else {
            return false;
        };
        self.proof
            .proves(&delivery_key(&self.record.route_id), &value)
            && self.proof.verify(self.root)
    }
}

/// Ledger core.
pub struct Ledger {
    state: PersistentState,
    events: EventBus,
    deliveries: DeliveryLedger<VerifierSet>,
    trust_tokens: TrustTokenRegistry<DeliveryView>,
    carbon_credits: CarbonCreditRegistry<DeliveryView>,
}

impl Ledger {
    /// Open the sled store at `cfg.node.data_dir`.
    pub fn open(cfg: &NodeConfig, clock: SharedClock) -> LedgerResult<Self> {
        let state = PersistentState::open(&cfg.node.data_dir)?;
        Self::with_state(state, cfg, clock)
    }

    /// Wire registries over an already opened store.
    pub fn with_state(
        state: PersistentState,
        cfg: &NodeConfig,
        clock: SharedClock,
    ) -> LedgerResult<Self> {
        cfg.validate()?;
        let events = EventBus::new();
        let ls = &cfg.ledger;

        let policy = VerifierSet::open(
            state.clone(),
            ls.owner(),
            clock.clone(),
            events.clone(),
            ls.max_scan_entries,
        )?;
        let deliveries = DeliveryLedger::new(state.clone(), policy, clock.clone(), events.clone());
        let trust_tokens = TrustTokenRegistry::new(
            state.clone(),
            deliveries.view(),
            clock.clone(),
            events.clone(),
            TrustTokenSettings {
                admin: ls.trust_admin(),
                tiers: cfg.tiers.clone(),
                default_validity_secs: ls.default_validity_secs,
            },
        );
        let carbon_credits = CarbonCreditRegistry::new(
            state.clone(),
            deliveries.view(),
            clock,
            events.clone(),
            CarbonCreditSettings {
                min_credit_grams: ls.min_credit_grams,
                max_credit_years: ls.max_credit_years,
                max_scan_entries: ls.max_scan_entries,
            },
        );

        info!(owner = %ls.owner(), node = %cfg.node.name, "ledger opened");
        Ok(Self {
            state,
            events,
            deliveries,
            trust_tokens,
            carbon_credits,
        })
    }

    /// Delivery ledger (and its verifier policy).
    pub fn deliveries(&self) -> &DeliveryLedger<VerifierSet> {
        &self.deliveries
    }

    /// Trust token registry.
    pub fn trust_tokens(&self) -> &TrustTokenRegistry<DeliveryView> {
        &self.trust_tokens
    }

    /// Carbon credit registry.
    pub fn carbon_credits(&self) -> &CarbonCreditRegistry<DeliveryView> {
        &self.carbon_credits
    }

    /// Events committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Deterministic root over all persisted state.
    pub fn state_root(&self) -> LedgerResult<Hash32> {
        Ok(self.state.state_root()?)
    }

    /// Record for `route_id` with an inclusion proof.
    pub fn prove_delivery(&self, route_id: &str) -> LedgerResult<DeliveryProof> {
        let record = self.deliveries.get_delivery_record(route_id)?;
        let (root, proof) = self
            .state
            .prove_key(&delivery_key(route_id))?
            .ok_or_else(|| LedgerError::not_found(format!("delivery {route_id}")))?;
        Ok(DeliveryProof {
            record,
            root,
            proof,
        })
    }

    /// Flush to disk.
    pub fn flush(&self) -> LedgerResult<()> {
        Ok(self.state.flush()?)
    }
}
