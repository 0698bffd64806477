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

#![allow(dead_code)]

use quantumeco::core::{
    clock::ManualClock,
    config::NodeConfig,
    ledger::Ledger,
    state::persistent_state::PersistentState,
    types::{NewCarbonCredit, NewDelivery, NewTrustToken, Principal},
};
use tempfile::TempDir;

pub const OWNER: &str = "owner-test";
pub const T0: u64 = 1_700_000_000_000;

pub fn config() -> NodeConfig {
    let mut cfg = NodeConfig::default();
    cfg.ledger.owner = OWNER.to_string();
    cfg
}

pub fn owner() -> Principal {
    Principal::new(OWNER)
}

// Field order matters: the ledger must drop before its directory.
pub struct Fixture {
    pub ledger: Ledger,
    pub clock: ManualClock,
    pub dir: TempDir,
}

pub fn fixture_with(cfg: NodeConfig) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let state = PersistentState::open(dir.path().to_str().unwrap()).unwrap();
    let ledger = Ledger::with_state(state, &cfg, clock.shared()).unwrap();
    Fixture { ledger, clock, dir }
}

pub fn fixture() -> Fixture {
    fixture_with(config())
}

pub fn delivery(route_id: &str, carbon_saved: u64) -> NewDelivery {
    NewDelivery {
        route_id: route_id.to_string(),
        vehicle_id: "truck_001".to_string(),
        carbon_saved_grams: carbon_saved,
        cost_saved_cents: 15_000,
        distance_meters: 100_000,
        optimization_score: 92,
        delivery_count: 1,
        verification_hash: "hash_abc".to_string(),
        metadata_hash: "meta_abc".to_string(),
    }
}

pub fn ett(route_id: &str, recipient: &str, trust_score: u32) -> NewTrustToken {
    NewTrustToken {
        route_id: route_id.to_string(),
        recipient: Principal::new(recipient),
        trust_score,
        carbon_impact_grams: 25_000,
        sustainability_rating: 95,
        validity_period_secs: 0,
    }
}

pub fn credit(route_id: &str, grams: u64) -> NewCarbonCredit {
    NewCarbonCredit {
        route_id: route_id.to_string(),
        carbon_amount_grams: grams,
        price_per_ton_cents: 5_000,
        expiration_years: 5,
        standard: "QUANTUMECO".to_string(),
        quality: 3,
    }
}

/// Fixture with one verified delivery on `route_id`.
pub fn with_route(route_id: &str, carbon_saved: u64) -> Fixture {
    let fx = fixture();
    fx.ledger
        .deliveries()
        .add_delivery_record(&owner(), delivery(route_id, carbon_saved))
        .unwrap();
    fx
}
