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

mod common;

use common::{delivery, owner};
use quantumeco::core::error::ErrorKind;
use quantumeco::core::ledger::Ledger;
use quantumeco::core::registry::authorization::AuthorizationPolicy;
use quantumeco::core::state::persistent_state::PersistentState;
use quantumeco::core::types::Principal;

#[test]
fn owner_is_enrolled_at_genesis() {
    let fx = common::fixture();
    let d = fx.ledger.deliveries();
    assert!(d.policy().is_authorized(&owner()).unwrap());
    assert_eq!(d.get_authorized_verifiers().unwrap(), vec![owner()]);
    assert_eq!(d.get_network_statistics().unwrap().total_verifiers, 1);
}

#[test]
fn authorize_is_idempotent() {
    let fx = common::fixture();
    let d = fx.ledger.deliveries();
    let v = Principal::new("verifier-1");

    assert!(d.authorize_verifier(&owner(), &v).unwrap());
    assert!(!d.authorize_verifier(&owner(), &v).unwrap());
    assert_eq!(d.get_network_statistics().unwrap().total_verifiers, 2);

    let entry = d.policy().entry(&v).unwrap().unwrap();
    assert_eq!(entry.added_by, owner());
    assert_eq!(entry.added_at_ms, common::T0);
}

#[test]
fn only_owner_manages_verifiers() {
    let fx = common::fixture();
    let d = fx.ledger.deliveries();
    let v = Principal::new("verifier-1");
    d.authorize_verifier(&owner(), &v).unwrap();

    let err = d
        .authorize_verifier(&v, &Principal::new("verifier-2"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    let err = d.revoke_verifier(&v, &v).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert!(d.policy().is_authorized(&v).unwrap());
}

#[test]
fn revoked_verifier_can_no_longer_record() {
    let fx = common::fixture();
    let d = fx.ledger.deliveries();
    let v = Principal::new("verifier-1");
    d.authorize_verifier(&owner(), &v).unwrap();
    d.add_delivery_record(&v, delivery("route_a", 1)).unwrap();

    assert!(d.revoke_verifier(&owner(), &v).unwrap());
    assert!(!d.revoke_verifier(&owner(), &v).unwrap());
    let err = d.add_delivery_record(&v, delivery("route_b", 1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(d.get_network_statistics().unwrap().total_verifiers, 1);
}

#[test]
fn stranger_cannot_record() {
    let fx = common::fixture();
    let err = fx
        .ledger
        .deliveries()
        .add_delivery_record(&Principal::new("stranger"), delivery("route_a", 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[test]
fn owner_cannot_be_revoked() {
    let fx = common::fixture();
    let err = fx
        .ledger
        .deliveries()
        .revoke_verifier(&owner(), &owner())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn verifier_set_survives_reopen_and_pins_owner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_str().unwrap().to_string();
    let clock = quantumeco::core::clock::ManualClock::new(common::T0);
    {
        let state = PersistentState::open(&path).unwrap();
        let ledger = Ledger::with_state(state, &common::config(), clock.shared()).unwrap();
        ledger
            .deliveries()
            .authorize_verifier(&owner(), &Principal::new("verifier-1"))
            .unwrap();
        ledger.flush().unwrap();
    }
    {
        let state = PersistentState::open(&path).unwrap();
        let ledger = Ledger::with_state(state, &common::config(), clock.shared()).unwrap();
        assert_eq!(
            ledger.deliveries().get_authorized_verifiers().unwrap(),
            vec![Principal::new("owner-test"), Principal::new("verifier-1")]
        );
    }
    {
        let state = PersistentState::open(&path).unwrap();
        let mut cfg = common::config();
        cfg.ledger.owner = "someone-else".into();
        let err = Ledger::with_state(state, &cfg, clock.shared()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}

#[test]
fn verifier_listing_pages_past_scan_budget() {
    let mut cfg = common::config();
    cfg.ledger.max_scan_entries = 3;
    let fx = common::fixture_with(cfg);
    let d = fx.ledger.deliveries();
    for i in 1..=5 {
        d.authorize_verifier(&owner(), &Principal::new(format!("verifier-{i}")))
            .unwrap();
    }

    assert_eq!(
        d.get_authorized_verifiers().unwrap_err().kind(),
        ErrorKind::ResourceLimit
    );
    assert_eq!(d.get_network_statistics().unwrap().total_verifiers, 6);

    let mut all = Vec::new();
    let mut after: Option<Principal> = None;
    loop {
        // Oversized limits are capped at the scan budget.
        let page = d.get_authorized_verifiers_page(after.as_ref(), 100).unwrap();
        assert!(page.len() <= 3);
        if page.is_empty() {
            break;
        }
        after = page.last().cloned();
        all.extend(page);
    }
    let mut expected: Vec<Principal> = (1..=5)
        .map(|i| Principal::new(format!("verifier-{i}")))
        .collect();
    expected.insert(0, owner());
    assert_eq!(all, expected);
}
