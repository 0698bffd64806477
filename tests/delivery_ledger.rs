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
use quantumeco::core::error::{ErrorKind, LedgerError};
use quantumeco::core::registry::delivery::{DeliveryVerifier, MAX_FIELD_LEN};
use quantumeco::core::types::{NetworkStatistics, Principal};

fn kind_of(fx: &common::Fixture, caller: &Principal, input: quantumeco::core::types::NewDelivery) -> ErrorKind {
    fx.ledger
        .deliveries()
        .add_delivery_record(caller, input)
        .unwrap_err()
        .kind()
}

#[test]
fn preconditions_fail_in_order() {
    let fx = common::with_route("route_dup", 10);

    // Unauthorized wins over every input error.
    let mut bad = delivery("", 1);
    bad.vehicle_id.clear();
    bad.optimization_score = 101;
    assert_eq!(kind_of(&fx, &Principal::new("stranger"), bad.clone()), ErrorKind::Authorization);

    // Empty route before empty vehicle.
    let err = fx.ledger.deliveries().add_delivery_record(&owner(), bad).unwrap_err();
    assert!(matches!(&err, LedgerError::Validation(m) if m.contains("route_id")));

    let mut bad = delivery("route_new", 1);
    bad.vehicle_id = "   ".into();
    bad.optimization_score = 101;
    let err = fx.ledger.deliveries().add_delivery_record(&owner(), bad).unwrap_err();
    assert!(matches!(&err, LedgerError::Validation(m) if m.contains("vehicle_id")));

    // Duplicate route before out-of-range score.
    let mut bad = delivery("route_dup", 1);
    bad.optimization_score = 101;
    assert_eq!(kind_of(&fx, &owner(), bad), ErrorKind::Conflict);

    let mut bad = delivery("route_new", 1);
    bad.optimization_score = 101;
    let err = fx.ledger.deliveries().add_delivery_record(&owner(), bad).unwrap_err();
    assert!(matches!(&err, LedgerError::Validation(m) if m.contains("optimization_score")));
}

#[test]
fn rejected_writes_leave_no_trace() {
    let fx = common::with_route("route_a", 500);
    let before: NetworkStatistics = fx.ledger.deliveries().get_network_statistics().unwrap();
    let root = fx.ledger.state_root().unwrap();

    let mut zero_count = delivery("route_b", 700);
    zero_count.delivery_count = 0;
    assert_eq!(kind_of(&fx, &owner(), zero_count), ErrorKind::Validation);

    let mut long_hash = delivery("route_b", 700);
    long_hash.verification_hash = "h".repeat(MAX_FIELD_LEN + 1);
    assert_eq!(kind_of(&fx, &owner(), long_hash), ErrorKind::Validation);

    let long_route = delivery(&"r".repeat(MAX_FIELD_LEN + 1), 700);
    assert_eq!(kind_of(&fx, &owner(), long_route), ErrorKind::Validation);

    assert_eq!(fx.ledger.deliveries().get_network_statistics().unwrap(), before);
    assert_eq!(fx.ledger.state_root().unwrap(), root);
    assert!(!fx.ledger.deliveries().is_verified("route_b").unwrap());
}

#[test]
fn score_bounds_are_inclusive() {
    let fx = common::fixture();
    let mut low = delivery("route_low", 1);
    low.optimization_score = 0;
    let mut high = delivery("route_high", 1);
    high.optimization_score = 100;
    fx.ledger.deliveries().add_delivery_record(&owner(), low).unwrap();
    fx.ledger.deliveries().add_delivery_record(&owner(), high).unwrap();
    assert_eq!(
        fx.ledger
            .deliveries()
            .get_network_statistics()
            .unwrap()
            .average_optimization_score,
        50
    );
}

#[test]
fn average_is_exact_floor_of_mean() {
    let fx = common::fixture();
    for (route, score) in [("r1", 90), ("r2", 91), ("r3", 95)] {
        let mut d = delivery(route, 1);
        d.optimization_score = score;
        fx.ledger.deliveries().add_delivery_record(&owner(), d).unwrap();
    }
    // (90 + 91 + 95) / 3 = 92
    let stats = fx.ledger.deliveries().get_network_statistics().unwrap();
    assert_eq!(stats.average_optimization_score, 92);
    assert_eq!(stats.total_deliveries, 3);
    assert_eq!(stats.total_carbon_saved, 3);
}

#[test]
fn aggregate_overflow_is_resource_limit() {
    let fx = common::with_route("route_big", u64::MAX);
    let err = fx
        .ledger
        .deliveries()
        .add_delivery_record(&owner(), delivery("route_more", 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceLimit);
    assert!(!fx.ledger.deliveries().is_verified("route_more").unwrap());
}

#[test]
fn absent_route_reads_as_not_found() {
    let fx = common::fixture();
    let err = fx.ledger.deliveries().get_delivery_record("nope").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!fx.ledger.deliveries().is_verified("nope").unwrap());
    assert_eq!(
        fx.ledger.deliveries().get_network_statistics().unwrap().total_deliveries,
        0
    );
}

#[test]
fn record_keeps_inputs_and_caller() {
    let fx = common::fixture();
    let v = Principal::new("verifier-1");
    fx.ledger.deliveries().authorize_verifier(&owner(), &v).unwrap();
    fx.clock.advance(1_000);
    fx.ledger
        .deliveries()
        .add_delivery_record(&v, delivery("route_001", 25_000))
        .unwrap();

    let rec = fx.ledger.deliveries().get_delivery_record("route_001").unwrap();
    assert_eq!(rec.vehicle_id, "truck_001");
    assert_eq!(rec.verification_hash, "hash_abc");
    assert_eq!(rec.recorded_by, v);
    assert_eq!(rec.created_at_ms, common::T0 + 1_000);
    assert!(DeliveryVerifier::is_verified(fx.ledger.deliveries(), "route_001").unwrap());
}

#[test]
fn whitespace_only_identifiers_are_rejected() {
    let fx = common::fixture();

    let err = fx
        .ledger
        .deliveries()
        .add_delivery_record(&owner(), delivery(" \t ", 1))
        .unwrap_err();
    assert!(matches!(&err, LedgerError::Validation(m) if m.contains("route_id")));

    let err = fx
        .ledger
        .deliveries()
        .authorize_verifier(&owner(), &Principal::new("   "))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // Surrounding whitespace is kept verbatim, not trimmed.
    let rec = fx
        .ledger
        .deliveries()
        .add_delivery_record(&owner(), delivery(" route_001 ", 1))
        .unwrap();
    assert_eq!(rec.route_id, " route_001 ");
    assert!(!fx.ledger.deliveries().is_verified("route_001").unwrap());
    assert_eq!(
        fx.ledger.deliveries().get_network_statistics().unwrap().total_deliveries,
        1
    );
}
