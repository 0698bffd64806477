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

use std::sync::Arc;
use std::time::Duration;

use common::{credit, delivery, ett, owner};
use quantumeco::core::error::{ErrorKind, LedgerError};
use quantumeco::core::events::LedgerEvent;
use quantumeco::core::runtime::executor::{spawn_executor, ExecutorSettings, LedgerHandle};
use quantumeco::core::types::Principal;
use quantumeco::monitoring::metrics::Metrics;

fn settings() -> ExecutorSettings {
    ExecutorSettings::from_config(&common::config().ledger)
}

fn start(
    fx: common::Fixture,
    settings: ExecutorSettings,
) -> (tempfile::TempDir, LedgerHandle, Arc<Metrics>) {
    let common::Fixture { ledger, dir, .. } = fx;
    let metrics = Arc::new(Metrics::new().unwrap());
    let (handle, _join) = spawn_executor(Arc::new(ledger), settings, Some(metrics.clone()));
    (dir, handle, metrics)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicates_commit_exactly_once() {
    let (_dir, handle, metrics) = start(common::fixture(), settings());

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let h = handle.clone();
        tasks.push(tokio::spawn(async move {
            h.add_delivery_record(owner(), delivery("route_race", 25_000))
                .await
        }));
    }
    let mut ok = 0;
    let mut conflicts = 0;
    for t in tasks {
        match t.await.unwrap() {
            Ok(_) => ok += 1,
            Err(e) => {
                assert_eq!(e.kind(), ErrorKind::Conflict);
                conflicts += 1;
            }
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(conflicts, 15);

    let stats = handle
        .ledger()
        .deliveries()
        .get_network_statistics()
        .unwrap();
    assert_eq!(stats.total_deliveries, 1);
    assert_eq!(stats.total_carbon_saved, 25_000);
    assert_eq!(metrics.deliveries_recorded_total.get(), 1);
    assert_eq!(
        metrics
            .writes_rejected_total
            .with_label_values(&["conflict"])
            .get(),
        15
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mints_get_distinct_sequential_ids() {
    let (_dir, handle, metrics) = start(common::with_route("route_001", 1), settings());

    let mut tasks = Vec::new();
    for i in 0..10u32 {
        let h = handle.clone();
        tasks.push(tokio::spawn(async move {
            h.create_ett(owner(), ett("route_001", "alice", 50 + i))
                .await
                .unwrap()
                .token_id
        }));
    }
    let mut ids = Vec::new();
    for t in tasks {
        ids.push(t.await.unwrap());
    }
    ids.sort_unstable();
    assert_eq!(ids, (1..=10).collect::<Vec<u64>>());
    assert_eq!(metrics.etts_minted_total.get(), 10);
}

#[tokio::test]
async fn full_flow_through_handle_emits_events() {
    let (_dir, handle, metrics) = start(common::fixture(), settings());
    let mut events = handle.ledger().subscribe();
    let v = Principal::new("verifier-1");

    assert!(handle.authorize_verifier(owner(), v.clone()).await.unwrap());
    handle
        .add_delivery_record(v.clone(), delivery("route_cc_001", 35_000))
        .await
        .unwrap();
    handle
        .create_ett(owner(), ett("route_cc_001", "alice", 90))
        .await
        .unwrap();
    handle
        .approve(Principal::new("alice"), 1, Principal::new("broker"))
        .await
        .unwrap();
    handle
        .transfer_from(
            Principal::new("broker"),
            Principal::new("alice"),
            Principal::new("bob"),
            1,
        )
        .await
        .unwrap();
    handle.update_trust_score(owner(), 1, 77).await.unwrap();
    handle
        .issue_carbon_credit(owner(), credit("route_cc_001", 30_000))
        .await
        .unwrap();
    let cc = handle
        .retire_carbon_credit(owner(), 1, 10_000, "offset")
        .await
        .unwrap();
    assert!(cc.is_traded);
    assert!(handle.revoke_verifier(owner(), v.clone()).await.unwrap());

    let mut seen = Vec::new();
    while let Ok(ev) = events.try_recv() {
        seen.push(ev);
    }
    assert_eq!(
        seen,
        vec![
            LedgerEvent::VerifierAuthorized {
                principal: v.clone()
            },
            LedgerEvent::DeliveryRecorded {
                route_id: "route_cc_001".into(),
                carbon_saved: 35_000,
                cost_saved: 15_000,
            },
            LedgerEvent::EttCreated {
                token_id: 1,
                route_id: "route_cc_001".into(),
                trust_score: 90,
            },
            LedgerEvent::EttTransferred {
                token_id: 1,
                from: Principal::new("alice"),
                to: Principal::new("bob"),
            },
            LedgerEvent::TrustScoreUpdated {
                token_id: 1,
                old_score: 90,
                new_score: 77,
            },
            LedgerEvent::CarbonCreditIssued {
                credit_id: 1,
                route_id: "route_cc_001".into(),
                carbon_amount: 30_000,
            },
            LedgerEvent::CarbonCreditRetired {
                credit_id: 1,
                amount: 10_000,
                reason: "offset".into(),
            },
            LedgerEvent::VerifierRevoked { principal: v },
        ]
    );
    assert_eq!(metrics.credits_issued_total.get(), 1);
    assert_eq!(metrics.carbon_retired_grams_total.get(), 10_000);
    assert_eq!(metrics.write_queue_depth.get(), 0);

    let text = metrics.render().unwrap();
    assert!(text.contains("quantumeco_deliveries_recorded_total 1"));
    assert!(text.contains("quantumeco_carbon_retired_grams_total 10000"));
}

#[tokio::test]
async fn stale_writes_are_rejected_as_resource_limit() {
    let budget = ExecutorSettings {
        queue_capacity: 8,
        op_budget: Duration::ZERO,
    };
    let (_dir, handle, metrics) = start(common::fixture(), budget);

    let err = handle
        .add_delivery_record(owner(), delivery("route_late", 1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceLimit);
    assert!(!handle.ledger().deliveries().is_verified("route_late").unwrap());
    assert_eq!(
        metrics
            .writes_rejected_total
            .with_label_values(&["resource_limit"])
            .get(),
        1
    );
}

#[tokio::test]
async fn handle_reports_unavailable_after_shutdown() {
    let fx = common::fixture();
    let common::Fixture { ledger, dir: _dir, .. } = fx;
    let (handle, join) = spawn_executor(Arc::new(ledger), settings(), None);

    handle.shutdown().await.unwrap();
    join.await.unwrap();

    let err = handle
        .add_delivery_record(owner(), delivery("route_after", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Unavailable));
    assert_eq!(handle.owner(), owner());
    // Reads keep working.
    assert_eq!(
        handle
            .ledger()
            .deliveries()
            .get_network_statistics()
            .unwrap()
            .total_deliveries,
        0
    );
}
