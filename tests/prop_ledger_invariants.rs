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

use common::{credit, delivery, ett, owner};
use proptest::prelude::*;
use quantumeco::core::error::ErrorKind;
use std::collections::BTreeSet;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_aggregates_equal_fold_over_accepted(
        writes in prop::collection::vec((0u8..12, 0u64..1_000_000, 0u32..=120), 1..40)
    ) {
        let fx = common::fixture();
        let d = fx.ledger.deliveries();
        let mut seen = BTreeSet::new();
        let (mut carbon, mut score_sum) = (0u64, 0u64);

        for (route, grams, score) in writes {
            let route_id = format!("route_{route}");
            let mut input = delivery(&route_id, grams);
            input.optimization_score = score;
            let res = d.add_delivery_record(&owner(), input);

            if seen.contains(&route_id) {
                prop_assert_eq!(res.unwrap_err().kind(), ErrorKind::Conflict);
            } else if score > 100 {
                prop_assert_eq!(res.unwrap_err().kind(), ErrorKind::Validation);
            } else {
                let rec = res.unwrap();
                prop_assert!(rec.optimization_score <= 100);
                seen.insert(route_id);
                carbon += grams;
                score_sum += u64::from(score);
            }
        }

        let stats = d.get_network_statistics().unwrap();
        let n = seen.len() as u64;
        prop_assert_eq!(stats.total_deliveries, n);
        prop_assert_eq!(stats.total_carbon_saved, carbon);
        prop_assert_eq!(stats.total_cost_saved, 15_000 * n);
        prop_assert_eq!(stats.total_distance, 100_000 * n);
        prop_assert_eq!(stats.average_optimization_score, if n == 0 { 0 } else { score_sum / n });
    }

    #[test]
    fn prop_retired_never_exceeds_issued(
        issued in 1_000u64..100_000,
        attempts in prop::collection::vec(1u64..60_000, 1..20)
    ) {
        let fx = common::with_route("route_cc", 1);
        let reg = fx.ledger.carbon_credits();
        reg.issue_carbon_credit(&owner(), credit("route_cc", issued)).unwrap();

        let mut retired = 0u64;
        for amount in attempts {
            match reg.retire_carbon_credit(&owner(), 1, amount, "prop") {
                Ok(cc) => {
                    retired += amount;
                    prop_assert_eq!(cc.retired_amount_grams, retired);
                }
                Err(e) => {
                    prop_assert_eq!(e.kind(), ErrorKind::ResourceLimit);
                    prop_assert!(retired + amount > issued);
                }
            }
            prop_assert!(retired <= issued);
        }
        let cc = reg.get_carbon_credit(1).unwrap();
        prop_assert_eq!(cc.retired_amount_grams, retired);
        prop_assert_eq!(reg.get_market_statistics().unwrap().total_retired, retired);
    }

    #[test]
    fn prop_ett_scores_bounded(trust in 0u32..200, rating in 0u32..200) {
        let fx = common::with_route("route_001", 1);
        let mut input = ett("route_001", "alice", trust);
        input.sustainability_rating = rating;
        let res = fx.ledger.trust_tokens().create_ett(&owner(), input);
        if trust <= 100 && rating <= 100 {
            let t = res.unwrap();
            prop_assert_eq!(t.trust_score, trust);
            prop_assert_eq!(t.sustainability_rating, rating);
        } else {
            prop_assert_eq!(res.unwrap_err().kind(), ErrorKind::Validation);
            prop_assert_eq!(fx.ledger.trust_tokens().get_total_etts().unwrap(), 0);
        }
    }
}
