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

//! Ledger notifications, published only after the triggering write commits.

use crate::core::types::Principal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

const EVENT_BUFFER: usize = 1024;

/// Committed ledger event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A delivery was verified and stored.
    DeliveryRecorded {
        /// Route key.
        route_id: String,
        /// Carbon saved (g).
        carbon_saved: u64,
        /// Cost saved (cents).
        cost_saved: u64,
    },
    /// A principal joined the verifier set.
    VerifierAuthorized {
        /// New verifier.
        principal: Principal,
    },
    /// A principal left the verifier set.
    VerifierRevoked {
        /// Removed verifier.
        principal: Principal,
    },
    /// A trust token was minted.
    EttCreated {
        /// New token id.
        token_id: u64,
        /// Attested route.
        route_id: String,
        /// Initial trust score.
        trust_score: u32,
    },
    /// A trust token changed hands.
    EttTransferred {
        /// Token id.
        token_id: u64,
        /// Previous owner.
        from: Principal,
        /// New owner.
        to: Principal,
    },
    /// A trust score was changed by the administrator.
    TrustScoreUpdated {
        /// Token id.
        token_id: u64,
        /// Score before.
        old_score: u32,
        /// Score after.
        new_score: u32,
    },
    /// A carbon credit was issued.
    CarbonCreditIssued {
        /// New credit id.
        credit_id: u64,
        /// Backing route.
        route_id: String,
        /// Issued grams.
        carbon_amount: u64,
    },
    /// Part or all of a carbon credit was retired.
    CarbonCreditRetired {
        /// Credit id.
        credit_id: u64,
        /// Retired grams.
        amount: u64,
        /// Caller supplied reason.
        reason: String,
    },
}

/// Fan-out of committed events. Cloning shares the channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<LedgerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// New bus with the default buffer.
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    /// Subscribe to events committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.tx.subscribe()
    }

    /// Log and publish. Having no subscribers is not an error.
    pub fn emit(&self, ev: LedgerEvent) {
        info!(?ev, "ledger event");
        let _ = self.tx.send(ev);
    }
}
