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

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus")]
    Prom,
    #[error("encode")]
    Encode,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Accepted delivery records.
    pub deliveries_recorded_total: IntCounter,
    /// Minted trust tokens.
    pub etts_minted_total: IntCounter,
    /// Issued carbon credits.
    pub credits_issued_total: IntCounter,
    /// Grams retired across all credits.
    pub carbon_retired_grams_total: IntCounter,
    /// Rejected writes by error kind.
    pub writes_rejected_total: IntCounterVec,
    /// Writes waiting in the executor mailbox.
    pub write_queue_depth: IntGauge,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let deliveries_recorded_total = IntCounter::new(
            "quantumeco_deliveries_recorded_total",
            "Verified deliveries recorded",
        )
        .map_err(|_| MetricsError::Prom)?;
        let etts_minted_total =
            IntCounter::new("quantumeco_etts_minted_total", "Trust tokens minted")
                .map_err(|_| MetricsError::Prom)?;
        let credits_issued_total =
            IntCounter::new("quantumeco_credits_issued_total", "Carbon credits issued")
                .map_err(|_| MetricsError::Prom)?;
        let carbon_retired_grams_total = IntCounter::new(
            "quantumeco_carbon_retired_grams_total",
            "Carbon credit grams retired",
        )
        .map_err(|_| MetricsError::Prom)?;
        let writes_rejected_total = IntCounterVec::new(
            Opts::new("quantumeco_writes_rejected_total", "Rejected writes"),
            &["kind"],
        )
        .map_err(|_| MetricsError::Prom)?;
        let write_queue_depth =
            IntGauge::new("quantumeco_write_queue_depth", "Queued ledger writes")
                .map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(deliveries_recorded_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(etts_minted_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(credits_issued_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(carbon_retired_grams_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(writes_rejected_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(write_queue_depth.clone()))
            .map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            deliveries_recorded_total,
            etts_minted_total,
            credits_issued_total,
            carbon_retired_grams_total,
            writes_rejected_total,
            write_queue_depth,
        })
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(|_| MetricsError::Encode)?;
        String::from_utf8(buf).map_err(|_| MetricsError::Encode)
    }
}
