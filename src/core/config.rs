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

//! Node configuration (TOML).
//!
//! ```text
//! [node]
//! name = "quantumeco-1"
//! data_dir = "./data"
//!
//! [ledger]
//! owner = "ops@quantumeco"
//! min_credit_grams = 1000
//!
//! [tiers]
//! platinum_min = 90
//! gold_min = 75
//! silver_min = 50
//! ```
//!
//! Every field has a default; a missing file yields the default config.

use crate::core::error::{LedgerError, LedgerResult};
use crate::core::types::{Principal, TrustTier};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Owner used when none is configured. Rejected in `production` builds.
pub const DEFAULT_OWNER: &str = "ledger-owner";

/// Configuration root.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node settings.
    pub node: NodeSettings,
    /// Ledger policy.
    pub ledger: LedgerSettings,
    /// Trust tier cutoffs.
    pub tiers: TierPolicy,
    /// Metrics endpoint.
    pub metrics: MetricsSettings,
    /// Logging.
    pub log: LogSettings,
}

/// Node settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Human-readable name.
    pub name: String,
    /// sled directory.
    pub data_dir: String,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            name: "quantumeco".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

/// Ledger policy constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    /// Ledger owner; manages the verifier set.
    pub owner: String,
    /// Principal allowed to update trust scores (defaults to the owner).
    pub trust_admin: Option<String>,
    /// Smallest issuable credit in grams.
    pub min_credit_grams: u64,
    /// Trust token validity when the caller passes 0.
    pub default_validity_secs: u64,
    /// Longest credit lifetime in years.
    pub max_credit_years: u32,
    /// Maximum entries any single scan may visit.
    pub max_scan_entries: usize,
    /// Longest a write may wait in the queue before it is rejected.
    pub op_budget_ms: u64,
    /// Write queue capacity.
    pub queue_capacity: usize,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            trust_admin: None,
            min_credit_grams: 1_000,
            default_validity_secs: 365 * 24 * 60 * 60,
            max_credit_years: 100,
            max_scan_entries: 100_000,
            op_budget_ms: 5_000,
            queue_capacity: 1_024,
        }
    }
}

impl LedgerSettings {
    /// Owner principal.
    pub fn owner(&self) -> Principal {
        Principal::new(self.owner.trim())
    }

    /// Trust administrator, falling back to the owner.
    pub fn trust_admin(&self) -> Principal {
        match self.trust_admin.as_deref().map(str::trim) {
            Some(a) if !a.is_empty() => Principal::new(a),
            _ => self.owner(),
        }
    }
}

/// Trust-score cutoffs for [`TrustTier`]. Scores at or above a cutoff fall in that tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierPolicy {
    /// Lowest platinum score.
    pub platinum_min: u32,
    /// Lowest gold score.
    pub gold_min: u32,
    /// Lowest silver score.
    pub silver_min: u32,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            platinum_min: 90,
            gold_min: 75,
            silver_min: 50,
        }
    }
}

impl TierPolicy {
    /// Tier for a trust score.
    pub fn tier_for(&self, score: u32) -> TrustTier {
        if score >= self.platinum_min {
            TrustTier::Platinum
        } else if score >= self.gold_min {
            TrustTier::Gold
        } else if score >= self.silver_min {
            TrustTier::Silver
        } else {
            TrustTier::Bronze
        }
    }

    fn validate(&self) -> LedgerResult<()> {
        let ordered = self.platinum_min <= 100
            && self.platinum_min > self.gold_min
            && self.gold_min > self.silver_min;
        if !ordered {
            return Err(LedgerError::Config(format!(
                "tier cutoffs must satisfy 100 >= platinum > gold > silver, got {}/{}/{}",
                self.platinum_min, self.gold_min, self.silver_min
            )));
        }
        Ok(())
    }
}

/// Metrics endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Listen address; empty disables the endpoint.
    pub listen_addr: String,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:9464".to_string(),
        }
    }
}

/// Logging.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `trace`, `debug`, `info`, `warn` or `error`.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LogSettings {
    /// Parsed level, `info` on unknown input.
    pub fn level(&self) -> tracing::Level {
        self.level
            .parse::<tracing::Level>()
            .unwrap_or(tracing::Level::INFO)
    }
}

impl NodeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> LedgerResult<Self> {
        let cfg: NodeConfig =
            toml::from_str(raw).map_err(|e| LedgerError::Config(format!("parse: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load(path: &Path) -> LedgerResult<Self> {
        if !path.exists() {
            let cfg = Self::default();
            cfg.validate()?;
            return Ok(cfg);
        }
        let raw = fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.ledger.owner.trim().is_empty() {
            return Err(LedgerError::Config("ledger.owner must be set".into()));
        }
        if cfg!(feature = "production") && self.ledger.owner.trim() == DEFAULT_OWNER {
            return Err(LedgerError::Config(
                "ledger.owner must be set explicitly in production builds".into(),
            ));
        }
        if self.ledger.queue_capacity == 0 {
            return Err(LedgerError::Config("ledger.queue_capacity must be > 0".into()));
        }
        if self.ledger.max_scan_entries == 0 {
            return Err(LedgerError::Config(
                "ledger.max_scan_entries must be > 0".into(),
            ));
        }
        if self.ledger.max_credit_years == 0 {
            return Err(LedgerError::Config(
                "ledger.max_credit_years must be > 0".into(),
            ));
        }
        self.tiers.validate()
    }
}
