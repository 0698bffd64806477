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

//! QuantumEco verification ledger.
//!
//! This crate provides:
//! - An owner-managed verifier allow-list
//! - An append-only ledger of verified deliveries with network aggregates
//! - Eco trust tokens (ETTs) minted against verified deliveries
//! - Carbon credits with partial retirement and market aggregates
//! - Persistent key-value state with deterministic Merkle roots and proofs
//! - A single-writer executor, Prometheus metrics and structured logging

/// Ledger primitives (types, registries, state, runtime).
pub mod core;
/// Observability (metrics).
pub mod monitoring;
