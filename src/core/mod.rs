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

/// Injectable time source.
pub mod clock;
/// Node configuration.
pub mod config;
/// Error taxonomy.
pub mod error;
/// Committed ledger notifications.
pub mod events;
/// Registry composition root.
pub mod ledger;
/// Authorization, delivery, trust token and carbon credit registries.
pub mod registry;
/// Single-writer executor.
pub mod runtime;
/// Persistent state and Merkle proofs.
pub mod state;
/// Record types and canonical encoding.
pub mod types;
