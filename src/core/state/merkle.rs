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

//! Deterministic Merkle tree over ledger state.
//!
//! leaf = SHA256( "QuantumEco-Ledger-Leaf-v1" || SHA256(key) || SHA256(value) )
//! node = SHA256( "QuantumEco-Ledger-Node-v1" || left || right )
//!
//! An odd node at the end of a level is paired with itself.

use ring::digest;
use serde::{Deserialize, Serialize};

/// Hash32 type.
pub type Hash32 = [u8; 32];

/// Root of an empty tree.
pub const EMPTY_ROOT: Hash32 = [0u8; 32];

const LEAF_DOMAIN: &[u8] = b"QuantumEco-Ledger-Leaf-v1";
const NODE_DOMAIN: &[u8] = b"QuantumEco-Ledger-Node-v1";

/// Side of sibling in proof.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// Sibling is left.
    Left,
    /// Sibling is right.
    Right,
}

/// One proof step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofItem {
    /// Position of the sibling relative to the running hash.
    pub side: Side,
    /// Sibling hash.
    pub sibling: Hash32,
}

/// Merkle inclusion proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Leaf hash.
    pub leaf: Hash32,
    /// Path items from leaf to root.
    pub path: Vec<ProofItem>,
}

impl MerkleProof {
    /// Recompute the root and compare.
    pub fn verify(&self, root: Hash32) -> bool {
        let mut cur = self.leaf;
        for item in &self.path {
            cur = match item.side {
                Side::Left => hash_node(&item.sibling, &cur),
                Side::Right => hash_node(&cur, &item.sibling),
            };
        }
        cur == root
    }

    /// True if this proof is for exactly `(key, value)`.
    pub fn proves(&self, key: &[u8], value: &[u8]) -> bool {
        self.leaf == hash_leaf(key, value)
    }
}

fn sha256(parts: &[&[u8]]) -> Hash32 {
    let mut ctx = digest::Context::new(&digest::SHA256);
    for p in parts {
        ctx.update(p);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(ctx.finish().as_ref());
    out
}

/// Domain-separated leaf hash.
pub fn hash_leaf(key: &[u8], value: &[u8]) -> Hash32 {
    sha256(&[LEAF_DOMAIN, &sha256(&[key]), &sha256(&[value])])
}

fn hash_node(left: &Hash32, right: &Hash32) -> Hash32 {
    sha256(&[NODE_DOMAIN, left, right])
}

/// All levels of the tree, leaves first.
#[derive(Clone, Debug)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash32>>,
}

impl MerkleTree {
    /// Build from key-sorted pairs.
    pub fn build(pairs: &[(Vec<u8>, Vec<u8>)]) -> Self {
        let leaves: Vec<Hash32> = pairs.iter().map(|(k, v)| hash_leaf(k, v)).collect();
        let mut levels = vec![leaves];
        while let Some(top) = levels.last() {
            if top.len() <= 1 {
                break;
            }
            let next: Vec<Hash32> = top
                .chunks(2)
                .map(|c| hash_node(&c[0], c.get(1).unwrap_or(&c[0])))
                .collect();
            levels.push(next);
        }
        Self { levels }
    }

    /// Root hash, [`EMPTY_ROOT`] when there are no leaves.
    pub fn root(&self) -> Hash32 {
        self.levels
            .last()
            .and_then(|l| l.first())
            .copied()
            .unwrap_or(EMPTY_ROOT)
    }

    /// Number of leaves.
    pub fn len(&self) -> usize {
        self.levels.first().map_or(0, Vec::len)
    }

    /// True when there are no leaves.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inclusion proof for leaf `index`.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let leaf = *self.levels.first()?.get(index)?;
        let mut idx = index;
        let mut path = Vec::with_capacity(self.levels.len());
        for level in &self.levels[..self.levels.len() - 1] {
            let is_right = idx % 2 == 1;
            let sib_idx = if is_right { idx - 1 } else { idx + 1 };
            let sibling = *level.get(sib_idx).unwrap_or(&level[idx]);
            path.push(ProofItem {
                side: if is_right { Side::Left } else { Side::Right },
                sibling,
            });
            idx /= 2;
        }
        Some(MerkleProof { leaf, path })
    }
}
