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

//! Persistent key-value state using sled, with atomic multi-key commits,
//! read-check-write transactions, bounded prefix scans and a deterministic
//! Merkle state root.

use crate::core::state::merkle::{MerkleProof, MerkleTree, Hash32};
use crate::core::types::{encode_canonical, CodecError};
use serde::Serialize;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree, UnabortableTransactionError,
};
use thiserror::Error;

/// State errors.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("db open")]
    DbOpen,
    #[error("db io")]
    DbIo,
    #[error("tx conflict")]
    TxConflict,
    /// A scan visited more entries than allowed.
    #[error("scan exceeded {0} entries")]
    ScanLimit(usize),
}

/// State operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KvOp {
    /// Put key/value.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete key.
    Del { key: Vec<u8> },
}

impl KvOp {
    /// Put a canonically encoded value.
    pub fn put<T: Serialize>(key: Vec<u8>, value: &T) -> Result<Self, CodecError> {
        Ok(KvOp::Put {
            key,
            value: encode_canonical(value)?,
        })
    }
}

/// Failure raised inside a [`PersistentState::transact`] closure.
#[derive(Debug)]
pub enum TxError<E> {
    /// Abort with a caller error. Nothing is written.
    Abort(E),
    /// Storage failure or conflict. Conflicts rerun the closure.
    Storage(UnabortableTransactionError),
}

impl<E> From<UnabortableTransactionError> for TxError<E> {
    fn from(e: UnabortableTransactionError) -> Self {
        TxError::Storage(e)
    }
}

/// View of the store inside one serializable transaction.
pub struct StateTx<'a> {
    tree: &'a TransactionalTree,
}

impl StateTx<'_> {
    /// Get value as seen by this transaction.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, UnabortableTransactionError> {
        Ok(self.tree.get(key)?.map(|iv| iv.to_vec()))
    }

    /// True if `key` is present.
    pub fn contains(&self, key: &[u8]) -> Result<bool, UnabortableTransactionError> {
        Ok(self.tree.get(key)?.is_some())
    }

    /// Stage ops; they land only if the closure returns `Ok`.
    pub fn apply(&self, ops: &[KvOp]) -> Result<(), UnabortableTransactionError> {
        for op in ops {
            match op {
                KvOp::Put { key, value } => {
                    self.tree.insert(key.as_slice(), value.as_slice())?;
                }
                KvOp::Del { key } => {
                    self.tree.remove(key.as_slice())?;
                }
            }
        }
        Ok(())
    }
}

/// Persistent state wrapper. Clones share the same database.
#[derive(Clone)]
pub struct PersistentState {
    db: sled::Db,
}

impl PersistentState {
    /// Open sled DB at path (directory).
    pub fn open(path: &str) -> Result<Self, StateError> {
        let db = sled::open(path).map_err(|_| StateError::DbOpen)?;
        Ok(Self { db })
    }

    /// Get value.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        let v = self.db.get(key).map_err(|_| StateError::DbIo)?;
        Ok(v.map(|iv| iv.to_vec()))
    }

    /// True if `key` is present.
    pub fn contains(&self, key: &[u8]) -> Result<bool, StateError> {
        self.db.contains_key(key).map_err(|_| StateError::DbIo)
    }

    /// All pairs under `prefix`, in key order. Fails once more than `max` entries are seen.
    pub fn scan_prefix(
        &self,
        prefix: &[u8],
        max: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StateError> {
        let mut out = Vec::new();
        for item in self.db.scan_prefix(prefix) {
            let (k, v) = item.map_err(|_| StateError::DbIo)?;
            if out.len() >= max {
                return Err(StateError::ScanLimit(max));
            }
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    /// At most `limit` pairs under `prefix`, in key order, strictly after `after`.
    pub fn scan_page(
        &self,
        prefix: &[u8],
        after: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StateError> {
        let start = match after {
            Some(k) => {
                let mut next = k.to_vec();
                next.push(0);
                next
            }
            None => prefix.to_vec(),
        };
        let mut out = Vec::new();
        for item in self.db.range(start..) {
            if out.len() >= limit {
                break;
            }
            let (k, v) = item.map_err(|_| StateError::DbIo)?;
            if !k.starts_with(prefix) {
                break;
            }
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    /// Run `f` as one serializable transaction: its reads and staged writes
    /// commit together or not at all. `f` may run more than once on conflict,
    /// so it must not have side effects outside `tx`.
    pub fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: Fn(&StateTx<'_>) -> Result<T, TxError<E>>,
        E: From<StateError>,
    {
        let res = self
            .db
            .transaction(|tree| -> ConflictableTransactionResult<T, E> {
                let tx = StateTx { tree };
                f(&tx).map_err(|e| match e {
                    TxError::Abort(e) => ConflictableTransactionError::Abort(e),
                    TxError::Storage(e) => e.into(),
                })
            });

        match res {
            Ok(v) => Ok(v),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(_)) => Err(StateError::DbIo.into()),
        }
    }

    /// Apply all ops in one sled transaction, or none of them.
    pub fn commit_atomic(&self, ops: &[KvOp]) -> Result<(), StateError> {
        let res = self
            .db
            .transaction(|t| -> ConflictableTransactionResult<(), StateError> {
                for op in ops {
                    match op {
                        KvOp::Put { key, value } => {
                            t.insert(key.as_slice(), value.as_slice())?;
                        }
                        KvOp::Del { key } => {
                            t.remove(key.as_slice())?;
                        }
                    }
                }
                Ok(())
            });

        match res {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(_)) => Err(StateError::DbIo),
        }
    }

    /// Flush dirty buffers to disk.
    pub fn flush(&self) -> Result<(), StateError> {
        self.db.flush().map(|_| ()).map_err(|_| StateError::DbIo)
    }

    fn sorted_pairs(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StateError> {
        // sled iterates in lexicographic key order already.
        let mut pairs: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        for item in self.db.iter() {
            let kv = item.map_err(|_| StateError::DbIo)?;
            pairs.push((kv.0.to_vec(), kv.1.to_vec()));
        }
        Ok(pairs)
    }

    /// Deterministic Merkle root over all KV pairs in DB.
    pub fn state_root(&self) -> Result<Hash32, StateError> {
        let pairs = self.sorted_pairs()?;
        Ok(MerkleTree::build(&pairs).root())
    }

    /// Inclusion proof for `key`, with the root it verifies against.
    pub fn prove_key(&self, key: &[u8]) -> Result<Option<(Hash32, MerkleProof)>, StateError> {
        let pairs = self.sorted_pairs()?;
        let Ok(i) = pairs.binary_search_by(|p| p.0.as_slice().cmp(key)) else {
            return Ok(None);
        };
        let tree = MerkleTree::build(&pairs);
        Ok(tree.proof(i).map(|p| (tree.root(), p)))
    }
}
