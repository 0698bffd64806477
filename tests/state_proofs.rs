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

use quantumeco::core::state::merkle::EMPTY_ROOT;
use quantumeco::core::error::{LedgerError, TxResult};
use quantumeco::core::state::persistent_state::{KvOp, PersistentState};

#[test]
fn test_state_root_and_proof() {
    let dir = tempfile::tempdir().unwrap();
    let st = PersistentState::open(dir.path().to_str().unwrap()).unwrap();
    assert_eq!(st.state_root().unwrap(), EMPTY_ROOT);

    st.commit_atomic(&[
        KvOp::Put {
            key: b"a".to_vec(),
            value: b"1".to_vec(),
        },
        KvOp::Put {
            key: b"b".to_vec(),
            value: b"2".to_vec(),
        },
        KvOp::Put {
            key: b"c".to_vec(),
            value: b"3".to_vec(),
        },
    ])
    .unwrap();

    let root = st.state_root().unwrap();
    let (root2, proof) = st.prove_key(b"b").unwrap().unwrap();
    assert_eq!(root, root2);
    assert!(proof.verify(root));
    assert!(proof.proves(b"b", b"2"));
    assert!(!proof.proves(b"b", b"3"));
    assert!(st.prove_key(b"zz").unwrap().is_none());
}

#[test]
fn test_delete_changes_root() {
    let dir = tempfile::tempdir().unwrap();
    let st = PersistentState::open(dir.path().to_str().unwrap()).unwrap();
    st.commit_atomic(&[
        KvOp::Put {
            key: b"k1".to_vec(),
            value: b"v".to_vec(),
        },
        KvOp::Put {
            key: b"k2".to_vec(),
            value: b"v".to_vec(),
        },
    ])
    .unwrap();
    let before = st.state_root().unwrap();
    st.commit_atomic(&[KvOp::Del {
        key: b"k2".to_vec(),
    }])
    .unwrap();
    assert_ne!(before, st.state_root().unwrap());
    assert!(!st.contains(b"k2").unwrap());
}

#[test]
fn test_scan_prefix_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let st = PersistentState::open(dir.path().to_str().unwrap()).unwrap();
    let ops: Vec<KvOp> = (0u8..5)
        .map(|i| KvOp::Put {
            key: vec![b'p', i],
            value: vec![i],
        })
        .collect();
    st.commit_atomic(&ops).unwrap();
    assert_eq!(st.scan_prefix(b"p", 5).unwrap().len(), 5);
    assert!(st.scan_prefix(b"p", 4).is_err());
    assert!(st.scan_prefix(b"q", 1).unwrap().is_empty());
}

#[test]
fn test_scan_page_resumes_after_key() {
    let dir = tempfile::tempdir().unwrap();
    let st = PersistentState::open(dir.path().to_str().unwrap()).unwrap();
    let ops: Vec<KvOp> = (0u8..5)
        .map(|i| KvOp::Put {
            key: vec![b'p', i],
            value: vec![i],
        })
        .chain(std::iter::once(KvOp::Put {
            key: b"q".to_vec(),
            value: vec![9],
        }))
        .collect();
    st.commit_atomic(&ops).unwrap();

    let first = st.scan_page(b"p", None, 2).unwrap();
    assert_eq!(first.len(), 2);
    let rest = st.scan_page(b"p", Some(first[1].0.as_slice()), 10).unwrap();
    assert_eq!(rest.len(), 3);
    assert_eq!(rest[0].0, vec![b'p', 2]);
    assert!(st.scan_page(b"p", Some(&[b'p', 4][..]), 10).unwrap().is_empty());
}

#[test]
fn test_transact_aborts_without_writes() {
    let dir = tempfile::tempdir().unwrap();
    let st = PersistentState::open(dir.path().to_str().unwrap()).unwrap();
    let before = st.state_root().unwrap();

    let res = st.transact(|tx| -> TxResult<()> {
        tx.apply(&[KvOp::Put {
            key: b"k".to_vec(),
            value: b"v".to_vec(),
        }])?;
        Err(LedgerError::Conflict("stop".into()).into())
    });
    assert!(matches!(res, Err(LedgerError::Conflict(_))));
    assert_eq!(st.state_root().unwrap(), before);

    let seen = st
        .transact(|tx| -> TxResult<bool> {
            tx.apply(&[KvOp::Put {
                key: b"k".to_vec(),
                value: b"v".to_vec(),
            }])?;
            Ok(tx.contains(b"k")?)
        })
        .unwrap();
    assert!(seen);
    assert_eq!(st.get(b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_delivery_proof_against_ledger_root() {
    let fx = common::with_route("route_001", 25_000);
    let proof = fx.ledger.prove_delivery("route_001").unwrap();
    assert_eq!(proof.record.route_id, "route_001");
    assert_eq!(proof.root, fx.ledger.state_root().unwrap());
    assert!(proof.verify());

    let mut forged = proof.clone();
    forged.record.carbon_saved_grams += 1;
    assert!(!forged.verify());

    assert!(fx.ledger.prove_delivery("route_missing").is_err());
}
