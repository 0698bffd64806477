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

//! Single-writer executor.
//!
//! All mutating operations are queued on one mailbox and applied in arrival
//! order by a dedicated blocking task, so two writes never interleave their
//! read-check-commit sequences. Reads bypass the queue through
//! [`LedgerHandle::ledger`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::core::{
    error::{LedgerError, LedgerResult},
    ledger::Ledger,
    registry::authorization::AuthorizationPolicy,
    types::{
        CarbonCredit, DeliveryRecord, NewCarbonCredit, NewDelivery, NewTrustToken, Principal,
        TrustToken,
    },
};
use crate::monitoring::metrics::Metrics;

type Reply<T> = oneshot::Sender<LedgerResult<T>>;

/// Executor tuning.
#[derive(Clone, Debug)]
pub struct ExecutorSettings {
    /// Mailbox capacity; senders wait when full.
    pub queue_capacity: usize,
    /// Longest a command may wait before it is rejected unprocessed.
    pub op_budget: Duration,
}

impl ExecutorSettings {
    /// Settings from the `[ledger]` config section.
    pub fn from_config(cfg: &crate::core::config::LedgerSettings) -> Self {
        Self {
            queue_capacity: cfg.queue_capacity,
            op_budget: Duration::from_millis(cfg.op_budget_ms),
        }
    }
}

enum Command {
    AddDelivery {
        caller: Principal,
        input: NewDelivery,
        reply: Reply<DeliveryRecord>,
    },
    AuthorizeVerifier {
        caller: Principal,
        principal: Principal,
        reply: Reply<bool>,
    },
    RevokeVerifier {
        caller: Principal,
        principal: Principal,
        reply: Reply<bool>,
    },
    CreateEtt {
        caller: Principal,
        input: NewTrustToken,
        reply: Reply<TrustToken>,
    },
    TransferEtt {
        caller: Principal,
        from: Principal,
        to: Principal,
        token_id: u64,
        reply: Reply<TrustToken>,
    },
    ApproveEtt {
        caller: Principal,
        token_id: u64,
        delegate: Principal,
        reply: Reply<()>,
    },
    UpdateTrustScore {
        caller: Principal,
        token_id: u64,
        new_score: u32,
        reply: Reply<TrustToken>,
    },
    IssueCredit {
        caller: Principal,
        input: NewCarbonCredit,
        reply: Reply<CarbonCredit>,
    },
    RetireCredit {
        caller: Principal,
        credit_id: u64,
        amount: u64,
        reason: String,
        reply: Reply<CarbonCredit>,
    },
    Shutdown,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::AddDelivery { .. } => "add_delivery_record",
            Command::AuthorizeVerifier { .. } => "authorize_verifier",
            Command::RevokeVerifier { .. } => "revoke_verifier",
            Command::CreateEtt { .. } => "create_ett",
            Command::TransferEtt { .. } => "transfer_from",
            Command::ApproveEtt { .. } => "approve",
            Command::UpdateTrustScore { .. } => "update_trust_score",
            Command::IssueCredit { .. } => "issue_carbon_credit",
            Command::RetireCredit { .. } => "retire_carbon_credit",
            Command::Shutdown => "shutdown",
        }
    }

    fn reject(self, err: LedgerError) {
        // A dropped receiver only means the caller stopped waiting.
        match self {
            Command::AddDelivery { reply, .. } => drop(reply.send(Err(err))),
            Command::AuthorizeVerifier { reply, .. } | Command::RevokeVerifier { reply, .. } => {
                drop(reply.send(Err(err)))
            }
            Command::CreateEtt { reply, .. }
            | Command::TransferEtt { reply, .. }
            | Command::UpdateTrustScore { reply, .. } => drop(reply.send(Err(err))),
            Command::ApproveEtt { reply, .. } => drop(reply.send(Err(err))),
            Command::IssueCredit { reply, .. } | Command::RetireCredit { reply, .. } => {
                drop(reply.send(Err(err)))
            }
            Command::Shutdown => {}
        }
    }
}

struct Envelope {
    enqueued: Instant,
    cmd: Command,
}

fn settle<T>(metrics: Option<&Metrics>, op: &'static str, res: LedgerResult<T>, reply: Reply<T>) {
    if let Err(e) = &res {
        warn!(op, kind = %e.kind(), error = %e, "write rejected");
        if let Some(m) = metrics {
            m.writes_rejected_total
                .with_label_values(&[e.kind().as_str()])
                .inc();
        }
    }
    let _ = reply.send(res);
}

fn apply(ledger: &Ledger, metrics: Option<&Metrics>, cmd: Command) {
    match cmd {
        Command::AddDelivery {
            caller,
            input,
            reply,
        } => {
            let res = ledger.deliveries().add_delivery_record(&caller, input);
            if let (Ok(_), Some(m)) = (&res, metrics) {
                m.deliveries_recorded_total.inc();
            }
            settle(metrics, "add_delivery_record", res, reply);
        }
        Command::AuthorizeVerifier {
            caller,
            principal,
            reply,
        } => {
            let res = ledger.deliveries().authorize_verifier(&caller, &principal);
            settle(metrics, "authorize_verifier", res, reply);
        }
        Command::RevokeVerifier {
            caller,
            principal,
            reply,
        } => {
            let res = ledger.deliveries().revoke_verifier(&caller, &principal);
            settle(metrics, "revoke_verifier", res, reply);
        }
        Command::CreateEtt {
            caller,
            input,
            reply,
        } => {
            let res = ledger.trust_tokens().create_ett(&caller, input);
            if let (Ok(_), Some(m)) = (&res, metrics) {
                m.etts_minted_total.inc();
            }
            settle(metrics, "create_ett", res, reply);
        }
        Command::TransferEtt {
            caller,
            from,
            to,
            token_id,
            reply,
        } => {
            let res = ledger
                .trust_tokens()
                .transfer_from(&caller, &from, &to, token_id);
            settle(metrics, "transfer_from", res, reply);
        }
        Command::ApproveEtt {
            caller,
            token_id,
            delegate,
            reply,
        } => {
            let res = ledger.trust_tokens().approve(&caller, token_id, &delegate);
            settle(metrics, "approve", res, reply);
        }
        Command::UpdateTrustScore {
            caller,
            token_id,
            new_score,
            reply,
        } => {
            let res = ledger
                .trust_tokens()
                .update_trust_score(&caller, token_id, new_score);
            settle(metrics, "update_trust_score", res, reply);
        }
        Command::IssueCredit {
            caller,
            input,
            reply,
        } => {
            let res = ledger.carbon_credits().issue_carbon_credit(&caller, input);
            if let (Ok(_), Some(m)) = (&res, metrics) {
                m.credits_issued_total.inc();
            }
            settle(metrics, "issue_carbon_credit", res, reply);
        }
        Command::RetireCredit {
            caller,
            credit_id,
            amount,
            reason,
            reply,
        } => {
            let res = ledger
                .carbon_credits()
                .retire_carbon_credit(&caller, credit_id, amount, &reason);
            if let (Ok(_), Some(m)) = (&res, metrics) {
                m.carbon_retired_grams_total.inc_by(amount);
            }
            settle(metrics, "retire_carbon_credit", res, reply);
        }
        Command::Shutdown => {}
    }
}

fn run(
    ledger: Arc<Ledger>,
    metrics: Option<Arc<Metrics>>,
    budget: Duration,
    mut rx: mpsc::Receiver<Envelope>,
) {
    info!(budget_ms = budget.as_millis() as u64, "ledger executor started");
    while let Some(Envelope { enqueued, cmd }) = rx.blocking_recv() {
        if let Some(m) = &metrics {
            m.write_queue_depth.dec();
        }
        if matches!(cmd, Command::Shutdown) {
            break;
        }
        let waited = enqueued.elapsed();
        if waited > budget {
            let op = cmd.name();
            warn!(op, waited_ms = waited.as_millis() as u64, "write exceeded queue budget");
            let err = LedgerError::resource_limit(format!(
                "{op} waited {}ms in queue, budget is {}ms",
                waited.as_millis(),
                budget.as_millis()
            ));
            if let Some(m) = &metrics {
                m.writes_rejected_total
                    .with_label_values(&[err.kind().as_str()])
                    .inc();
            }
            cmd.reject(err);
            continue;
        }
        apply(&ledger, metrics.as_deref(), cmd);
    }
    rx.close();
    while let Ok(env) = rx.try_recv() {
        if let Some(m) = &metrics {
            m.write_queue_depth.dec();
        }
        env.cmd.reject(LedgerError::Unavailable);
    }
    if let Err(e) = ledger.flush() {
        warn!(error = %e, "flush on executor shutdown failed");
    }
    info!("ledger executor stopped");
}

/// Cloneable handle: serialized writes, direct reads.
#[derive(Clone)]
pub struct LedgerHandle {
    tx: mpsc::Sender<Envelope>,
    ledger: Arc<Ledger>,
    metrics: Option<Arc<Metrics>>,
}

/// Start the executor on a blocking thread.
///
/// Must be called from within a tokio runtime.
pub fn spawn_executor(
    ledger: Arc<Ledger>,
    settings: ExecutorSettings,
    metrics: Option<Arc<Metrics>>,
) -> (LedgerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
    let worker_ledger = ledger.clone();
    let worker_metrics = metrics.clone();
    let join = tokio::task::spawn_blocking(move || {
        run(worker_ledger, worker_metrics, settings.op_budget, rx)
    });
    (
        LedgerHandle {
            tx,
            ledger,
            metrics,
        },
        join,
    )
}

impl LedgerHandle {
    /// Ledger for reads.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    async fn send(&self, cmd: Command) -> LedgerResult<()> {
        if let Some(m) = &self.metrics {
            m.write_queue_depth.inc();
        }
        let env = Envelope {
            enqueued: Instant::now(),
            cmd,
        };
        if self.tx.send(env).await.is_err() {
            if let Some(m) = &self.metrics {
                m.write_queue_depth.dec();
            }
            return Err(LedgerError::Unavailable);
        }
        Ok(())
    }

    async fn call<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> LedgerResult<T> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        rx.await.map_err(|_| LedgerError::Unavailable)?
    }

    /// See [`crate::core::registry::delivery::DeliveryLedger::add_delivery_record`].
    pub async fn add_delivery_record(
        &self,
        caller: Principal,
        input: NewDelivery,
    ) -> LedgerResult<DeliveryRecord> {
        self.call(|reply| Command::AddDelivery {
            caller,
            input,
            reply,
        })
        .await
    }

    /// Owner-only; idempotent.
    pub async fn authorize_verifier(
        &self,
        caller: Principal,
        principal: Principal,
    ) -> LedgerResult<bool> {
        self.call(|reply| Command::AuthorizeVerifier {
            caller,
            principal,
            reply,
        })
        .await
    }

    /// Owner-only.
    pub async fn revoke_verifier(
        &self,
        caller: Principal,
        principal: Principal,
    ) -> LedgerResult<bool> {
        self.call(|reply| Command::RevokeVerifier {
            caller,
            principal,
            reply,
        })
        .await
    }

    /// Mint a trust token.
    pub async fn create_ett(
        &self,
        caller: Principal,
        input: NewTrustToken,
    ) -> LedgerResult<TrustToken> {
        self.call(|reply| Command::CreateEtt {
            caller,
            input,
            reply,
        })
        .await
    }

    /// Transfer a trust token.
    pub async fn transfer_from(
        &self,
        caller: Principal,
        from: Principal,
        to: Principal,
        token_id: u64,
    ) -> LedgerResult<TrustToken> {
        self.call(|reply| Command::TransferEtt {
            caller,
            from,
            to,
            token_id,
            reply,
        })
        .await
    }

    /// Approve a transfer delegate.
    pub async fn approve(
        &self,
        caller: Principal,
        token_id: u64,
        delegate: Principal,
    ) -> LedgerResult<()> {
        self.call(|reply| Command::ApproveEtt {
            caller,
            token_id,
            delegate,
            reply,
        })
        .await
    }

    /// Administrator-only score change.
    pub async fn update_trust_score(
        &self,
        caller: Principal,
        token_id: u64,
        new_score: u32,
    ) -> LedgerResult<TrustToken> {
        self.call(|reply| Command::UpdateTrustScore {
            caller,
            token_id,
            new_score,
            reply,
        })
        .await
    }

    /// Issue a carbon credit.
    pub async fn issue_carbon_credit(
        &self,
        caller: Principal,
        input: NewCarbonCredit,
    ) -> LedgerResult<CarbonCredit> {
        self.call(|reply| Command::IssueCredit {
            caller,
            input,
            reply,
        })
        .await
    }

    /// Retire part or all of a carbon credit.
    pub async fn retire_carbon_credit(
        &self,
        caller: Principal,
        credit_id: u64,
        amount: u64,
        reason: impl Into<String>,
    ) -> LedgerResult<CarbonCredit> {
        let reason = reason.into();
        self.call(|reply| Command::RetireCredit {
            caller,
            credit_id,
            amount,
            reason,
            reply,
        })
        .await
    }

    /// Ask the executor to stop after the writes already queued ahead of this call.
    pub async fn shutdown(&self) -> LedgerResult<()> {
        self.send(Command::Shutdown).await
    }

    /// Ledger owner, for callers that act on its behalf.
    pub fn owner(&self) -> Principal {
        self.ledger.deliveries().policy().owner().clone()
    }
}
