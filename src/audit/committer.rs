//! Audit Batch Committer
//!
//! Seals every routing decision in a period under one Merkle root and
//! writes that root to the ledger. A batch exists only once the ledger
//! has returned a receipt for it.
//!
//! Each period has its own commit lock, held across the ledger call so two
//! commits of the same period cannot both reach the ledger. The decision log
//! itself is only read for the snapshot, never held during submission.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::audit::ledger::{LedgerClient, LedgerCommitment};
use crate::audit::merkle::{MerkleProof, MerkleTree};
use crate::audit::period::{Period, PeriodSpan};
use crate::error::{EngineError, Result};
use crate::routing::{DecisionLog, RoutingDecision, RoutingStats, TopModel};

/// A committed batch of routing decisions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub period: String,
    pub span: PeriodSpan,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub merkle_root: String,
    pub total_requests: u64,
    /// Decision ids in leaf order
    pub decision_ids: Vec<String>,
    pub top_models: Vec<TopModel>,
    pub ledger_tx: String,
    pub block_number: u64,
    pub committed_at: DateTime<Utc>,
}

/// Proof that one decision is part of a committed batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InclusionProof {
    pub period: String,
    pub decision_id: String,
    pub merkle_root: String,
    pub ledger_tx: String,
    pub proof: MerkleProof,
}

struct CommittedBatch {
    batch: Batch,
    tree: MerkleTree,
}

pub struct BatchCommitter {
    decisions: Arc<DecisionLog>,
    ledger: Arc<dyn LedgerClient>,
    submit_timeout: Duration,
    /// Per-period commit locks
    slots: DashMap<String, Arc<Mutex<()>>>,
    committed: DashMap<String, Arc<CommittedBatch>>,
    /// Decision ids sealed in a batch or claimed by a commit in flight
    claimed: Mutex<HashSet<String>>,
}

impl BatchCommitter {
    pub fn new(
        decisions: Arc<DecisionLog>,
        ledger: Arc<dyn LedgerClient>,
        submit_timeout: Duration,
    ) -> Self {
        Self {
            decisions,
            ledger,
            submit_timeout,
            slots: DashMap::new(),
            committed: DashMap::new(),
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Commit all not-yet-committed decisions whose timestamp falls in `period`
    pub async fn commit_batch(&self, period: &str) -> Result<Batch> {
        let period: Period = period.parse()?;
        let label = period.label();

        let slot = self
            .slots
            .entry(label.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let _guard = slot.lock().await;

        if let Some(existing) = self.committed_batch(&label) {
            warn!(period = %label, tx = %existing.batch.ledger_tx, "Period already committed");
            return Err(EngineError::DuplicateCommit {
                batch: Box::new(existing.batch.clone()),
            });
        }

        let snapshot = self.decisions.in_range(period.start, period.end()).await;
        let decisions = self.claim(snapshot).await;
        let ids: Vec<String> = decisions.iter().map(|d| d.id.clone()).collect();

        match self.seal(&period, &decisions).await {
            Ok(committed) => {
                let batch = committed.batch.clone();
                self.committed.insert(label.clone(), Arc::new(committed));
                info!(
                    period = %label,
                    decisions = batch.total_requests,
                    root = %batch.merkle_root,
                    tx = %batch.ledger_tx,
                    "Committed routing batch"
                );
                Ok(batch)
            }
            Err(e) => {
                self.release(&ids).await;
                warn!(period = %label, error = %e, "Batch commit failed; decisions released");
                Err(e)
            }
        }
    }

    pub fn batch(&self, period: &str) -> Result<Batch> {
        let label = period.parse::<Period>()?.label();
        self.committed_batch(&label)
            .map(|c| c.batch.clone())
            .ok_or_else(|| EngineError::NotFound(format!("batch for period '{}'", label)))
    }

    /// All committed batches, oldest period first
    pub fn batches(&self) -> Vec<Batch> {
        let mut batches: Vec<Batch> = self
            .committed
            .iter()
            .map(|e| e.value().batch.clone())
            .collect();
        batches.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.period.cmp(&b.period)));
        batches
    }

    pub fn inclusion_proof(&self, period: &str, decision_id: &str) -> Result<InclusionProof> {
        let label = period.parse::<Period>()?.label();
        let committed = self
            .committed_batch(&label)
            .ok_or_else(|| EngineError::NotFound(format!("batch for period '{}'", label)))?;

        let index = committed
            .batch
            .decision_ids
            .iter()
            .position(|id| id == decision_id)
            .ok_or_else(|| {
                EngineError::NotFound(format!(
                    "decision '{}' in batch '{}'",
                    decision_id, label
                ))
            })?;

        Ok(InclusionProof {
            period: label,
            decision_id: decision_id.to_string(),
            merkle_root: committed.batch.merkle_root.clone(),
            ledger_tx: committed.batch.ledger_tx.clone(),
            proof: committed.tree.generate_proof(index)?,
        })
    }

    fn committed_batch(&self, label: &str) -> Option<Arc<CommittedBatch>> {
        self.committed.get(label).map(|e| e.value().clone())
    }

    /// Drop decisions already claimed by another batch and claim the rest
    async fn claim(&self, snapshot: Vec<RoutingDecision>) -> Vec<RoutingDecision> {
        let mut claimed = self.claimed.lock().await;
        let before = snapshot.len();
        let fresh: Vec<RoutingDecision> = snapshot
            .into_iter()
            .filter(|d| !claimed.contains(&d.id))
            .collect();
        for decision in &fresh {
            claimed.insert(decision.id.clone());
        }
        if fresh.len() < before {
            debug!(
                skipped = before - fresh.len(),
                "Skipped decisions already in another batch"
            );
        }
        fresh
    }

    async fn release(&self, ids: &[String]) {
        let mut claimed = self.claimed.lock().await;
        for id in ids {
            claimed.remove(id);
        }
    }

    async fn seal(&self, period: &Period, decisions: &[RoutingDecision]) -> Result<CommittedBatch> {
        let tree = MerkleTree::from_items(decisions)?;
        let stats = RoutingStats::from_decisions(0, decisions);
        let commitment = LedgerCommitment {
            period: period.label(),
            merkle_root: tree.root_hex(),
            total_requests: decisions.len() as u64,
            top_models: stats.top_models,
            committed_at: Utc::now(),
        };

        let receipt = match tokio::time::timeout(
            self.submit_timeout,
            self.ledger.submit(&commitment),
        )
        .await
        {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => return Err(EngineError::ExternalLedger(e.to_string())),
            Err(_) => {
                return Err(EngineError::ExternalLedger(format!(
                    "{} ledger timed out after {:?}",
                    self.ledger.name(),
                    self.submit_timeout
                )))
            }
        };

        let batch = Batch {
            period: commitment.period,
            span: period.span,
            start: period.start,
            end: period.end(),
            merkle_root: commitment.merkle_root,
            total_requests: commitment.total_requests,
            decision_ids: decisions.iter().map(|d| d.id.clone()).collect(),
            top_models: commitment.top_models,
            ledger_tx: receipt.tx_hash,
            block_number: receipt.block_number,
            committed_at: receipt.recorded_at,
        };

        Ok(CommittedBatch { batch, tree })
    }
}
