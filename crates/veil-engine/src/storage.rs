//! Storage layer (C10, §4.11): one async trait per persisted entity the
//! executor touches, each with an in-memory implementation following the
//! workspace's `Arc<RwLock<HashMap>>` pattern.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use veil_workflow::{Block, Run, RunResult, RunStatus, Workflow, WorkflowGraph, WorkflowStatus};

use crate::error::EngineResult;
use crate::materializer::materialize;

/// Workflow lookup, including the graph the executor runs: the embedded
/// graph if published, else freshly materialized from the block list.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get(&self, workflow_id: &str) -> EngineResult<Workflow>;
    async fn get_graph(&self, workflow_id: &str) -> EngineResult<WorkflowGraph>;
    async fn save(&self, workflow: &Workflow) -> EngineResult<()>;
}

#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Ordered by `(order, created_at)`.
    async fn list_for_workflow(&self, workflow_id: &str) -> EngineResult<Vec<Block>>;
    async fn save_all(&self, workflow_id: &str, blocks: Vec<Block>) -> EngineResult<()>;
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn get(&self, run_id: &str) -> EngineResult<Run>;
    async fn save(&self, run: &Run) -> EngineResult<()>;
    /// Atomic for the single owning executor: no other writer updates this
    /// run's status concurrently.
    async fn update_status(
        &self,
        run_id: &str,
        status: RunStatus,
        result: Option<RunResult>,
    ) -> EngineResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    Reserved,
    Insufficient { available: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
}

#[async_trait]
pub trait CreditLedger: Send + Sync {
    async fn get_available(&self, org: &str) -> EngineResult<i64>;
    async fn reserve(&self, org: &str, amount: i64) -> EngineResult<ReserveOutcome>;
    async fn commit(&self, org: &str, amount: i64, reason: &str) -> EngineResult<CommitOutcome>;
}

// --- in-memory implementations --------------------------------------------

#[derive(Default)]
pub struct MemoryWorkflowStore {
    workflows: Arc<RwLock<HashMap<String, Workflow>>>,
    blocks: Arc<RwLock<HashMap<String, Vec<Block>>>>,
}

impl MemoryWorkflowStore {
    pub fn new(blocks: Arc<RwLock<HashMap<String, Vec<Block>>>>) -> Self {
        Self { workflows: Arc::new(RwLock::new(HashMap::new())), blocks }
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn get(&self, workflow_id: &str) -> EngineResult<Workflow> {
        self.workflows
            .read()
            .await
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| crate::error::EngineError::Storage(format!("unknown workflow: {workflow_id}")))
    }

    async fn get_graph(&self, workflow_id: &str) -> EngineResult<WorkflowGraph> {
        let workflow = self.get(workflow_id).await?;
        if workflow.status == WorkflowStatus::Published {
            if let Some(graph) = workflow.graph {
                return Ok(graph);
            }
        }
        let blocks = self.blocks.read().await.get(workflow_id).cloned().unwrap_or_default();
        materialize(blocks)
    }

    async fn save(&self, workflow: &Workflow) -> EngineResult<()> {
        self.workflows.write().await.insert(workflow.id.clone(), workflow.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: Arc<RwLock<HashMap<String, Vec<Block>>>>,
}

impl MemoryBlockStore {
    pub fn new(blocks: Arc<RwLock<HashMap<String, Vec<Block>>>>) -> Self {
        Self { blocks }
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn list_for_workflow(&self, workflow_id: &str) -> EngineResult<Vec<Block>> {
        let mut blocks = self.blocks.read().await.get(workflow_id).cloned().unwrap_or_default();
        blocks.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));
        Ok(blocks)
    }

    async fn save_all(&self, workflow_id: &str, blocks: Vec<Block>) -> EngineResult<()> {
        self.blocks.write().await.insert(workflow_id.to_string(), blocks);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRunStore {
    runs: Arc<RwLock<HashMap<String, Run>>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self { runs: Arc::new(RwLock::new(HashMap::new())) }
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn get(&self, run_id: &str) -> EngineResult<Run> {
        self.runs
            .read()
            .await
            .get(run_id)
            .cloned()
            .ok_or_else(|| crate::error::EngineError::Storage(format!("unknown run: {run_id}")))
    }

    async fn save(&self, run: &Run) -> EngineResult<()> {
        self.runs.write().await.insert(run.id.clone(), run.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        run_id: &str,
        status: RunStatus,
        result: Option<RunResult>,
    ) -> EngineResult<()> {
        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(run_id)
            .ok_or_else(|| crate::error::EngineError::Storage(format!("unknown run: {run_id}")))?;
        run.status = status;
        if result.is_some() {
            run.result = result;
        }
        Ok(())
    }
}

/// In-memory credit ledger, keyed by organization id.
#[derive(Default)]
pub struct MemoryCreditLedger {
    balances: Arc<RwLock<HashMap<String, i64>>>,
}

impl MemoryCreditLedger {
    pub fn new() -> Self {
        Self { balances: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub async fn grant(&self, org: &str, amount: i64) {
        *self.balances.write().await.entry(org.to_string()).or_insert(0) += amount;
    }
}

#[async_trait]
impl CreditLedger for MemoryCreditLedger {
    async fn get_available(&self, org: &str) -> EngineResult<i64> {
        Ok(self.balances.read().await.get(org).copied().unwrap_or(0))
    }

    async fn reserve(&self, org: &str, amount: i64) -> EngineResult<ReserveOutcome> {
        let balances = self.balances.read().await;
        let available = balances.get(org).copied().unwrap_or(0);
        if available < amount {
            return Ok(ReserveOutcome::Insufficient { available });
        }
        Ok(ReserveOutcome::Reserved)
    }

    async fn commit(&self, org: &str, amount: i64, _reason: &str) -> EngineResult<CommitOutcome> {
        let mut balances = self.balances.write().await;
        let entry = balances.entry(org.to_string()).or_insert(0);
        *entry -= amount;
        Ok(CommitOutcome::Committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ledger_reserve_reports_insufficient() {
        let ledger = MemoryCreditLedger::new();
        ledger.grant("org1", 5).await;
        assert_eq!(ledger.reserve("org1", 10).await.unwrap(), ReserveOutcome::Insufficient { available: 5 });
        assert_eq!(ledger.reserve("org1", 5).await.unwrap(), ReserveOutcome::Reserved);
    }

    #[tokio::test]
    async fn ledger_commit_debits_balance() {
        let ledger = MemoryCreditLedger::new();
        ledger.grant("org1", 20).await;
        ledger.commit("org1", 12, "run-complete").await.unwrap();
        assert_eq!(ledger.get_available("org1").await.unwrap(), 8);
    }

    #[tokio::test]
    async fn run_store_round_trips_status() {
        let store = MemoryRunStore::new();
        let run = Run::new("run1".to_string(), "wf1".to_string(), Default::default());
        store.save(&run).await.unwrap();
        store.update_status("run1", RunStatus::Running, None).await.unwrap();
        assert_eq!(store.get("run1").await.unwrap().status, RunStatus::Running);
    }
}
