//! Postgres-backed implementations of `veil_engine`'s storage traits,
//! bridging DB rows to the domain types the engine operates on.

use async_trait::async_trait;
use sqlx::PgPool;

use veil_engine::error::{EngineError, EngineResult};
use veil_engine::materializer;
use veil_engine::storage::{BlockStore, CommitOutcome, CreditLedger, ReserveOutcome, RunStore, WorkflowStore};
use veil_workflow::{Block, Run, RunResult, RunStatus, Workflow, WorkflowGraph, WorkflowStatus};

use crate::entities::{BlockRow, RunRow, WorkflowRow};
use crate::error::StoreError;
use crate::repositories::{BlockRepository, CreditRepository, RunRepository, WorkflowRepository};

fn store_err(e: StoreError) -> EngineError {
    EngineError::Storage(e.to_string())
}

fn workflow_status_str(status: WorkflowStatus) -> &'static str {
    match status {
        WorkflowStatus::Draft => "draft",
        WorkflowStatus::Published => "published",
        WorkflowStatus::Paused => "paused",
    }
}

fn parse_workflow_status(s: &str) -> WorkflowStatus {
    match s {
        "published" => WorkflowStatus::Published,
        "paused" => WorkflowStatus::Paused,
        _ => WorkflowStatus::Draft,
    }
}

fn run_status_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Pending => "pending",
        RunStatus::Running => "running",
        RunStatus::Succeeded => "succeeded",
        RunStatus::Failed => "failed",
    }
}

fn parse_run_status(s: &str) -> RunStatus {
    match s {
        "running" => RunStatus::Running,
        "succeeded" => RunStatus::Succeeded,
        "failed" => RunStatus::Failed,
        _ => RunStatus::Pending,
    }
}

fn row_to_workflow(row: WorkflowRow) -> Result<Workflow, StoreError> {
    let graph = row
        .graph
        .map(|v| serde_json::from_value::<WorkflowGraph>(v))
        .transpose()?;

    Ok(Workflow {
        id: row.id,
        name: row.name,
        status: parse_workflow_status(&row.status),
        dataset_ref: row.dataset_ref,
        trigger_ref: row.trigger_ref,
        graph,
    })
}

fn workflow_to_row(workflow: &Workflow) -> Result<WorkflowRow, StoreError> {
    let graph = workflow
        .graph
        .as_ref()
        .map(serde_json::to_value)
        .transpose()?;
    let now = chrono::Utc::now();

    Ok(WorkflowRow {
        id: workflow.id.clone(),
        name: workflow.name.clone(),
        status: workflow_status_str(workflow.status).to_string(),
        dataset_ref: workflow.dataset_ref.clone(),
        trigger_ref: workflow.trigger_ref.clone(),
        graph,
        created_at: now,
        updated_at: now,
    })
}

fn row_to_block(row: BlockRow) -> Result<Block, StoreError> {
    Ok(Block {
        id: row.id,
        workflow_id: row.workflow_id,
        block_type: row.block_type,
        config: serde_json::from_value(row.config)?,
        order: row.order_index,
        alias: row.alias,
        connector_id: row.connector_id,
        dependencies: serde_json::from_value(row.dependencies)?,
        position_x: row.position_x,
        position_y: row.position_y,
        created_at: row.created_at,
    })
}

fn block_to_row(block: &Block) -> Result<BlockRow, StoreError> {
    Ok(BlockRow {
        id: block.id.clone(),
        workflow_id: block.workflow_id.clone(),
        block_type: block.block_type.clone(),
        config: serde_json::to_value(&block.config)?,
        order_index: block.order,
        alias: block.alias.clone(),
        connector_id: block.connector_id.clone(),
        dependencies: serde_json::to_value(&block.dependencies)?,
        position_x: block.position_x,
        position_y: block.position_y,
        created_at: block.created_at,
    })
}

fn row_to_run(row: RunRow) -> Result<Run, StoreError> {
    let result = row.result.map(serde_json::from_value::<RunResult>).transpose()?;
    Ok(Run {
        id: row.id,
        workflow_id: row.workflow_id,
        payload: serde_json::from_value(row.payload)?,
        status: parse_run_status(&row.status),
        result,
        created_at: row.created_at,
    })
}

fn run_to_row(run: &Run) -> Result<RunRow, StoreError> {
    Ok(RunRow {
        id: run.id.clone(),
        workflow_id: run.workflow_id.clone(),
        payload: serde_json::to_value(&run.payload)?,
        status: run_status_str(run.status).to_string(),
        result: run.result.as_ref().map(serde_json::to_value).transpose()?,
        created_at: run.created_at,
    })
}

/// Postgres-backed `WorkflowStore`. Falls back to materializing the current
/// block list when the workflow hasn't been published yet, same as the
/// in-memory store.
#[derive(Clone)]
pub struct PostgresWorkflowStore {
    workflows: WorkflowRepository,
    blocks: BlockRepository,
}

impl PostgresWorkflowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { workflows: WorkflowRepository::new(pool.clone()), blocks: BlockRepository::new(pool) }
    }
}

#[async_trait]
impl WorkflowStore for PostgresWorkflowStore {
    async fn get(&self, workflow_id: &str) -> EngineResult<Workflow> {
        let row = self
            .workflows
            .find_by_id(workflow_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| EngineError::Storage(format!("unknown workflow: {workflow_id}")))?;
        row_to_workflow(row).map_err(store_err)
    }

    async fn get_graph(&self, workflow_id: &str) -> EngineResult<WorkflowGraph> {
        let workflow = self.get(workflow_id).await?;
        if workflow.status == WorkflowStatus::Published {
            if let Some(graph) = workflow.graph {
                return Ok(graph);
            }
        }
        let rows = self.blocks.list_for_workflow(workflow_id).await.map_err(store_err)?;
        let blocks = rows
            .into_iter()
            .map(row_to_block)
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;
        materializer::materialize(blocks)
    }

    async fn save(&self, workflow: &Workflow) -> EngineResult<()> {
        let row = workflow_to_row(workflow).map_err(store_err)?;
        self.workflows.upsert(&row).await.map_err(store_err)?;
        Ok(())
    }
}

/// Postgres-backed `BlockStore`.
#[derive(Clone)]
pub struct PostgresBlockStore {
    blocks: BlockRepository,
}

impl PostgresBlockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { blocks: BlockRepository::new(pool) }
    }
}

#[async_trait]
impl BlockStore for PostgresBlockStore {
    async fn list_for_workflow(&self, workflow_id: &str) -> EngineResult<Vec<Block>> {
        let rows = self.blocks.list_for_workflow(workflow_id).await.map_err(store_err)?;
        rows.into_iter().map(|r| row_to_block(r).map_err(store_err)).collect()
    }

    async fn save_all(&self, workflow_id: &str, blocks: Vec<Block>) -> EngineResult<()> {
        let rows = blocks
            .iter()
            .map(|b| block_to_row(b).map_err(store_err))
            .collect::<Result<Vec<_>, _>>()?;
        self.blocks.replace_all(workflow_id, &rows).await.map_err(store_err)
    }
}

/// Postgres-backed `RunStore`.
#[derive(Clone)]
pub struct PostgresRunStore {
    runs: RunRepository,
}

impl PostgresRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { runs: RunRepository::new(pool) }
    }
}

#[async_trait]
impl RunStore for PostgresRunStore {
    async fn get(&self, run_id: &str) -> EngineResult<Run> {
        let row = self
            .runs
            .find_by_id(run_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| EngineError::Storage(format!("unknown run: {run_id}")))?;
        row_to_run(row).map_err(store_err)
    }

    async fn save(&self, run: &Run) -> EngineResult<()> {
        let row = run_to_row(run).map_err(store_err)?;
        self.runs.insert(&row).await.map_err(store_err)
    }

    async fn update_status(&self, run_id: &str, status: RunStatus, result: Option<RunResult>) -> EngineResult<()> {
        let result_json = result.as_ref().map(serde_json::to_value).transpose().map_err(StoreError::from).map_err(store_err)?;
        self.runs
            .update_status(run_id, run_status_str(status), result_json.as_ref())
            .await
            .map_err(store_err)
    }
}

/// Postgres-backed `CreditLedger`.
#[derive(Clone)]
pub struct PostgresCreditLedger {
    credits: CreditRepository,
}

impl PostgresCreditLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { credits: CreditRepository::new(pool) }
    }
}

#[async_trait]
impl CreditLedger for PostgresCreditLedger {
    async fn get_available(&self, org: &str) -> EngineResult<i64> {
        self.credits.get_balance(org).await.map_err(store_err)
    }

    async fn reserve(&self, org: &str, amount: i64) -> EngineResult<ReserveOutcome> {
        let available = self.credits.get_balance(org).await.map_err(store_err)?;
        if available < amount {
            return Ok(ReserveOutcome::Insufficient { available });
        }
        Ok(ReserveOutcome::Reserved)
    }

    async fn commit(&self, org: &str, amount: i64, _reason: &str) -> EngineResult<CommitOutcome> {
        let applied = self.credits.try_debit(org, amount).await.map_err(store_err)?;
        if !applied {
            let available = self.credits.get_balance(org).await.map_err(store_err)?;
            return Err(EngineError::CommitFailed(format!(
                "balance changed since reserve: required {amount}, available {available}"
            )));
        }
        Ok(CommitOutcome::Committed)
    }
}
