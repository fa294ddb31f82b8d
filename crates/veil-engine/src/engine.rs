//! Run executor (C9, §4.10): the top-level state machine that drives one
//! run from `pending` to a terminal state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use veil_workflow::{registry, Connector, DataObject, ExecutionStep, Node, Run, RunResult, RunStatus, StepStatus, Value};

use crate::adapters::AdapterSet;
use crate::batch::{execute_batch, plan_batch};
use crate::context::ValueContext;
use crate::credit;
use crate::dispatch;
use crate::error::{EngineError, EngineResult};
use crate::input_gather::gather_inputs;
use crate::runtime::RuntimeContext;
use crate::storage::{CreditLedger, RunStore, WorkflowStore};

pub struct RunExecutor {
    pub workflow_store: Arc<dyn WorkflowStore>,
    pub run_store: Arc<dyn RunStore>,
    pub credit_ledger: Arc<dyn CreditLedger>,
    pub adapters: Arc<AdapterSet>,
    pub connectors: Arc<HashMap<String, Connector>>,
}

impl RunExecutor {
    /// Drive `run_id` to completion. `org_id` identifies the credit ledger
    /// account the run bills against.
    pub async fn execute(&self, run_id: &str, org_id: &str, runtime: &RuntimeContext) -> EngineResult<()> {
        let mut run = self.run_store.get(run_id).await?;

        match self.run_inner(&mut run, org_id, runtime).await {
            Ok(result) => {
                self.run_store
                    .update_status(run_id, RunStatus::Succeeded, Some(result))
                    .await?;
                Ok(())
            }
            Err((steps, error)) => {
                warn!(run_id, %error, "run failed");
                let result = RunResult { steps, outputs: DataObject::new(), credits_used: None, error: Some(error.to_string()) };
                self.run_store.update_status(run_id, RunStatus::Failed, Some(result)).await?;
                Ok(())
            }
        }
    }

    /// Runs to completion or returns the steps recorded so far plus the
    /// error that aborted the run (§4.10 transitions).
    async fn run_inner(
        &self,
        run: &mut Run,
        org_id: &str,
        runtime: &RuntimeContext,
    ) -> Result<RunResult, (Vec<ExecutionStep>, EngineError)> {
        self.run_store
            .update_status(&run.id, RunStatus::Running, None)
            .await
            .map_err(|e| (vec![], e))?;

        let graph = self.workflow_store.get_graph(&run.workflow_id).await.map_err(|e| (vec![], e))?;
        let topo_order = graph.validate_and_sort().map_err(|e| (vec![], EngineError::from(e)))?;

        let required = credit::plan(&graph);
        credit::reserve(self.credit_ledger.as_ref(), org_id, required)
            .await
            .map_err(|e| (vec![], e))?;

        let payload = Value::Object(run.payload.clone());
        let mut ctx = ValueContext::new();
        let mut executed: HashSet<String> = HashSet::new();
        let mut steps: Vec<ExecutionStep> = Vec::new();

        let mut position = 0;
        while position < topo_order.len() {
            let node_id = topo_order[position].clone();
            if executed.contains(&node_id) {
                position += 1;
                continue;
            }

            if runtime.is_cancelled() {
                return Err((steps, EngineError::Cancelled));
            }

            let node = graph.get_node(&node_id).expect("topological order only lists known nodes").clone();

            // Output nodes are bindings, not dispatched steps (§4.10): their
            // values are read directly out of the context once the run
            // otherwise completes, in `collect_outputs`.
            if node.node_type == veil_workflow::NodeType::Output {
                executed.insert(node_id);
                position += 1;
                continue;
            }

            if registry::is_mpc_eligible(&node.block_id) {
                let batch = plan_batch(&graph, &topo_order, position, &executed);
                if batch.contains(&node_id) {
                    match execute_batch(&graph, &batch, &payload, &mut ctx, self.adapters.as_ref()).await {
                        Ok(ids) => {
                            for id in &ids {
                                executed.insert(id.clone());
                                let batched_node = graph.get_node(id).expect("batch member exists");
                                steps.push(ExecutionStep {
                                    node_id: id.clone(),
                                    block_id: batched_node.block_id.clone(),
                                    inputs: DataObject::new(),
                                    outputs: ctx.get(&format!("{id}.result")).cloned().unwrap_or(Value::Null),
                                    duration_ms: 0,
                                    status: StepStatus::Success,
                                    error: None,
                                });
                            }
                        }
                        Err(e) => {
                            for id in &batch {
                                let batched_node = graph.get_node(id).expect("batch member exists");
                                steps.push(ExecutionStep {
                                    node_id: id.clone(),
                                    block_id: batched_node.block_id.clone(),
                                    inputs: DataObject::new(),
                                    outputs: Value::Null,
                                    duration_ms: 0,
                                    status: StepStatus::Failed,
                                    error: Some(e.to_string()),
                                });
                            }
                            return Err((steps, e));
                        }
                    }
                    continue;
                }
            }

            match self.dispatch_one(&graph, &node, &payload, &mut ctx).await {
                Ok(step) => {
                    executed.insert(node_id);
                    steps.push(step);
                }
                Err((step, e)) => {
                    steps.push(step);
                    return Err((steps, e));
                }
            }
        }

        let outputs = collect_outputs(&graph, &ctx);

        credit::commit(self.credit_ledger.as_ref(), org_id, required, "run-complete")
            .await
            .map_err(|e| (steps.clone(), EngineError::CommitFailed(e.to_string())))?;

        info!(run_id = %run.id, steps = steps.len(), "run succeeded");
        Ok(RunResult { steps, outputs, credits_used: Some(required), error: None })
    }

    async fn dispatch_one(
        &self,
        graph: &veil_workflow::WorkflowGraph,
        node: &Node,
        payload: &Value,
        ctx: &mut ValueContext,
    ) -> Result<ExecutionStep, (ExecutionStep, EngineError)> {
        let inputs = gather_inputs(graph, node, ctx);
        let started = Instant::now();

        let result = dispatch::dispatch(node, &inputs, payload, ctx, self.connectors.as_ref(), self.adapters.as_ref()).await;
        let duration_ms = started.elapsed().as_millis() as i64;

        match result {
            Ok(output) => {
                let config_alias = node
                    .data
                    .get("alias")
                    .and_then(Value::as_str)
                    .or_else(|| node.data.get("responseAlias").and_then(Value::as_str));
                ctx.write_node_output(&node.id, node.alias.as_deref(), config_alias, &output);

                Ok(ExecutionStep {
                    node_id: node.id.clone(),
                    block_id: node.block_id.clone(),
                    inputs,
                    outputs: output,
                    duration_ms,
                    status: StepStatus::Success,
                    error: None,
                })
            }
            Err(e) => {
                let step = ExecutionStep {
                    node_id: node.id.clone(),
                    block_id: node.block_id.clone(),
                    inputs,
                    outputs: Value::Null,
                    duration_ms,
                    status: StepStatus::Failed,
                    error: Some(e.to_string()),
                };
                Err((step, e))
            }
        }
    }
}

/// §4.10's output-collection pass: for each `output` node, read each
/// incoming edge's context entry and record it under the node's field
/// name, alias, or id.
fn collect_outputs(graph: &veil_workflow::WorkflowGraph, ctx: &ValueContext) -> DataObject {
    let mut outputs = DataObject::new();

    for node in &graph.nodes {
        if node.node_type != veil_workflow::NodeType::Output {
            continue;
        }
        for edge in graph.incoming_edges(&node.id) {
            let source_output = edge.source_handle.clone().unwrap_or_else(|| "result".to_string());
            let key = format!("{}.{}", edge.source, source_output);
            let Some(value) = ctx.get(&key) else { continue };

            let name = node
                .data
                .get("fieldName")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| node.alias.clone())
                .unwrap_or_else(|| node.id.clone());

            outputs.insert(name, value.clone());
        }
    }

    outputs
}
