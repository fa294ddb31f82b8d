//! Batch planner (C8, §4.9): groups adjacent MPC-eligible nodes into a
//! single MPC-graph submission instead of one per node.

use std::collections::{HashMap, HashSet};

use veil_workflow::{registry, DataObject, Value, WorkflowGraph};

use crate::adapters::{mpc_sub_graph_to_value, AdapterSet, MpcSubGraph, MpcSubGraphEdge, MpcSubGraphNode};
use crate::context::ValueContext;
use crate::dispatch::{normalize_mpc_result, operand_spec, resolve_operand, scope};
use crate::error::{EngineError, EngineResult};
use crate::input_gather::gather_inputs;

/// Fixed-point expansion (§4.9 steps 1-2): which nodes from `topo_order[position..]`
/// can join one MPC-graph submission starting at `position`.
pub fn plan_batch(
    graph: &WorkflowGraph,
    topo_order: &[String],
    position: usize,
    executed: &HashSet<String>,
) -> Vec<String> {
    let seed: Vec<String> = topo_order[position..]
        .iter()
        .filter(|id| {
            !executed.contains(*id)
                && graph.get_node(id).map(|n| registry::is_mpc_eligible(&n.block_id)).unwrap_or(false)
        })
        .cloned()
        .collect();

    let mut batch: HashSet<String> = HashSet::new();
    loop {
        let mut added = false;
        for id in &seed {
            if batch.contains(id) {
                continue;
            }
            let ready = graph
                .incoming_edges(id)
                .all(|e| executed.contains(&e.source) || batch.contains(&e.source));
            if ready {
                batch.insert(id.clone());
                added = true;
            }
        }
        if !added {
            break;
        }
    }

    // Preserve topological order in the result.
    topo_order[position..].iter().filter(|id| batch.contains(*id)).cloned().collect()
}

fn internal_handles(graph: &WorkflowGraph, node_id: &str, batch: &HashSet<String>) -> HashSet<String> {
    graph
        .incoming_edges(node_id)
        .filter(|e| batch.contains(&e.source))
        .map(|e| e.target_handle.clone().unwrap_or_else(|| "value".to_string()))
        .collect()
}

/// Execute one batch: build the sub-graph of external operands + internal
/// edges, submit once, and write every member's result back into `ctx`
/// under the §4.2 overlay rules. Returns the batch member ids on success;
/// on adapter failure, every member should be recorded as a failed step by
/// the caller with the returned error.
pub async fn execute_batch(
    graph: &WorkflowGraph,
    batch: &[String],
    payload: &Value,
    ctx: &mut ValueContext,
    adapters: &AdapterSet,
) -> EngineResult<Vec<String>> {
    let batch_set: HashSet<String> = batch.iter().cloned().collect();
    let scope_value = scope(payload, ctx);

    let mut sub_nodes = Vec::with_capacity(batch.len());
    for id in batch {
        let node = graph
            .get_node(id)
            .ok_or_else(|| EngineError::InputResolution(format!("unknown node in batch: {id}")))?;
        let kind = registry::mpc_sub_graph_kind(&node.block_id)
            .ok_or_else(|| EngineError::InputResolution(format!("node {id} is not MPC-eligible")))?;

        let internal = internal_handles(graph, id, &batch_set);
        let gathered = gather_inputs(graph, node, ctx);

        let mut node_inputs = DataObject::new();
        for (handle, path_key) in operand_spec(&node.block_id) {
            if internal.contains(*handle) {
                continue;
            }
            let resolved = resolve_operand(node, handle, path_key, &gathered, &scope_value).ok_or_else(|| {
                EngineError::InputResolution(format!("missing external operand `{handle}` for node {id}"))
            })?;
            let validated = resolved
                .as_int_lenient()
                .ok_or_else(|| EngineError::InputResolution(format!("Invalid integer for operand `{handle}` on node {id}")))?;
            node_inputs.insert((*handle).to_string(), Value::Int(validated));
        }

        sub_nodes.push(MpcSubGraphNode { id: id.clone(), block_id: kind.to_string(), inputs: node_inputs });
    }

    let sub_edges: Vec<MpcSubGraphEdge> = graph
        .edges
        .iter()
        .filter(|e| batch_set.contains(&e.source) && batch_set.contains(&e.target))
        .map(|e| MpcSubGraphEdge {
            source: e.source.clone(),
            target: e.target.clone(),
            source_handle: e.source_handle.clone(),
            target_handle: e.target_handle.clone(),
        })
        .collect();

    let sub_graph = MpcSubGraph { nodes: sub_nodes, edges: sub_edges };
    let run_tag = batch.join(",");

    let response = adapters
        .mpc_graph
        .execute_block_graph(mpc_sub_graph_to_value(&sub_graph), DataObject::new(), &run_tag)
        .await?;

    for id in batch {
        let node = graph.get_node(id).expect("batch member must exist in graph");
        let raw = response
            .output
            .get(&format!("{id}.result"))
            .cloned()
            .ok_or_else(|| EngineError::Adapter(format!("mpc graph batch response missing output for node {id}")))?;
        let normalized = normalize_mpc_result(&node.block_id, &raw);
        let config_alias = node.data.get("alias").and_then(Value::as_str).or_else(|| node.data.get("responseAlias").and_then(Value::as_str));
        ctx.write_node_output(id, node.alias.as_deref(), config_alias, &normalized);
    }

    Ok(batch.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMpcGraphAdapter;
    use std::sync::Arc;
    use veil_workflow::{data_object, Edge, Node, NodeType};

    fn math_node(id: &str, block_id: &str) -> Node {
        Node {
            id: id.to_string(),
            block_id: block_id.to_string(),
            node_type: NodeType::Compute,
            data: data_object([("aPath", "payload.a"), ("bPath", "payload.b")]),
            alias: None,
            connector: None,
            position: None,
        }
    }

    #[test]
    fn chained_math_nodes_batch_together() {
        let n1 = math_node("n1", "math-add");
        let n2 = math_node("n2", "math-multiply");
        let graph = WorkflowGraph {
            nodes: vec![n1, n2],
            edges: vec![Edge {
                id: "e1".into(),
                source: "n1".into(),
                target: "n2".into(),
                source_handle: None,
                target_handle: Some("a".to_string()),
            }],
        };

        let topo = vec!["n1".to_string(), "n2".to_string()];
        let batch = plan_batch(&graph, &topo, 0, &HashSet::new());
        assert_eq!(batch, vec!["n1", "n2"]);
    }

    #[test]
    fn unresolved_predecessor_excludes_dependent_node() {
        let n1 = Node {
            id: "n1".to_string(),
            block_id: "json-extract".to_string(),
            node_type: NodeType::Transform,
            data: DataObject::new(),
            alias: None,
            connector: None,
            position: None,
        };
        let n2 = math_node("n2", "math-add");
        let graph = WorkflowGraph {
            nodes: vec![n1, n2],
            edges: vec![Edge {
                id: "e1".into(),
                source: "n1".into(),
                target: "n2".into(),
                source_handle: None,
                target_handle: Some("a".to_string()),
            }],
        };

        let topo = vec!["n1".to_string(), "n2".to_string()];
        let batch = plan_batch(&graph, &topo, 1, &HashSet::new());
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn execute_batch_writes_results_for_every_member() {
        let n1 = math_node("n1", "math-add");
        let graph = WorkflowGraph { nodes: vec![n1], edges: vec![] };
        let payload = Value::Object(data_object([("a", 2i64), ("b", 3i64)]));
        let mut ctx = ValueContext::new();

        let adapters = AdapterSet {
            mpc_single: Arc::new(crate::mock::MockMpcSingleAdapter::default()),
            mpc_graph: Arc::new(MockMpcGraphAdapter::default()),
            llm: Arc::new(crate::mock::MockLlmAdapter::default()),
            transfer: Arc::new(crate::mock::MockTransferAdapter::default()),
            kv: Arc::new(crate::mock::MockKvAdapter::default()),
            http: Arc::new(crate::mock::MockHttpAdapter::default()),
        };

        let result = execute_batch(&graph, &["n1".to_string()], &payload, &mut ctx, &adapters).await.unwrap();
        assert_eq!(result, vec!["n1".to_string()]);
        assert!(ctx.get("n1.result").is_some());
    }
}
