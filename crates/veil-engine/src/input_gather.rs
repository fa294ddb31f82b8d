//! Node input gathering (§4.8): turns a node's incoming edges into the
//! `__inputs` mapping the dispatcher consults alongside static config.

use veil_workflow::{DataObject, Node, NodeType, Value, WorkflowGraph};

use crate::context::ValueContext;

/// Build `__inputs` for `node`, reading already-written context entries for
/// each incoming edge.
pub fn gather_inputs(graph: &WorkflowGraph, node: &Node, ctx: &ValueContext) -> DataObject {
    let mut inputs = DataObject::new();

    for edge in graph.incoming_edges(&node.id) {
        let Some(source) = graph.get_node(&edge.source) else { continue };

        let source_output = edge.source_handle.clone().unwrap_or_else(|| {
            if source.node_type == NodeType::Input { "value".to_string() } else { "result".to_string() }
        });

        let target_handle = edge.target_handle.clone().unwrap_or_else(|| {
            if source.node_type == NodeType::Input {
                field_name(source).unwrap_or_else(|| "value".to_string())
            } else {
                "value".to_string()
            }
        });

        let key = format!("{}.{}", edge.source, source_output);
        if let Some(value) = ctx.get(&key) {
            inputs.insert(target_handle, value.clone());
        }
    }

    inputs
}

fn field_name(node: &Node) -> Option<String> {
    match node.data.get("fieldName") {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_workflow::{data_object, Edge};

    fn node(id: &str, node_type: NodeType, data: DataObject) -> Node {
        Node { id: id.to_string(), block_id: "payload-input".to_string(), node_type, data, alias: None, connector: None, position: None }
    }

    #[test]
    fn defaults_to_result_and_value_handles() {
        let n1 = node("n1", NodeType::Compute, DataObject::new());
        let n2 = node("n2", NodeType::Compute, DataObject::new());
        let graph = WorkflowGraph {
            nodes: vec![n1, n2],
            edges: vec![Edge { id: "e1".into(), source: "n1".into(), target: "n2".into(), source_handle: None, target_handle: None }],
        };

        let mut ctx = ValueContext::new();
        ctx.set("n1.result", Value::Int(9));

        let inputs = gather_inputs(&graph, graph.get_node("n2").unwrap(), &ctx);
        assert_eq!(inputs.get("value"), Some(&Value::Int(9)));
    }

    #[test]
    fn input_source_uses_field_name_for_target_handle() {
        let n1 = node("n1", NodeType::Input, data_object([("fieldName", "amount")]));
        let n2 = node("n2", NodeType::Compute, DataObject::new());
        let graph = WorkflowGraph {
            nodes: vec![n1, n2],
            edges: vec![Edge { id: "e1".into(), source: "n1".into(), target: "n2".into(), source_handle: None, target_handle: None }],
        };

        let mut ctx = ValueContext::new();
        ctx.set("n1.value", Value::Int(3));

        let inputs = gather_inputs(&graph, graph.get_node("n2").unwrap(), &ctx);
        assert_eq!(inputs.get("amount"), Some(&Value::Int(3)));
    }

    #[test]
    fn missing_context_entry_is_skipped() {
        let n1 = node("n1", NodeType::Compute, DataObject::new());
        let n2 = node("n2", NodeType::Compute, DataObject::new());
        let graph = WorkflowGraph {
            nodes: vec![n1, n2],
            edges: vec![Edge { id: "e1".into(), source: "n1".into(), target: "n2".into(), source_handle: None, target_handle: None }],
        };

        let ctx = ValueContext::new();
        let inputs = gather_inputs(&graph, graph.get_node("n2").unwrap(), &ctx);
        assert!(inputs.is_empty());
    }
}
