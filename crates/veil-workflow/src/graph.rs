//! The materialized, runnable workflow graph: nodes, edges, validation, and
//! the deterministic topological sort the executor walks.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{WorkflowError, WorkflowResult};
use crate::value::DataObject;

/// Node category, derived from the block-definition registry's category at
/// materialization time (§4.3 step 3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Input,
    Compute,
    Action,
    Output,
    Condition,
    Transform,
}

/// A vertex in the materialized workflow graph, corresponding to one block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub block_id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub data: DataObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A directed data dependency between two nodes. Identity is
/// `{source, target, target_handle}` — duplicates by this key must not exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    pub fn identity(&self) -> (String, String, Option<String>) {
        (self.source.clone(), self.target.clone(), self.target_handle.clone())
    }
}

/// The materialized, runnable workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkflowGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl WorkflowGraph {
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.id.clone()).collect()
    }

    /// Edges terminating at `node_id`, in graph order.
    pub fn incoming_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == node_id)
    }

    /// Edges originating at `node_id`, in graph order.
    pub fn outgoing_edges<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == node_id)
    }

    /// Validates invariants 1-3 of §3 (edge endpoints exist, DAG, at most one
    /// incoming edge per target handle) and returns the deterministic
    /// topological order (§4.4).
    pub fn validate_and_sort(&self) -> WorkflowResult<Vec<String>> {
        if self.nodes.is_empty() {
            return Err(WorkflowError::EmptyWorkflow);
        }

        let node_set: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &self.edges {
            if !node_set.contains(edge.source.as_str()) {
                return Err(WorkflowError::DanglingEdge(edge.source.clone()));
            }
            if !node_set.contains(edge.target.as_str()) {
                return Err(WorkflowError::DanglingEdge(edge.target.clone()));
            }
        }

        let mut seen_handles: HashSet<(String, Option<String>)> = HashSet::new();
        for edge in &self.edges {
            let key = (edge.target.clone(), edge.target_handle.clone());
            if !seen_handles.insert(key) {
                return Err(WorkflowError::DuplicateTargetHandle {
                    node: edge.target.clone(),
                    handle: edge.target_handle.clone().unwrap_or_default(),
                });
            }
        }

        topological_sort(&self.nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>(), &self.edges)
    }
}

/// Kahn's algorithm over id-addressed edges. Nodes are dequeued in FIFO
/// order, with ties broken by node insertion order (the order `node_ids`
/// lists them), making the resulting order deterministic for a fixed graph.
pub fn topological_sort(node_ids: &[String], edges: &[Edge]) -> WorkflowResult<Vec<String>> {
    let mut in_degree: HashMap<&str, usize> = node_ids.iter().map(|id| (id.as_str(), 0)).collect();
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();

    for edge in edges {
        *in_degree.entry(edge.target.as_str()).or_insert(0) += 1;
        adjacency.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
    }

    let mut queue: VecDeque<&str> = VecDeque::new();
    for id in node_ids {
        if in_degree.get(id.as_str()).copied().unwrap_or(0) == 0 {
            queue.push_back(id.as_str());
        }
    }

    let mut order = Vec::with_capacity(node_ids.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        if let Some(children) = adjacency.get(id) {
            for &child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }
    }

    if order.len() != node_ids.len() {
        return Err(WorkflowError::CycleDetected);
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, node_type: NodeType) -> Node {
        Node {
            id: id.to_string(),
            block_id: "payload-input".to_string(),
            node_type,
            data: DataObject::new(),
            alias: None,
            connector: None,
            position: None,
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> Edge {
        Edge {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            source_handle: None,
            target_handle: None,
        }
    }

    #[test]
    fn sorts_linear_chain_in_order() {
        let graph = WorkflowGraph {
            nodes: vec![
                node("n1", NodeType::Input),
                node("n2", NodeType::Compute),
                node("n3", NodeType::Output),
            ],
            edges: vec![edge("e1", "n1", "n2"), edge("e2", "n2", "n3")],
        };
        let order = graph.validate_and_sort().unwrap();
        assert_eq!(order, vec!["n1", "n2", "n3"]);
    }

    #[test]
    fn rejects_cycle() {
        let graph = WorkflowGraph {
            nodes: vec![node("n1", NodeType::Compute), node("n2", NodeType::Compute)],
            edges: vec![edge("e1", "n1", "n2"), edge("e2", "n2", "n1")],
        };
        assert_eq!(graph.validate_and_sort(), Err(WorkflowError::CycleDetected));
    }

    #[test]
    fn rejects_dangling_edge() {
        let graph = WorkflowGraph {
            nodes: vec![node("n1", NodeType::Compute)],
            edges: vec![edge("e1", "n1", "ghost")],
        };
        assert!(matches!(
            graph.validate_and_sort(),
            Err(WorkflowError::DanglingEdge(_))
        ));
    }

    #[test]
    fn rejects_empty_graph() {
        let graph = WorkflowGraph::default();
        assert_eq!(graph.validate_and_sort(), Err(WorkflowError::EmptyWorkflow));
    }
}
