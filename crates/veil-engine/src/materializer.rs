//! Graph materializer (C4, §4.3): turns a workflow's persisted block list
//! into a runnable [`WorkflowGraph`].

use veil_workflow::{registry, Block, Edge, Node, Position, WorkflowError, WorkflowGraph};

use crate::error::EngineResult;

/// Build the runnable graph from a workflow's blocks, already sorted by
/// `(order, created_at)` by the caller/store (§4.3 step 1).
pub fn materialize(mut blocks: Vec<Block>) -> EngineResult<WorkflowGraph> {
    if blocks.is_empty() {
        return Err(WorkflowError::EmptyWorkflow.into());
    }
    blocks.sort_by(|a, b| a.order.cmp(&b.order).then(a.created_at.cmp(&b.created_at)));

    let mut nodes = Vec::with_capacity(blocks.len());
    let mut edges = Vec::new();

    for block in &blocks {
        let def = registry::lookup(&block.block_type)?;
        def.validate_config(&block.config)?;

        nodes.push(Node {
            id: block.id.clone(),
            block_id: block.block_type.clone(),
            node_type: def.category.node_type(),
            data: block.config.clone(),
            alias: block.alias.clone(),
            connector: block.connector_id.clone(),
            position: position_of(block),
        });

        for dep in &block.dependencies {
            let (target_handle, source_handle) = reconcile_handles(block, dep);
            edges.push(Edge {
                id: format!("{}-{}", dep.source(), block.id),
                source: dep.source().to_string(),
                target: block.id.clone(),
                source_handle,
                target_handle,
            });
        }
    }

    dedup_edges(&mut edges);
    normalize_layout(&mut nodes);

    Ok(WorkflowGraph { nodes, edges })
}

fn position_of(block: &Block) -> Option<Position> {
    match (block.position_x, block.position_y) {
        (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some(Position { x, y }),
        _ => None,
    }
}

/// §4.3 step 4: reconcile a dependency against `data.__inputSlots`.
fn reconcile_handles(
    block: &Block,
    dep: &veil_workflow::BlockDependency,
) -> (Option<String>, Option<String>) {
    let mut target_handle = dep.target_handle().map(|s| s.to_string());
    let mut source_handle = dep.source_handle().map(|s| s.to_string());

    if let Some(veil_workflow::Value::Object(slots)) = block.config.get("__inputSlots") {
        for (slot_handle, slot) in slots.iter() {
            let veil_workflow::Value::Object(slot) = slot else { continue };
            let slot_source = slot.get("source").and_then(|v| v.as_str());
            if slot_source != Some(dep.source()) {
                continue;
            }
            if target_handle.is_none() {
                target_handle = Some(slot_handle.clone());
            }
            if source_handle.is_none() {
                source_handle = slot.get("output").and_then(|v| v.as_str()).map(|s| s.to_string());
            }
        }
    }

    (target_handle, source_handle)
}

/// Deduplicate by `(source, target, targetHandle)`, keeping the first
/// occurrence.
fn dedup_edges(edges: &mut Vec<Edge>) {
    let mut seen = std::collections::HashSet::new();
    edges.retain(|e| seen.insert(e.identity()));
}

/// §4.3 step 5: replace all positions with a grid layout if positions are
/// missing, too clustered, or too tightly spread.
fn normalize_layout(nodes: &mut [Node]) {
    let n = nodes.len();
    let distinct_threshold = n.div_ceil(3);

    let has_missing = nodes.iter().any(|node| node.position.is_none());

    let positions: Vec<Position> = nodes.iter().filter_map(|node| node.position).collect();
    let distinct_points: std::collections::HashSet<(i64, i64)> = positions
        .iter()
        .map(|p| ((p.x * 1000.0) as i64, (p.y * 1000.0) as i64))
        .collect();

    let (spread_x, spread_y) = if positions.is_empty() {
        (0.0, 0.0)
    } else {
        let min_x = positions.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = positions.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = positions.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = positions.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        (max_x - min_x, max_y - min_y)
    };

    let needs_grid = has_missing
        || distinct_points.len() < distinct_threshold
        || (spread_x < 140.0 && spread_y < 140.0);

    if !needs_grid {
        return;
    }

    for (index, node) in nodes.iter_mut().enumerate() {
        let col = (index % 4) as f64;
        let row = (index / 4) as f64;
        node.position = Some(Position { x: 120.0 + col * 220.0, y: 80.0 + row * 140.0 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use veil_workflow::BlockDependency;

    fn block(id: &str, block_type: &str, order: i64, deps: Vec<BlockDependency>) -> Block {
        Block {
            id: id.to_string(),
            workflow_id: "wf1".to_string(),
            block_type: block_type.to_string(),
            config: veil_workflow::DataObject::new(),
            order,
            alias: None,
            connector_id: None,
            dependencies: deps,
            position_x: None,
            position_y: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_empty_block_list() {
        assert!(materialize(vec![]).is_err());
    }

    #[test]
    fn rejects_unknown_block_type() {
        let blocks = vec![block("n1", "not-a-real-block", 0, vec![])];
        assert!(matches!(materialize(blocks), Err(EngineError::Workflow(WorkflowError::UnknownBlockType(_)))));
    }

    #[test]
    fn builds_edges_from_dependencies() {
        let blocks = vec![
            block("n1", "payload-input", 0, vec![]),
            block("n2", "math-add", 1, vec![BlockDependency::Bare("n1".to_string())]),
        ];
        let graph = materialize(blocks).unwrap();
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].source, "n1");
        assert_eq!(graph.edges[0].target, "n2");
    }

    #[test]
    fn deduplicates_edges_by_identity() {
        let dep = BlockDependency::Full {
            source: "n1".to_string(),
            target_handle: Some("a".to_string()),
            source_handle: None,
        };
        let blocks = vec![
            block("n1", "payload-input", 0, vec![]),
            block("n2", "math-add", 1, vec![dep.clone(), dep]),
        ];
        let graph = materialize(blocks).unwrap();
        assert_eq!(graph.edges.len(), 1);
    }

    #[test]
    fn missing_positions_trigger_grid_layout() {
        let blocks = vec![
            block("n1", "payload-input", 0, vec![]),
            block("n2", "math-add", 1, vec![BlockDependency::Bare("n1".to_string())]),
        ];
        let graph = materialize(blocks).unwrap();
        assert!(graph.nodes.iter().all(|n| n.position.is_some()));
        assert_eq!(graph.nodes[0].position, Some(Position { x: 120.0, y: 80.0 }));
        assert_eq!(graph.nodes[1].position, Some(Position { x: 340.0, y: 80.0 }));
    }
}
