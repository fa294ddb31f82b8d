//! Credit planner (C6, §4.5): the plan/reserve/commit contract the run
//! executor drives before and after dispatch.

use veil_workflow::{registry, WorkflowGraph};

use crate::error::{EngineError, EngineResult};
use crate::storage::{CommitOutcome, CreditLedger};

/// Base cost added to every run on top of per-node costs.
pub const BASE_RUN_COST: i64 = 1;

/// §4.5 `plan`: sum of per-node costs (input/output/logic/extract nodes are
/// free) plus the base run cost.
pub fn plan(graph: &WorkflowGraph) -> i64 {
    let per_node: i64 = graph
        .nodes
        .iter()
        .filter_map(|n| registry::lookup(&n.block_id).ok())
        .filter_map(|def| def.cost)
        .sum();
    per_node + BASE_RUN_COST
}

/// `reserve`: pre-flight check only, never debits.
pub async fn reserve(ledger: &dyn CreditLedger, org: &str, required: i64) -> EngineResult<()> {
    match ledger.reserve(org, required).await? {
        crate::storage::ReserveOutcome::Reserved => Ok(()),
        crate::storage::ReserveOutcome::Insufficient { available } => {
            Err(EngineError::InsufficientCredits { required, available })
        }
    }
}

/// `commit`: atomic debit, called only after a successful run.
pub async fn commit(ledger: &dyn CreditLedger, org: &str, required: i64, reason: &str) -> EngineResult<()> {
    match ledger.commit(org, required, reason).await? {
        CommitOutcome::Committed => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryCreditLedger;
    use veil_workflow::{Node, NodeType};

    fn node(id: &str, block_id: &str) -> Node {
        Node {
            id: id.to_string(),
            block_id: block_id.to_string(),
            node_type: NodeType::Compute,
            data: Default::default(),
            alias: None,
            connector: None,
            position: None,
        }
    }

    #[test]
    fn plan_sums_costs_plus_base() {
        let graph = WorkflowGraph {
            nodes: vec![node("n1", "payload-input"), node("n2", "math-add"), node("n3", "nilai-llm")],
            edges: vec![],
        };
        assert_eq!(plan(&graph), 0 + 2 + 25 + BASE_RUN_COST);
    }

    #[tokio::test]
    async fn reserve_fails_when_balance_too_low() {
        let ledger = MemoryCreditLedger::new();
        ledger.grant("org1", 1).await;
        let err = reserve(&ledger, "org1", 10).await.unwrap_err();
        assert!(matches!(err, EngineError::InsufficientCredits { required: 10, available: 1 }));
    }
}
