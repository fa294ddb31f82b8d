//! The block-definition registry: the closed, static table of block types
//! the platform supports (§4.7, §6 "Block-definition registry").

use serde::{Deserialize, Serialize};

use crate::error::{WorkflowError, WorkflowResult};
use crate::graph::NodeType;
use crate::value::DataObject;

/// Which dispatcher handler a block id routes to (§4.7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Handler {
    Logic,
    Nillion,
    Nilai,
    Zcash,
    Connector,
}

/// The materializer category a block belongs to (§4.3 step 3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Input,
    Compute,
    Action,
    Storage,
    Transform,
    Output,
}

impl Category {
    /// §4.3 step 3's category → node-type mapping. `Output` is this
    /// registry's one addition beyond the distilled category set, so that
    /// workflows can wire an explicit output-binding node the way §4.10
    /// describes (rather than overloading an existing category).
    pub fn node_type(self) -> NodeType {
        match self {
            Category::Input => NodeType::Input,
            Category::Compute | Category::Storage => NodeType::Compute,
            Category::Action => NodeType::Action,
            Category::Transform => NodeType::Transform,
            Category::Output => NodeType::Output,
        }
    }
}

/// One entry in the closed block-definition table.
#[derive(Debug, Clone, Copy)]
pub struct BlockDefinition {
    pub id: &'static str,
    pub handler: Handler,
    pub category: Category,
    pub requires_connector: bool,
    /// Credit cost charged by the planner (§4.5); `None` means free.
    pub cost: Option<i64>,
    /// Config keys the schema validator requires to be present (and
    /// non-null) at materialization time.
    pub required_config_keys: &'static [&'static str],
}

impl BlockDefinition {
    pub fn validate_config(&self, config: &DataObject) -> WorkflowResult<()> {
        for key in self.required_config_keys {
            match config.get(*key) {
                Some(v) if !v.is_null() => {}
                _ => {
                    return Err(WorkflowError::InvalidBlockConfig {
                        block_id: self.id.to_string(),
                        message: format!("missing required config key `{key}`"),
                    })
                }
            }
        }
        Ok(())
    }
}

macro_rules! def {
    ($id:literal, $handler:ident, $category:ident, $requires_connector:literal, $cost:expr, [$($key:literal),*]) => {
        BlockDefinition {
            id: $id,
            handler: Handler::$handler,
            category: Category::$category,
            requires_connector: $requires_connector,
            cost: $cost,
            required_config_keys: &[$($key),*],
        }
    };
}

/// The closed set of core block ids (§4.7).
pub const BLOCK_DEFINITIONS: &[BlockDefinition] = &[
    def!("payload-input", Logic, Input, false, None, []),
    def!("json-extract", Logic, Transform, false, None, ["path"]),
    def!("memo-parser", Logic, Transform, false, None, []),
    def!("math-add", Nillion, Compute, false, Some(2), []),
    def!("math-subtract", Nillion, Compute, false, Some(2), []),
    def!("math-multiply", Nillion, Compute, false, Some(2), []),
    def!("math-divide", Nillion, Compute, false, Some(2), []),
    def!("math-greater-than", Nillion, Compute, false, Some(2), []),
    def!("logic-if-else", Nillion, Compute, false, Some(2), []),
    def!("nillion-compute", Nillion, Compute, false, Some(15), ["workloadId"]),
    def!("nillion-block-graph", Nillion, Compute, false, Some(15), ["nillionGraph"]),
    def!("nilai-llm", Nilai, Compute, false, Some(25), ["promptTemplate"]),
    def!("zcash-send", Zcash, Action, false, Some(10), []),
    def!("connector-request", Connector, Action, true, Some(1), []),
    def!("custom-http-action", Connector, Action, false, Some(1), ["url"]),
    def!("state-store", Nillion, Storage, false, Some(3), []),
    def!("state-read", Nillion, Storage, false, Some(1), []),
    def!("workflow-output", Logic, Output, false, None, []),
];

// `logic-if-else` is a condition in the UI sense but materializes into the
// same `compute` category as the other MPC-eligible blocks — §4.3 step 3
// only distinguishes input/compute/action/transform; condition nodes slot
// into compute.

pub fn lookup(block_id: &str) -> WorkflowResult<&'static BlockDefinition> {
    BLOCK_DEFINITIONS
        .iter()
        .find(|d| d.id == block_id)
        .ok_or_else(|| WorkflowError::UnknownBlockType(block_id.to_string()))
}

/// The blockIds eligible for batching into a single MPC-graph submission (§4.9).
pub fn is_mpc_eligible(block_id: &str) -> bool {
    matches!(
        block_id,
        "math-add" | "math-subtract" | "math-multiply" | "math-divide" | "math-greater-than" | "logic-if-else"
    )
}

/// Translates an internal MPC-eligible block id to its sub-graph node kind
/// (§4.9: `math-add → nillion-add`, etc; §9 design note on extensibility).
pub fn mpc_sub_graph_kind(block_id: &str) -> Option<&'static str> {
    match block_id {
        "math-add" => Some("nillion-add"),
        "math-subtract" => Some("nillion-subtract"),
        "math-multiply" => Some("nillion-multiply"),
        "math-divide" => Some("nillion-divide"),
        "math-greater-than" => Some("nillion-greater-than"),
        "logic-if-else" => Some("nillion-if-else"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_core_block_id_is_registered() {
        let expected = [
            "payload-input", "json-extract", "memo-parser", "math-add", "math-subtract",
            "math-multiply", "math-divide", "math-greater-than", "logic-if-else",
            "nillion-compute", "nillion-block-graph", "nilai-llm", "zcash-send",
            "connector-request", "custom-http-action", "state-store", "state-read",
        ];
        for id in expected {
            assert!(lookup(id).is_ok(), "missing block definition for {id}");
        }
    }

    #[test]
    fn unknown_block_type_is_rejected() {
        assert!(matches!(lookup("does-not-exist"), Err(WorkflowError::UnknownBlockType(_))));
    }

    #[test]
    fn mpc_eligible_set_matches_spec() {
        assert!(is_mpc_eligible("math-add"));
        assert!(is_mpc_eligible("logic-if-else"));
        assert!(!is_mpc_eligible("nillion-compute"));
        assert!(!is_mpc_eligible("payload-input"));
    }
}
