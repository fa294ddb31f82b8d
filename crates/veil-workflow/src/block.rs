//! Persisted block records — the unmaterialized form stored per-workflow.

use serde::{Deserialize, Serialize};

use crate::value::DataObject;

/// One persisted dependency on another block. Accepts either the bare
/// string form (normalized to `{source}`) or the full object form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockDependency {
    Bare(String),
    Full {
        source: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        target_handle: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        source_handle: Option<String>,
    },
}

impl BlockDependency {
    pub fn source(&self) -> &str {
        match self {
            BlockDependency::Bare(s) => s,
            BlockDependency::Full { source, .. } => source,
        }
    }

    pub fn target_handle(&self) -> Option<&str> {
        match self {
            BlockDependency::Bare(_) => None,
            BlockDependency::Full { target_handle, .. } => target_handle.as_deref(),
        }
    }

    pub fn source_handle(&self) -> Option<&str> {
        match self {
            BlockDependency::Bare(_) => None,
            BlockDependency::Full { source_handle, .. } => source_handle.as_deref(),
        }
    }
}

/// A persisted block: one row in the workflow's block list, prior to
/// materialization into a graph [`crate::graph::Node`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    pub workflow_id: String,
    /// Type tag drawn from the closed registry (§4.7).
    pub block_type: String,
    #[serde(default)]
    pub config: DataObject,
    pub order: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<BlockDependency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_y: Option<f64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
