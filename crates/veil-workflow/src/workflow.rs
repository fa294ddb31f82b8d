//! The workflow record: identity, lifecycle status, and the graph embedded
//! at publish time.

use serde::{Deserialize, Serialize};

use crate::graph::WorkflowGraph;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Published,
    Paused,
}

/// A workflow definition. The embedded `graph` is the materialized DAG as of
/// the last publish; subsequent block edits do not affect it until
/// re-publish (§3 Lifecycle).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<WorkflowGraph>,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: WorkflowStatus::Draft,
            dataset_ref: None,
            trigger_ref: None,
            graph: None,
        }
    }

    /// Publish embeds the given materialized graph and commits the workflow
    /// to `published` status — the commit point described in §3 Lifecycle.
    pub fn publish(&mut self, graph: WorkflowGraph) {
        self.graph = Some(graph);
        self.status = WorkflowStatus::Published;
    }
}
