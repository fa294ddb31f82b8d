//! Error types shared by the graph model and materializer.

use thiserror::Error;

/// Errors raised while assembling or validating a [`crate::graph::WorkflowGraph`].
///
/// These are the "validation" kind from the error taxonomy: a graph that
/// fails any of these checks never reaches node dispatch, so none of them
/// carry a node id — they abort the run before the first step.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("workflow has no blocks yet")]
    EmptyWorkflow,

    #[error("unknown block type: {0}")]
    UnknownBlockType(String),

    #[error("edge references unknown node: {0}")]
    DanglingEdge(String),

    #[error("Workflow graph contains cycles")]
    CycleDetected,

    #[error("duplicate edge for target handle: {node}.{handle}")]
    DuplicateTargetHandle { node: String, handle: String },

    #[error("schema-invalid config for block {block_id}: {message}")]
    InvalidBlockConfig { block_id: String, message: String },
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
