//! Engine-level errors: everything [`veil_workflow::WorkflowError`] doesn't
//! cover — dispatch, adapters, credits, and storage (§7's taxonomy).

use thiserror::Error;
use veil_workflow::WorkflowError;

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Validation-kind errors from the model crate (cycles, dangling edges,
    /// empty graphs, unknown block types, schema-invalid config).
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// Insufficient credits to reserve the run's planned cost.
    #[error("insufficient credits: Required: {required}, Available: {available}")]
    InsufficientCredits { required: i64, available: i64 },

    /// Input-resolution failure for a single node (missing operand, bad
    /// type, missing connector, etc.) — a step-level failure, not a
    /// run-level one.
    #[error("{0}")]
    InputResolution(String),

    /// An adapter (MPC, LLM, transfer, KV, HTTP) returned an error; the
    /// message is preserved verbatim in the resulting step.
    #[error("{0}")]
    Adapter(String),

    /// The run was cancelled by an external status change.
    #[error("cancelled")]
    Cancelled,

    /// Persistence-layer failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Committing credits after a successful run failed; side effects have
    /// already occurred (§4.10, §9 "Post-success commit failures").
    #[error("billing commit failed: {0}")]
    CommitFailed(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
