//! Run records and the append-only execution trace (§3, §4.10).

use serde::{Deserialize, Serialize};

use crate::value::{DataObject, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
}

/// One append-only record in a run's trace, capturing a single node's
/// dispatch (§3 ExecutionStep, §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub node_id: String,
    pub block_id: String,
    pub inputs: DataObject,
    pub outputs: Value,
    pub duration_ms: i64,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The terminal result of a run: either `{outputs, steps, creditsUsed?}` on
/// success or `{error}` (with whatever steps had already been recorded) on
/// failure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    #[serde(default)]
    pub steps: Vec<ExecutionStep>,
    #[serde(default)]
    pub outputs: DataObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_used: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A run: one execution of a workflow against a trigger payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: String,
    pub workflow_id: String,
    pub payload: DataObject,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RunResult>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Run {
    pub fn new(id: impl Into<String>, workflow_id: impl Into<String>, payload: DataObject) -> Self {
        Self {
            id: id.into(),
            workflow_id: workflow_id.into(),
            payload,
            status: RunStatus::Pending,
            result: None,
            created_at: chrono::Utc::now(),
        }
    }
}
