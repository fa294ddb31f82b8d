//! `run` table row — one execution of a workflow, plus its terminal result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RunRow {
    pub id: String,
    pub workflow_id: String,
    pub payload: serde_json::Value,
    pub status: String,
    #[sqlx(default)]
    pub result: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}
