//! `block` table row — one persisted node definition belonging to a workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BlockRow {
    pub id: String,
    pub workflow_id: String,
    pub block_type: String,
    pub config: serde_json::Value,
    pub order_index: i64,
    #[sqlx(default)]
    pub alias: Option<String>,
    #[sqlx(default)]
    pub connector_id: Option<String>,
    pub dependencies: serde_json::Value,
    #[sqlx(default)]
    pub position_x: Option<f64>,
    #[sqlx(default)]
    pub position_y: Option<f64>,
    pub created_at: DateTime<Utc>,
}
