//! `workflow` table row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row in `workflow`. `graph` holds the materialized `WorkflowGraph` as
/// JSON once published; draft workflows carry it `NULL` and are
/// materialized on read from their block list.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
    pub id: String,
    pub name: String,
    pub status: String,
    #[sqlx(default)]
    pub dataset_ref: Option<String>,
    #[sqlx(default)]
    pub trigger_ref: Option<String>,
    #[sqlx(default)]
    pub graph: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
