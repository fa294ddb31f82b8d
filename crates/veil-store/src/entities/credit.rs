//! `credit_balance` table row — one organization's available credit balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditBalanceRow {
    pub org_id: String,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}
