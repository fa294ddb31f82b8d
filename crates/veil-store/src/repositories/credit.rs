//! Credit ledger repository.

use sqlx::PgPool;

use crate::entities::CreditBalanceRow;
use crate::error::StoreError;

#[derive(Clone)]
pub struct CreditRepository {
    pool: PgPool,
}

impl CreditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_balance(&self, org_id: &str) -> Result<i64, StoreError> {
        let row = sqlx::query_as::<_, CreditBalanceRow>(
            "SELECT org_id, balance, updated_at FROM credit_balance WHERE org_id = $1",
        )
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.balance).unwrap_or(0))
    }

    /// Atomic debit guarded by a row-level check: only decrements if the
    /// balance still covers `amount`, returning whether it applied.
    pub async fn try_debit(&self, org_id: &str, amount: i64) -> Result<bool, StoreError> {
        let affected = sqlx::query(
            r#"
            UPDATE credit_balance
            SET balance = balance - $2, updated_at = now()
            WHERE org_id = $1 AND balance >= $2
            "#,
        )
        .bind(org_id)
        .bind(amount)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    pub async fn grant(&self, org_id: &str, amount: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO credit_balance (org_id, balance, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (org_id) DO UPDATE SET
                balance = credit_balance.balance + EXCLUDED.balance,
                updated_at = now()
            "#,
        )
        .bind(org_id)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
