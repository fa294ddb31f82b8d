//! Run repository.

use sqlx::PgPool;

use crate::entities::RunRow;
use crate::error::StoreError;

#[derive(Clone)]
pub struct RunRepository {
    pool: PgPool,
}

impl RunRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<RunRow>, StoreError> {
        let row = sqlx::query_as::<_, RunRow>(
            r#"
            SELECT id, workflow_id, payload, status, result, created_at
            FROM run
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn insert(&self, row: &RunRow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO run (id, workflow_id, payload, status, result, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&row.id)
        .bind(&row.workflow_id)
        .bind(&row.payload)
        .bind(&row.status)
        .bind(&row.result)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Single-statement status+result update, satisfying the "atomic for the
    /// single owning executor" requirement without a transaction.
    pub async fn update_status(
        &self,
        id: &str,
        status: &str,
        result: Option<&serde_json::Value>,
    ) -> Result<(), StoreError> {
        let affected = sqlx::query(
            r#"
            UPDATE run SET status = $2, result = COALESCE($3, result)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(result)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(StoreError::NotFound(format!("run {id}")));
        }
        Ok(())
    }
}
