//! Block repository.

use sqlx::PgPool;

use crate::entities::BlockRow;
use crate::error::StoreError;

#[derive(Clone)]
pub struct BlockRepository {
    pool: PgPool,
}

impl BlockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ordered by `(order_index, created_at)`, matching the executor's
    /// materialization order.
    pub async fn list_for_workflow(&self, workflow_id: &str) -> Result<Vec<BlockRow>, StoreError> {
        let rows = sqlx::query_as::<_, BlockRow>(
            r#"
            SELECT id, workflow_id, block_type, config, order_index, alias,
                   connector_id, dependencies, position_x, position_y, created_at
            FROM block
            WHERE workflow_id = $1
            ORDER BY order_index ASC, created_at ASC
            "#,
        )
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn replace_all(&self, workflow_id: &str, rows: &[BlockRow]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM block WHERE workflow_id = $1")
            .bind(workflow_id)
            .execute(&mut *tx)
            .await?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO block (
                    id, workflow_id, block_type, config, order_index, alias,
                    connector_id, dependencies, position_x, position_y, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(&row.id)
            .bind(&row.workflow_id)
            .bind(&row.block_type)
            .bind(&row.config)
            .bind(row.order_index)
            .bind(&row.alias)
            .bind(&row.connector_id)
            .bind(&row.dependencies)
            .bind(row.position_x)
            .bind(row.position_y)
            .bind(row.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
