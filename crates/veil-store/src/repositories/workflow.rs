//! Workflow repository.

use sqlx::PgPool;

use crate::entities::WorkflowRow;
use crate::error::StoreError;

#[derive(Clone)]
pub struct WorkflowRepository {
    pool: PgPool,
}

impl WorkflowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<WorkflowRow>, StoreError> {
        let row = sqlx::query_as::<_, WorkflowRow>(
            r#"
            SELECT id, name, status, dataset_ref, trigger_ref, graph, created_at, updated_at
            FROM workflow
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn upsert(&self, row: &WorkflowRow) -> Result<WorkflowRow, StoreError> {
        let saved = sqlx::query_as::<_, WorkflowRow>(
            r#"
            INSERT INTO workflow (id, name, status, dataset_ref, trigger_ref, graph, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                status = EXCLUDED.status,
                dataset_ref = EXCLUDED.dataset_ref,
                trigger_ref = EXCLUDED.trigger_ref,
                graph = EXCLUDED.graph,
                updated_at = EXCLUDED.updated_at
            RETURNING id, name, status, dataset_ref, trigger_ref, graph, created_at, updated_at
            "#,
        )
        .bind(&row.id)
        .bind(&row.name)
        .bind(&row.status)
        .bind(&row.dataset_ref)
        .bind(&row.trigger_ref)
        .bind(&row.graph)
        .bind(row.created_at)
        .bind(row.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(saved)
    }
}
