//! Repository implementations: one struct per persisted entity, async CRUD
//! over a shared `PgPool`.

pub mod block;
pub mod credit;
pub mod run;
pub mod workflow;

pub use block::*;
pub use credit::*;
pub use run::*;
pub use workflow::*;

use sqlx::PgPool;

/// Bundles every repository over one connection pool.
#[derive(Clone)]
pub struct DbContext {
    pub pool: PgPool,
    pub workflows: WorkflowRepository,
    pub blocks: BlockRepository,
    pub runs: RunRepository,
    pub credits: CreditRepository,
}

impl DbContext {
    pub fn new(pool: PgPool) -> Self {
        Self {
            workflows: WorkflowRepository::new(pool.clone()),
            blocks: BlockRepository::new(pool.clone()),
            runs: RunRepository::new(pool.clone()),
            credits: CreditRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}
