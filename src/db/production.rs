// Read-only feed of commissionable premium from the policy store

use crate::db::schema::{DateRange, PolicyStatus, ProductionRow};
use crate::errors::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Read-only production feed. The core does not own the policy schema; it
/// only consumes premium rows already scoped to agents, dates, and a
/// lifecycle status.
#[async_trait]
pub trait ProductionStore: Send + Sync {
    async fn commissionable_production(
        &self,
        agent_ids: &[Uuid],
        range: DateRange,
        status: PolicyStatus,
    ) -> Result<Vec<ProductionRow>>;
}

/// PostgreSQL-backed production feed
pub struct PostgresProductionStore {
    pool: PgPool,
}

impl PostgresProductionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductionStore for PostgresProductionStore {
    async fn commissionable_production(
        &self,
        agent_ids: &[Uuid],
        range: DateRange,
        status: PolicyStatus,
    ) -> Result<Vec<ProductionRow>> {
        if agent_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ProductionRow>(
            r#"
            SELECT agent_id, effective_date, annual_premium AS premium
            FROM policies
            WHERE agent_id = ANY($1)
              AND status = $2
              AND effective_date BETWEEN $3 AND $4
            "#,
        )
        .bind(agent_ids.to_vec())
        .bind(status.as_str())
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
