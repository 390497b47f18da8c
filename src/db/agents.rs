// Agent profile store: trait seam plus the PostgreSQL backend

use crate::db::schema::{AgentProfile, HierarchyFields};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

const AGENT_COLUMNS: &str = "id, email, first_name, last_name, roles, contract_level, \
     upline_id, hierarchy_path, hierarchy_depth, created_at, updated_at";

/// Narrow read/write interface over agent hierarchy fields.
///
/// Only the invitation flow and explicit administrative actions may call
/// `update_hierarchy_fields`; nothing else mutates upline/path/depth.
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<AgentProfile>>;

    /// Lookup by normalized (lowercase) email.
    async fn get_by_email(&self, email: &str) -> Result<Option<AgentProfile>>;

    /// Direct downlines only.
    async fn children_of(&self, id: Uuid) -> Result<Vec<AgentProfile>>;

    /// All descendants of the given agent, excluding the agent itself.
    /// Derived from upline adjacency, not from stored paths.
    async fn subtree(&self, root: Uuid) -> Result<Vec<AgentProfile>>;

    async fn update_hierarchy_fields(
        &self,
        id: Uuid,
        fields: &HierarchyFields,
    ) -> Result<AgentProfile>;

    async fn update_contract_level(&self, id: Uuid, level: Option<i32>)
        -> Result<AgentProfile>;
}

/// PostgreSQL-backed agent store
pub struct PostgresAgentStore {
    pool: PgPool,
}

impl PostgresAgentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentStore for PostgresAgentStore {
    async fn get(&self, id: Uuid) -> Result<Option<AgentProfile>> {
        let agent = sqlx::query_as::<_, AgentProfile>(&format!(
            "SELECT {} FROM agents WHERE id = $1",
            AGENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(agent)
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<AgentProfile>> {
        let agent = sqlx::query_as::<_, AgentProfile>(&format!(
            "SELECT {} FROM agents WHERE lower(email) = lower($1)",
            AGENT_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(agent)
    }

    async fn children_of(&self, id: Uuid) -> Result<Vec<AgentProfile>> {
        let children = sqlx::query_as::<_, AgentProfile>(&format!(
            "SELECT {} FROM agents WHERE upline_id = $1",
            AGENT_COLUMNS
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(children)
    }

    async fn subtree(&self, root: Uuid) -> Result<Vec<AgentProfile>> {
        // Walk the upline pointers with a recursive CTE; stored paths are
        // treated as a cache and never trusted for structure.
        let sql = format!(
            r#"
            WITH RECURSIVE team AS (
                SELECT {cols}
                FROM agents
                WHERE upline_id = $1

                UNION ALL

                SELECT {prefixed}
                FROM agents a
                INNER JOIN team t ON a.upline_id = t.id
            )
            SELECT {cols} FROM team
            ORDER BY hierarchy_depth ASC
            "#,
            cols = AGENT_COLUMNS,
            prefixed = AGENT_COLUMNS
                .split(", ")
                .map(|c| format!("a.{}", c))
                .collect::<Vec<_>>()
                .join(", "),
        );

        let agents = sqlx::query_as::<_, AgentProfile>(&sql)
            .bind(root)
            .fetch_all(&self.pool)
            .await?;

        Ok(agents)
    }

    async fn update_hierarchy_fields(
        &self,
        id: Uuid,
        fields: &HierarchyFields,
    ) -> Result<AgentProfile> {
        let agent = sqlx::query_as::<_, AgentProfile>(&format!(
            r#"
            UPDATE agents
            SET upline_id = $2, hierarchy_path = $3, hierarchy_depth = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            AGENT_COLUMNS
        ))
        .bind(id)
        .bind(fields.upline_id)
        .bind(&fields.hierarchy_path)
        .bind(fields.hierarchy_depth)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Agent".to_string()))?;

        tracing::info!(
            "Updated hierarchy fields for agent {} (upline: {:?}, depth: {})",
            id,
            fields.upline_id,
            fields.hierarchy_depth
        );

        Ok(agent)
    }

    async fn update_contract_level(
        &self,
        id: Uuid,
        level: Option<i32>,
    ) -> Result<AgentProfile> {
        let agent = sqlx::query_as::<_, AgentProfile>(&format!(
            r#"
            UPDATE agents
            SET contract_level = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            AGENT_COLUMNS
        ))
        .bind(id)
        .bind(level)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Agent".to_string()))?;

        tracing::info!("Updated contract level for agent {} to {:?}", id, level);

        Ok(agent)
    }
}
