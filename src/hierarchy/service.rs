// Hierarchy read models and admin graph mutations

use crate::commissions::overrides::{direct_pair_override, ContractLevel};
use crate::config::HierarchyConfig;
use crate::db::agents::AgentStore;
use crate::db::production::ProductionStore;
use crate::db::schema::{AgentProfile, DateRange, PolicyStatus};
use crate::errors::{AppError, Result};
use crate::hierarchy::graph::HierarchyGraph;
use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// One agent rendered into a downline tree, children nested.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub contract_level: i32,
    pub depth: i32,
    pub direct_downlines: usize,
    pub children: Vec<TreeNode>,
}

/// Aggregate numbers for an agent's subtree.
#[derive(Debug, Clone, Serialize)]
pub struct HierarchyStats {
    pub total_downlines: usize,
    pub direct_downlines: usize,
    pub max_depth_below: i32,
    /// Override income from direct downlines, month to date.
    pub override_income_mtd: f64,
    /// Override income from direct downlines, year to date.
    pub override_income_ytd: f64,
}

/// Per-downline production and override detail for an upline's dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DownlinePerformance {
    pub agent_id: Uuid,
    pub email: String,
    pub name: String,
    pub contract_level: i32,
    pub spread: i32,
    pub production_ytd: f64,
    pub policy_count_ytd: usize,
    pub override_income_ytd: f64,
}

pub struct HierarchyService {
    agents: Arc<dyn AgentStore>,
    production: Arc<dyn ProductionStore>,
    config: HierarchyConfig,
    /// Fallback for agents with no contract level set; validated at config
    /// load, so an out-of-ladder value never reaches here.
    default_level: ContractLevel,
}

impl HierarchyService {
    pub fn new(
        agents: Arc<dyn AgentStore>,
        production: Arc<dyn ProductionStore>,
        config: HierarchyConfig,
    ) -> Self {
        let default_level =
            ContractLevel::new(config.default_contract_level).unwrap_or_default();
        Self {
            agents,
            production,
            config,
            default_level,
        }
    }

    /// The agent's downline organization as a nested tree, the agent at the
    /// root. Structure comes from `upline_id` adjacency, so the tree is
    /// correct even when stored subtree paths are stale.
    pub async fn downline_tree(&self, agent_id: Uuid) -> Result<TreeNode> {
        let root = self.require_agent(agent_id).await?;
        let subtree = self.agents.subtree(agent_id).await?;

        let mut by_upline: HashMap<Uuid, Vec<&AgentProfile>> = HashMap::new();
        for agent in &subtree {
            if let Some(upline) = agent.upline_id {
                by_upline.entry(upline).or_default().push(agent);
            }
        }
        for children in by_upline.values_mut() {
            children.sort_by(|a, b| a.email.cmp(&b.email));
        }

        Ok(build_tree(&root, 0, &by_upline, self.default_level))
    }

    /// Ancestors of the agent, walked root-first via `upline_id`.
    pub async fn upline_chain(&self, agent_id: Uuid) -> Result<Vec<AgentProfile>> {
        let mut chain = Vec::new();
        let mut current = self.require_agent(agent_id).await?;

        while let Some(upline_id) = current.upline_id {
            let upline = self
                .agents
                .get(upline_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Upline agent".to_string()))?;
            // A cycle in stored data would loop forever; bail out instead
            if chain.iter().any(|a: &AgentProfile| a.id == upline_id) || upline_id == agent_id {
                return Err(AppError::Cycle(
                    "stored hierarchy contains a cycle".to_string(),
                ));
            }
            chain.push(upline.clone());
            current = upline;
        }

        chain.reverse();
        Ok(chain)
    }

    /// Direct downlines of the agent.
    pub async fn direct_downlines(&self, agent_id: Uuid) -> Result<Vec<AgentProfile>> {
        self.require_agent(agent_id).await?;
        let mut children = self.agents.children_of(agent_id).await?;
        children.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(children)
    }

    /// Subtree rollup plus direct-downline override income for the agent.
    pub async fn stats(&self, agent_id: Uuid, today: NaiveDate) -> Result<HierarchyStats> {
        let agent = self.require_agent(agent_id).await?;
        let subtree = self.agents.subtree(agent_id).await?;

        let graph = HierarchyGraph::from_profiles(subtree.iter().chain(std::iter::once(&agent)));
        let direct = graph.children(agent_id).len();
        // Walk the adjacency rather than trusting stored depths, which go
        // stale below a detached agent.
        let max_depth_below = graph.depth_below(agent_id);

        let directs = self.agents.children_of(agent_id).await?;
        let mtd = self
            .direct_override_total(&agent, &directs, month_to_date(today))
            .await?;
        let ytd = self
            .direct_override_total(&agent, &directs, year_to_date(today))
            .await?;

        Ok(HierarchyStats {
            total_downlines: subtree.len(),
            direct_downlines: direct,
            max_depth_below,
            override_income_mtd: mtd,
            override_income_ytd: ytd,
        })
    }

    /// Year-to-date production and override breakdown per direct downline.
    pub async fn downline_performance(
        &self,
        agent_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<DownlinePerformance>> {
        let upline = self.require_agent(agent_id).await?;
        let directs = self.agents.children_of(agent_id).await?;
        if directs.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = directs.iter().map(|a| a.id).collect();
        let rows = self
            .production
            .commissionable_production(&ids, year_to_date(today), PolicyStatus::Active)
            .await?;

        let mut totals: HashMap<Uuid, (f64, usize)> = HashMap::new();
        for row in &rows {
            let entry = totals.entry(row.agent_id).or_insert((0.0, 0));
            entry.0 += row.premium;
            entry.1 += 1;
        }

        let mut result = Vec::with_capacity(directs.len());
        for downline in directs {
            let (production, count) = totals.get(&downline.id).copied().unwrap_or((0.0, 0));
            let (spread, amount) = direct_pair_override(
                downline.contract_level,
                upline.contract_level,
                production,
                self.default_level,
            );
            result.push(DownlinePerformance {
                agent_id: downline.id,
                email: downline.email.clone(),
                name: downline.display_name(),
                contract_level: ContractLevel::resolve_with(
                    downline.contract_level,
                    self.default_level,
                )
                .value(),
                spread,
                production_ytd: production,
                policy_count_ytd: count,
                override_income_ytd: amount,
            });
        }
        result.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(result)
    }

    /// Admin move: re-parent an agent under a new upline. Cycle and existence
    /// checks run on a graph built over the affected agents; only the moved
    /// agent's path and depth are rewritten.
    pub async fn reparent(
        &self,
        admin: &AgentProfile,
        agent_id: Uuid,
        new_upline_id: Uuid,
    ) -> Result<AgentProfile> {
        require_admin(admin)?;

        let agent = self.require_agent(agent_id).await?;
        let new_upline = self
            .agents
            .get(new_upline_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Upline agent".to_string()))?;

        // The agent's subtree is enough to detect a cycle: the new upline is
        // illegal exactly when it sits below the agent.
        let subtree = self.agents.subtree(agent_id).await?;
        let mut graph =
            HierarchyGraph::from_profiles(subtree.iter().chain([&agent, &new_upline]));
        let fields = graph.attach_child(agent_id, new_upline_id)?;

        let updated = self.agents.update_hierarchy_fields(agent_id, &fields).await?;

        tracing::info!(
            admin_id = %admin.id,
            agent_id = %agent_id,
            new_upline_id = %new_upline_id,
            depth = fields.hierarchy_depth,
            "Agent re-parented"
        );

        Ok(updated)
    }

    /// Admin move: detach an agent from its upline, making it a root.
    /// Descendants keep their stored paths; structure stays correct through
    /// `upline_id`.
    pub async fn detach(&self, admin: &AgentProfile, agent_id: Uuid) -> Result<AgentProfile> {
        require_admin(admin)?;

        let agent = self.require_agent(agent_id).await?;
        if agent.upline_id.is_none() {
            return Err(AppError::Validation(
                "this agent has no upline to detach from".to_string(),
            ));
        }

        let mut graph = HierarchyGraph::from_profiles(std::iter::once(&agent));
        let fields = graph.detach_child(agent_id)?;
        let updated = self.agents.update_hierarchy_fields(agent_id, &fields).await?;

        tracing::info!(admin_id = %admin.id, agent_id = %agent_id, "Agent detached");

        Ok(updated)
    }

    /// Admin move: set or clear an agent's contract level. A set level must
    /// sit on the ladder.
    pub async fn set_contract_level(
        &self,
        admin: &AgentProfile,
        agent_id: Uuid,
        level: Option<i32>,
    ) -> Result<AgentProfile> {
        require_admin(admin)?;
        self.require_agent(agent_id).await?;

        if let Some(level) = level {
            ContractLevel::new(level)?;
        }
        let updated = self.agents.update_contract_level(agent_id, level).await?;

        tracing::info!(
            admin_id = %admin.id,
            agent_id = %agent_id,
            level = ?level,
            "Contract level updated"
        );

        Ok(updated)
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    async fn require_agent(&self, id: Uuid) -> Result<AgentProfile> {
        self.agents
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Agent".to_string()))
    }

    async fn direct_override_total(
        &self,
        upline: &AgentProfile,
        directs: &[AgentProfile],
        range: DateRange,
    ) -> Result<f64> {
        if directs.is_empty() {
            return Ok(0.0);
        }
        let ids: Vec<Uuid> = directs.iter().map(|a| a.id).collect();
        let rows = self
            .production
            .commissionable_production(&ids, range, PolicyStatus::Active)
            .await?;

        let mut per_agent: HashMap<Uuid, f64> = HashMap::new();
        for row in &rows {
            *per_agent.entry(row.agent_id).or_insert(0.0) += row.premium;
        }

        let mut total = 0.0;
        for downline in directs {
            let production = per_agent.get(&downline.id).copied().unwrap_or(0.0);
            let (_, amount) = direct_pair_override(
                downline.contract_level,
                upline.contract_level,
                production,
                self.default_level,
            );
            total += amount;
        }
        Ok(total)
    }
}

fn require_admin(agent: &AgentProfile) -> Result<()> {
    if agent.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

fn build_tree(
    agent: &AgentProfile,
    depth: i32,
    by_upline: &HashMap<Uuid, Vec<&AgentProfile>>,
    default_level: ContractLevel,
) -> TreeNode {
    let children: Vec<TreeNode> = by_upline
        .get(&agent.id)
        .map(|kids| {
            kids.iter()
                .map(|kid| build_tree(kid, depth + 1, by_upline, default_level))
                .collect()
        })
        .unwrap_or_default();

    TreeNode {
        id: agent.id,
        email: agent.email.clone(),
        name: agent.display_name(),
        contract_level: ContractLevel::resolve_with(agent.contract_level, default_level).value(),
        depth,
        direct_downlines: children.len(),
        children,
    }
}

/// First of the month through `today`, inclusive.
pub fn month_to_date(today: NaiveDate) -> DateRange {
    DateRange {
        start: today.with_day(1).unwrap_or(today),
        end: today,
    }
}

/// January 1st through `today`, inclusive.
pub fn year_to_date(today: NaiveDate) -> DateRange {
    DateRange {
        start: NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today),
        end: today,
    }
}
