// Team production rollups and pace reporting over an agent's downline

use crate::commissions::pace::{
    aggregate_production, compute_pace, month_elapsed_fraction, team_monthly_target,
    team_yearly_target, year_elapsed_fraction, AgentTarget, PaceProjection, ProductionSummary,
};
use crate::config::PaceConfig;
use crate::db::agents::AgentStore;
use crate::db::production::ProductionStore;
use crate::db::schema::{DateRange, PolicyStatus};
use crate::errors::{AppError, Result};
use crate::hierarchy::service::{month_to_date, year_to_date};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Production rollup for one member of the team.
#[derive(Debug, Clone, Serialize)]
pub struct MemberProduction {
    pub agent_id: Uuid,
    pub email: String,
    pub summary: ProductionSummary,
}

/// Team-wide production for a window, including the leader's own numbers.
#[derive(Debug, Clone, Serialize)]
pub struct TeamProduction {
    pub team_size: usize,
    pub total: ProductionSummary,
    pub members: Vec<MemberProduction>,
}

/// Monthly and yearly pace for the team against supplied targets.
#[derive(Debug, Clone, Serialize)]
pub struct TeamPaceReport {
    pub monthly_target: f64,
    pub yearly_target: f64,
    pub month: PaceProjection,
    pub year: PaceProjection,
}

/// Rolls downline production up to team level. The team is the leader plus
/// every downline, direct and indirect, resolved through `upline_id`.
pub struct TeamMetricsService {
    agents: Arc<dyn AgentStore>,
    production: Arc<dyn ProductionStore>,
    pace: PaceConfig,
}

impl TeamMetricsService {
    pub fn new(
        agents: Arc<dyn AgentStore>,
        production: Arc<dyn ProductionStore>,
        pace: PaceConfig,
    ) -> Self {
        Self {
            agents,
            production,
            pace,
        }
    }

    /// Issued production across the leader's team for the window, broken out
    /// per member. Members without production still appear with zeros.
    pub async fn team_production(&self, leader_id: Uuid, range: DateRange) -> Result<TeamProduction> {
        let leader = self
            .agents
            .get(leader_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Agent".to_string()))?;
        let mut team = self.agents.subtree(leader_id).await?;
        team.insert(0, leader);

        let ids: Vec<Uuid> = team.iter().map(|a| a.id).collect();
        let rows = self
            .production
            .commissionable_production(&ids, range, PolicyStatus::Active)
            .await?;

        let mut per_agent: HashMap<Uuid, Vec<_>> = HashMap::new();
        for row in &rows {
            per_agent.entry(row.agent_id).or_default().push(row.clone());
        }

        let members: Vec<MemberProduction> = team
            .iter()
            .map(|agent| MemberProduction {
                agent_id: agent.id,
                email: agent.email.clone(),
                summary: aggregate_production(
                    per_agent.get(&agent.id).map(Vec::as_slice).unwrap_or(&[]),
                ),
            })
            .collect();

        Ok(TeamProduction {
            team_size: team.len(),
            total: aggregate_production(&rows),
            members,
        })
    }

    /// Monthly and yearly pace for the team. `targets` carries one entry per
    /// member with goals on file; members without goals contribute production
    /// but no target.
    pub async fn team_pace(
        &self,
        leader_id: Uuid,
        targets: &HashMap<Uuid, AgentTarget>,
        pending_premium: f64,
        today: NaiveDate,
    ) -> Result<TeamPaceReport> {
        let mut team = self.agents.subtree(leader_id).await?;
        let leader = self
            .agents
            .get(leader_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Agent".to_string()))?;
        team.insert(0, leader);

        let member_targets: Vec<AgentTarget> = team
            .iter()
            .filter_map(|a| targets.get(&a.id).copied())
            .collect();
        let monthly_target = team_monthly_target(&member_targets);
        let yearly_target = team_yearly_target(&member_targets);

        let ids: Vec<Uuid> = team.iter().map(|a| a.id).collect();
        let mtd_rows = self
            .production
            .commissionable_production(&ids, month_to_date(today), PolicyStatus::Active)
            .await?;
        let ytd_rows = self
            .production
            .commissionable_production(&ids, year_to_date(today), PolicyStatus::Active)
            .await?;

        let month = compute_pace(
            monthly_target,
            month_elapsed_fraction(today),
            aggregate_production(&mtd_rows).ap_total,
            pending_premium,
            &self.pace,
        );
        let year = compute_pace(
            yearly_target,
            year_elapsed_fraction(today),
            aggregate_production(&ytd_rows).ap_total,
            pending_premium,
            &self.pace,
        );

        Ok(TeamPaceReport {
            monthly_target,
            yearly_target,
            month,
            year,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{test_agent, MemoryStore};
    use crate::db::schema::{AgentProfile, ProductionRow};
    use crate::commissions::pace::PaceStatus;

    fn service(store: &MemoryStore) -> TeamMetricsService {
        TeamMetricsService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            PaceConfig {
                ahead_threshold_pct: 105.0,
                behind_threshold_pct: 95.0,
            },
        )
    }

    async fn seed_child(store: &MemoryStore, email: &str, upline: &AgentProfile) -> AgentProfile {
        let mut agent = test_agent(email);
        agent.upline_id = Some(upline.id);
        agent.hierarchy_path = format!("{}.{}", upline.hierarchy_path, agent.id);
        agent.hierarchy_depth = upline.hierarchy_depth + 1;
        store.insert_agent(agent.clone()).await;
        agent
    }

    fn today() -> NaiveDate {
        // July 2nd: exactly half of a 365-day year elapsed (182.5 rounds here)
        NaiveDate::from_ymd_opt(2025, 7, 2).unwrap()
    }

    #[tokio::test]
    async fn test_team_production_includes_leader_and_indirects() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let leader = test_agent("lead@example.com");
        store.insert_agent(leader.clone()).await;
        let direct = seed_child(&store, "direct@example.com", &leader).await;
        let indirect = seed_child(&store, "indirect@example.com", &direct).await;

        for (agent, premium) in [(&leader, 1_000.0), (&direct, 2_000.0), (&indirect, 3_000.0)] {
            store
                .add_production(ProductionRow {
                    agent_id: agent.id,
                    effective_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                    premium,
                })
                .await;
        }

        let range = DateRange {
            start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
        };
        let report = svc.team_production(leader.id, range).await.unwrap();
        assert_eq!(report.team_size, 3);
        assert_eq!(report.total.ap_total, 6_000.0);
        assert_eq!(report.total.policy_count, 3);

        let leader_row = report
            .members
            .iter()
            .find(|m| m.agent_id == leader.id)
            .unwrap();
        assert_eq!(leader_row.summary.ap_total, 1_000.0);
    }

    #[tokio::test]
    async fn test_team_pace_against_targets() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let leader = test_agent("lead@example.com");
        store.insert_agent(leader.clone()).await;
        let direct = seed_child(&store, "direct@example.com", &leader).await;

        // Yearly team target: 60k + 60k
        let mut targets = HashMap::new();
        for id in [leader.id, direct.id] {
            targets.insert(
                id,
                AgentTarget {
                    expected_policies_per_year: 30.0,
                    average_premium: 2_000.0,
                },
            );
        }

        // 90k issued in the first half of the year
        store
            .add_production(ProductionRow {
                agent_id: direct.id,
                effective_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                premium: 90_000.0,
            })
            .await;

        let report = svc.team_pace(leader.id, &targets, 0.0, today()).await.unwrap();
        assert_eq!(report.yearly_target, 120_000.0);
        assert_eq!(report.monthly_target, 10_000.0);
        // Projecting ~180k against 120k is well ahead
        assert_eq!(report.year.status, PaceStatus::Ahead);
        assert!(report.year.percentage > 105.0);
    }

    #[tokio::test]
    async fn test_members_without_targets_still_count_production() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let leader = test_agent("lead@example.com");
        store.insert_agent(leader.clone()).await;
        let direct = seed_child(&store, "direct@example.com", &leader).await;

        let mut targets = HashMap::new();
        targets.insert(
            leader.id,
            AgentTarget {
                expected_policies_per_year: 10.0,
                average_premium: 1_000.0,
            },
        );

        store
            .add_production(ProductionRow {
                agent_id: direct.id,
                effective_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
                premium: 5_000.0,
            })
            .await;

        let report = svc.team_pace(leader.id, &targets, 0.0, today()).await.unwrap();
        assert_eq!(report.yearly_target, 10_000.0);
        assert_eq!(report.year.status, PaceStatus::Ahead);
    }
}
