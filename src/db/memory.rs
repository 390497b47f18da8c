// In-memory store backends for unit tests

use crate::db::agents::AgentStore;
use crate::db::invitations::{InvitationStore, NewInvitation};
use crate::db::production::ProductionStore;
use crate::db::schema::{
    AgentProfile, DateRange, HierarchyFields, Invitation, InvitationStatus, PolicyStatus,
    ProductionRow,
};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Shared in-memory backend implementing all three store traits.
#[derive(Clone, Default)]
pub struct MemoryStore {
    agents: Arc<Mutex<HashMap<Uuid, AgentProfile>>>,
    invitations: Arc<Mutex<HashMap<Uuid, Invitation>>>,
    production: Arc<Mutex<Vec<ProductionRow>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_agent(&self, agent: AgentProfile) {
        self.agents.lock().await.insert(agent.id, agent);
    }

    pub async fn agent(&self, id: Uuid) -> Option<AgentProfile> {
        self.agents.lock().await.get(&id).cloned()
    }

    pub async fn add_production(&self, row: ProductionRow) {
        self.production.lock().await.push(row);
    }

    pub async fn invitation(&self, id: Uuid) -> Option<Invitation> {
        self.invitations.lock().await.get(&id).cloned()
    }
}

/// Build a root agent profile for tests.
pub fn test_agent(email: &str) -> AgentProfile {
    let id = Uuid::new_v4();
    AgentProfile {
        id,
        email: email.to_string(),
        first_name: None,
        last_name: None,
        roles: vec![],
        contract_level: None,
        upline_id: None,
        hierarchy_path: id.to_string(),
        hierarchy_depth: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[async_trait]
impl AgentStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<AgentProfile>> {
        Ok(self.agents.lock().await.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<AgentProfile>> {
        let email = email.to_lowercase();
        Ok(self
            .agents
            .lock()
            .await
            .values()
            .find(|a| a.email.to_lowercase() == email)
            .cloned())
    }

    async fn children_of(&self, id: Uuid) -> Result<Vec<AgentProfile>> {
        Ok(self
            .agents
            .lock()
            .await
            .values()
            .filter(|a| a.upline_id == Some(id))
            .cloned()
            .collect())
    }

    async fn subtree(&self, root: Uuid) -> Result<Vec<AgentProfile>> {
        let agents = self.agents.lock().await;
        let mut result = Vec::new();
        let mut frontier = vec![root];
        while let Some(current) = frontier.pop() {
            for agent in agents.values().filter(|a| a.upline_id == Some(current)) {
                frontier.push(agent.id);
                result.push(agent.clone());
            }
        }
        result.sort_by_key(|a| a.hierarchy_depth);
        Ok(result)
    }

    async fn update_hierarchy_fields(
        &self,
        id: Uuid,
        fields: &HierarchyFields,
    ) -> Result<AgentProfile> {
        let mut agents = self.agents.lock().await;
        let agent = agents
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Agent".to_string()))?;
        agent.upline_id = fields.upline_id;
        agent.hierarchy_path = fields.hierarchy_path.clone();
        agent.hierarchy_depth = fields.hierarchy_depth;
        agent.updated_at = Utc::now();
        Ok(agent.clone())
    }

    async fn update_contract_level(
        &self,
        id: Uuid,
        level: Option<i32>,
    ) -> Result<AgentProfile> {
        let mut agents = self.agents.lock().await;
        let agent = agents
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Agent".to_string()))?;
        agent.contract_level = level;
        agent.updated_at = Utc::now();
        Ok(agent.clone())
    }
}

#[async_trait]
impl InvitationStore for MemoryStore {
    async fn create(&self, new: NewInvitation) -> Result<Invitation> {
        let invitation = Invitation {
            id: Uuid::new_v4(),
            inviter_id: new.inviter_id,
            invitee_email: new.invitee_email,
            invitee_id: new.invitee_id,
            status: InvitationStatus::Pending.as_str().to_string(),
            message: new.message,
            created_at: Utc::now(),
            expires_at: new.expires_at,
            responded_at: None,
        };
        self.invitations
            .lock()
            .await
            .insert(invitation.id, invitation.clone());
        Ok(invitation)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Invitation>> {
        Ok(self.invitations.lock().await.get(&id).cloned())
    }

    async fn list_sent(
        &self,
        inviter_id: Uuid,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<Invitation>> {
        let mut result: Vec<Invitation> = self
            .invitations
            .lock()
            .await
            .values()
            .filter(|i| i.inviter_id == inviter_id)
            .filter(|i| status.map_or(true, |s| i.status == s.as_str()))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn list_received(&self, invitee_id: Uuid, email: &str) -> Result<Vec<Invitation>> {
        let email = email.to_lowercase();
        let mut result: Vec<Invitation> = self
            .invitations
            .lock()
            .await
            .values()
            .filter(|i| {
                i.invitee_id == Some(invitee_id)
                    || (i.invitee_id.is_none() && i.invitee_email == email)
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn pending_for(
        &self,
        inviter_id: Uuid,
        invitee_email: &str,
    ) -> Result<Vec<Invitation>> {
        let email = invitee_email.to_lowercase();
        let mut result: Vec<Invitation> = self
            .invitations
            .lock()
            .await
            .values()
            .filter(|i| {
                i.inviter_id == inviter_id
                    && i.invitee_email == email
                    && i.status == InvitationStatus::Pending.as_str()
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn transition(
        &self,
        id: Uuid,
        from: InvitationStatus,
        to: InvitationStatus,
    ) -> Result<Invitation> {
        let mut invitations = self.invitations.lock().await;
        let invitation = invitations
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Invitation".to_string()))?;
        if invitation.status != from.as_str() {
            return Err(AppError::ConcurrencyConflict);
        }
        invitation.status = to.as_str().to_string();
        invitation.responded_at = Some(Utc::now());
        Ok(invitation.clone())
    }

    async fn accept_pending(
        &self,
        id: Uuid,
        invitee_id: Uuid,
        fields: &HierarchyFields,
    ) -> Result<Invitation> {
        // Both maps locked for the duration; the two writes are atomic.
        let mut invitations = self.invitations.lock().await;
        let mut agents = self.agents.lock().await;

        let invitation = invitations
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Invitation".to_string()))?;
        if invitation.status != InvitationStatus::Pending.as_str() {
            return Err(AppError::ConcurrencyConflict);
        }
        let agent = agents
            .get_mut(&invitee_id)
            .ok_or_else(|| AppError::NotFound("Agent".to_string()))?;

        invitation.status = InvitationStatus::Accepted.as_str().to_string();
        invitation.invitee_id = Some(invitee_id);
        invitation.responded_at = Some(Utc::now());

        agent.upline_id = fields.upline_id;
        agent.hierarchy_path = fields.hierarchy_path.clone();
        agent.hierarchy_depth = fields.hierarchy_depth;
        agent.updated_at = Utc::now();

        Ok(invitation.clone())
    }

    async fn extend_expiry(&self, id: Uuid, expires_at: DateTime<Utc>) -> Result<()> {
        let mut invitations = self.invitations.lock().await;
        if let Some(invitation) = invitations.get_mut(&id) {
            if invitation.status == InvitationStatus::Pending.as_str() {
                invitation.expires_at = expires_at;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProductionStore for MemoryStore {
    async fn commissionable_production(
        &self,
        agent_ids: &[Uuid],
        range: DateRange,
        _status: PolicyStatus,
    ) -> Result<Vec<ProductionRow>> {
        Ok(self
            .production
            .lock()
            .await
            .iter()
            .filter(|r| agent_ids.contains(&r.agent_id) && range.contains(r.effective_date))
            .cloned()
            .collect())
    }
}
