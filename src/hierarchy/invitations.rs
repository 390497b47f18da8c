// Invitation lifecycle: eligibility checks, state transitions, derived views

use crate::config::HierarchyConfig;
use crate::db::agents::AgentStore;
use crate::db::invitations::{InvitationStore, NewInvitation};
use crate::db::schema::{HierarchyFields, Invitation, InvitationStatus};
use crate::errors::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct SendInvitationRequest {
    pub invitee_email: String,
    pub message: Option<String>,
}

/// A created invitation plus non-fatal advisory warnings.
#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub invitation: Invitation,
    pub warnings: Vec<String>,
}

/// Invitation enriched with the read-time derived fields the UI renders.
#[derive(Debug, Clone, Serialize)]
pub struct InvitationDetails {
    #[serde(flatten)]
    pub invitation: Invitation,
    pub inviter_email: Option<String>,
    pub inviter_hierarchy_depth: Option<i32>,
    pub invitee_has_upline: bool,
    pub invitee_has_downlines: bool,
    pub is_expired: bool,
    pub can_accept: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct InvitationStats {
    pub sent_pending: usize,
    pub sent_accepted: usize,
    pub sent_denied: usize,
    pub sent_cancelled: usize,
    pub received_pending: usize,
    pub received_expired: usize,
}

/// Governs how invitation records move between states and when the hierarchy
/// edge is created. All writes go through guarded store transitions, so a
/// validation failure never leaves a row partially mutated.
pub struct InvitationService {
    agents: Arc<dyn AgentStore>,
    invitations: Arc<dyn InvitationStore>,
    config: HierarchyConfig,
}

impl InvitationService {
    pub fn new(
        agents: Arc<dyn AgentStore>,
        invitations: Arc<dyn InvitationStore>,
        config: HierarchyConfig,
    ) -> Self {
        Self {
            agents,
            invitations,
            config,
        }
    }

    /// Send an invitation to join the inviter's downline.
    ///
    /// Hard rules fail the call; the "invitee still has downlines" rule is
    /// only advisory here and comes back as a warning (it becomes a hard
    /// blocker at accept time).
    pub async fn send_invitation(
        &self,
        inviter_id: Uuid,
        request: SendInvitationRequest,
    ) -> Result<SendOutcome> {
        let now = Utc::now();
        let email = request.invitee_email.trim().to_lowercase();
        validate_email(&email)?;

        let inviter = self
            .agents
            .get(inviter_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Agent".to_string()))?;

        if inviter.email.to_lowercase() == email {
            return Err(AppError::Validation(
                "you cannot invite yourself".to_string(),
            ));
        }

        let pending = self.invitations.pending_for(inviter_id, &email).await?;
        if pending.iter().any(|p| !p.is_expired(now)) {
            return Err(AppError::Validation(
                "a pending invitation to this recipient already exists".to_string(),
            ));
        }

        let mut warnings = Vec::new();
        let invitee = self.agents.get_by_email(&email).await?;
        if let Some(ref invitee) = invitee {
            if invitee.upline_id.is_some() {
                return Err(AppError::Validation(
                    "this agent already has an upline and must be detached before \
                     they can be invited"
                        .to_string(),
                ));
            }
            if !self.agents.children_of(invitee.id).await?.is_empty() {
                warnings.push(
                    "this agent currently has downlines and will not be able to accept \
                     until they have none"
                        .to_string(),
                );
            }
        }

        let invitation = self
            .invitations
            .create(NewInvitation {
                inviter_id,
                invitee_email: email,
                invitee_id: invitee.map(|a| a.id),
                message: request.message,
                expires_at: now + Duration::days(self.config.invitation_expiry_days),
            })
            .await?;

        tracing::info!(
            invitation_id = %invitation.id,
            inviter_id = %inviter_id,
            invitee_email = %invitation.invitee_email,
            warnings = warnings.len(),
            "Invitation sent"
        );

        Ok(SendOutcome {
            invitation,
            warnings,
        })
    }

    /// Accept a pending invitation and attach the invitee under the inviter.
    ///
    /// Validation and attach run against the store as one atomic unit: either
    /// the status flips to accepted and the edge is created, or nothing
    /// changes. A lost race surfaces as a concurrency conflict.
    pub async fn accept_invitation(
        &self,
        invitee_id: Uuid,
        invitation_id: Uuid,
    ) -> Result<Invitation> {
        let now = Utc::now();
        let invitation = self.require_invitation(invitation_id).await?;

        if invitation.status != InvitationStatus::Pending.as_str() {
            return Err(AppError::Validation(
                "this invitation is no longer pending".to_string(),
            ));
        }
        if invitation.is_expired(now) {
            return Err(AppError::Expired);
        }

        let invitee = self
            .agents
            .get(invitee_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Agent".to_string()))?;

        if !invitation_addressed_to(&invitation, invitee_id, &invitee.email) {
            return Err(AppError::Validation(
                "this invitation is not addressed to you".to_string(),
            ));
        }
        if invitee.upline_id.is_some() {
            return Err(AppError::Validation(
                "you already belong to a hierarchy; ask an administrator to detach \
                 you first"
                    .to_string(),
            ));
        }
        if !self.agents.children_of(invitee_id).await?.is_empty() {
            return Err(AppError::Validation(
                "agents with existing downlines cannot join another hierarchy"
                    .to_string(),
            ));
        }

        let inviter = self
            .agents
            .get(invitation.inviter_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Inviting agent".to_string()))?;

        // The invitee is a childless root at this point, but a stale inviter
        // path could still smuggle in a cycle; refuse outright.
        if inviter.id == invitee_id || inviter.ancestor_ids().contains(&invitee_id) {
            return Err(AppError::Cycle(
                "accepting would make the agent its own ancestor".to_string(),
            ));
        }

        let fields = HierarchyFields::child_of(&inviter, invitee_id);
        let accepted = self
            .invitations
            .accept_pending(invitation_id, invitee_id, &fields)
            .await?;

        tracing::info!(
            invitation_id = %invitation_id,
            invitee_id = %invitee_id,
            inviter_id = %inviter.id,
            depth = fields.hierarchy_depth,
            "Invitation accepted"
        );

        Ok(accepted)
    }

    /// Decline a pending invitation (invitee side). No graph mutation.
    pub async fn deny_invitation(&self, invitee_id: Uuid, invitation_id: Uuid) -> Result<()> {
        let now = Utc::now();
        let invitation = self.require_invitation(invitation_id).await?;

        let invitee = self
            .agents
            .get(invitee_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Agent".to_string()))?;

        if !invitation_addressed_to(&invitation, invitee_id, &invitee.email) {
            return Err(AppError::NotFound("Invitation".to_string()));
        }
        if invitation.is_expired(now) {
            // Expired pending invitations accept no action except read
            return Err(AppError::Expired);
        }

        self.invitations
            .transition(
                invitation_id,
                InvitationStatus::Pending,
                InvitationStatus::Denied,
            )
            .await?;

        tracing::info!(invitation_id = %invitation_id, invitee_id = %invitee_id, "Invitation denied");

        Ok(())
    }

    /// Withdraw a pending invitation (inviter side). No graph mutation.
    pub async fn cancel_invitation(&self, inviter_id: Uuid, invitation_id: Uuid) -> Result<()> {
        let now = Utc::now();
        let invitation = self.require_invitation(invitation_id).await?;

        if invitation.inviter_id != inviter_id {
            return Err(AppError::NotFound("Invitation".to_string()));
        }
        if invitation.is_expired(now) {
            return Err(AppError::Expired);
        }

        self.invitations
            .transition(
                invitation_id,
                InvitationStatus::Pending,
                InvitationStatus::Cancelled,
            )
            .await?;

        tracing::info!(invitation_id = %invitation_id, inviter_id = %inviter_id, "Invitation cancelled");

        Ok(())
    }

    /// Give a pending invitation a fresh expiration horizon (inviter side).
    /// This is the only way an already-expired pending invitation becomes
    /// actionable again.
    pub async fn resend_invitation(
        &self,
        inviter_id: Uuid,
        invitation_id: Uuid,
    ) -> Result<Invitation> {
        let now = Utc::now();
        let invitation = self.require_invitation(invitation_id).await?;

        if invitation.inviter_id != inviter_id {
            return Err(AppError::NotFound("Invitation".to_string()));
        }
        if invitation.status != InvitationStatus::Pending.as_str() {
            return Err(AppError::Validation(
                "only pending invitations can be resent".to_string(),
            ));
        }

        // Reviving an expired invitation must not produce a second live
        // pending invitation to the same address.
        let siblings = self
            .invitations
            .pending_for(inviter_id, &invitation.invitee_email)
            .await?;
        if siblings
            .iter()
            .any(|p| p.id != invitation.id && !p.is_expired(now))
        {
            return Err(AppError::Validation(
                "a newer pending invitation to this recipient already exists; \
                 cancel it before resending this one"
                    .to_string(),
            ));
        }

        let was_expired = invitation.is_expired(now);
        let new_expiry = now + Duration::days(self.config.invitation_expiry_days);
        self.invitations
            .extend_expiry(invitation_id, new_expiry)
            .await?;

        tracing::info!(
            invitation_id = %invitation_id,
            inviter_id = %inviter_id,
            was_expired,
            new_expiry = %new_expiry,
            "Invitation resent"
        );

        self.require_invitation(invitation_id).await
    }

    /// Invitations received by the agent, with derived display fields.
    pub async fn received_invitations(
        &self,
        invitee_id: Uuid,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<InvitationDetails>> {
        let invitee = self
            .agents
            .get(invitee_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Agent".to_string()))?;

        let invitations = self
            .invitations
            .list_received(invitee_id, &invitee.email)
            .await?;
        let filtered = filter_by_effective_status(invitations, status, Utc::now());
        self.enrich(filtered).await
    }

    /// Invitations sent by the agent, with derived display fields.
    pub async fn sent_invitations(
        &self,
        inviter_id: Uuid,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<InvitationDetails>> {
        // The stored status never says "expired"; filter on the derived view
        let stored_filter = match status {
            Some(InvitationStatus::Expired) => Some(InvitationStatus::Pending),
            other => other,
        };
        let invitations = self.invitations.list_sent(inviter_id, stored_filter).await?;
        let filtered = filter_by_effective_status(invitations, status, Utc::now());
        self.enrich(filtered).await
    }

    /// Sent/received counters for the agent's invitation dashboard.
    pub async fn stats(&self, agent_id: Uuid) -> Result<InvitationStats> {
        let agent = self
            .agents
            .get(agent_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Agent".to_string()))?;

        let now = Utc::now();
        let sent = self.invitations.list_sent(agent_id, None).await?;
        let received = self.invitations.list_received(agent_id, &agent.email).await?;

        let mut stats = InvitationStats::default();
        for inv in &sent {
            match inv.status() {
                Some(InvitationStatus::Pending) => stats.sent_pending += 1,
                Some(InvitationStatus::Accepted) => stats.sent_accepted += 1,
                Some(InvitationStatus::Denied) => stats.sent_denied += 1,
                Some(InvitationStatus::Cancelled) => stats.sent_cancelled += 1,
                _ => {}
            }
        }
        for inv in &received {
            if inv.is_expired(now) {
                stats.received_expired += 1;
            } else if inv.status() == Some(InvitationStatus::Pending) {
                stats.received_pending += 1;
            }
        }

        Ok(stats)
    }

    async fn require_invitation(&self, id: Uuid) -> Result<Invitation> {
        self.invitations
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invitation".to_string()))
    }

    async fn enrich(&self, invitations: Vec<Invitation>) -> Result<Vec<InvitationDetails>> {
        let now = Utc::now();
        let mut details = Vec::with_capacity(invitations.len());

        for invitation in invitations {
            let inviter = self.agents.get(invitation.inviter_id).await?;

            let (has_upline, has_downlines) = match invitation.invitee_id {
                Some(invitee_id) => {
                    let invitee = self.agents.get(invitee_id).await?;
                    let has_upline = invitee.map_or(false, |a| a.upline_id.is_some());
                    let has_downlines =
                        !self.agents.children_of(invitee_id).await?.is_empty();
                    (has_upline, has_downlines)
                }
                None => (false, false),
            };

            let is_expired = invitation.is_expired(now);
            let can_accept = invitation.status == InvitationStatus::Pending.as_str()
                && !is_expired
                && !has_upline
                && !has_downlines;

            details.push(InvitationDetails {
                inviter_email: inviter.as_ref().map(|a| a.email.clone()),
                inviter_hierarchy_depth: inviter.as_ref().map(|a| a.hierarchy_depth),
                invitee_has_upline: has_upline,
                invitee_has_downlines: has_downlines,
                is_expired,
                can_accept,
                invitation,
            });
        }

        Ok(details)
    }
}

fn invitation_addressed_to(invitation: &Invitation, agent_id: Uuid, agent_email: &str) -> bool {
    match invitation.invitee_id {
        Some(id) => id == agent_id,
        None => invitation.invitee_email == agent_email.to_lowercase(),
    }
}

fn filter_by_effective_status(
    invitations: Vec<Invitation>,
    status: Option<InvitationStatus>,
    now: DateTime<Utc>,
) -> Vec<Invitation> {
    match status {
        None => invitations,
        Some(InvitationStatus::Expired) => invitations
            .into_iter()
            .filter(|i| i.is_expired(now))
            .collect(),
        Some(InvitationStatus::Pending) => invitations
            .into_iter()
            .filter(|i| i.status == InvitationStatus::Pending.as_str() && !i.is_expired(now))
            .collect(),
        Some(s) => invitations
            .into_iter()
            .filter(|i| i.status == s.as_str())
            .collect(),
    }
}

/// Minimal syntactic email check: one '@' with a dotted, non-empty domain.
fn validate_email(email: &str) -> Result<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation("invalid email address".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{test_agent, MemoryStore};
    use crate::db::schema::AgentProfile;

    fn service(store: &MemoryStore) -> InvitationService {
        InvitationService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            HierarchyConfig {
                invitation_expiry_days: 7,
                default_contract_level: 100,
            },
        )
    }

    async fn seed_agent(store: &MemoryStore, email: &str) -> AgentProfile {
        let agent = test_agent(email);
        store.insert_agent(agent.clone()).await;
        agent
    }

    fn send_req(email: &str) -> SendInvitationRequest {
        SendInvitationRequest {
            invitee_email: email.to_string(),
            message: None,
        }
    }

    #[tokio::test]
    async fn test_send_and_accept_attaches_invitee() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let inviter = seed_agent(&store, "upline@example.com").await;
        let invitee = seed_agent(&store, "downline@example.com").await;

        let outcome = svc
            .send_invitation(inviter.id, send_req("Downline@Example.com"))
            .await
            .unwrap();
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.invitation.invitee_email, "downline@example.com");
        assert_eq!(outcome.invitation.invitee_id, Some(invitee.id));

        let accepted = svc
            .accept_invitation(invitee.id, outcome.invitation.id)
            .await
            .unwrap();
        assert_eq!(accepted.status, "accepted");
        assert!(accepted.responded_at.is_some());

        let attached = store.agent(invitee.id).await.unwrap();
        assert_eq!(attached.upline_id, Some(inviter.id));
        assert_eq!(attached.hierarchy_depth, 1);
        assert_eq!(
            attached.hierarchy_path,
            format!("{}.{}", inviter.id, invitee.id)
        );
    }

    #[tokio::test]
    async fn test_send_rejects_bad_email() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let inviter = seed_agent(&store, "upline@example.com").await;

        for bad in ["", "nope", "@example.com", "a@b", "a b@example.com"] {
            let err = svc
                .send_invitation(inviter.id, send_req(bad))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "email {:?}", bad);
        }
    }

    #[tokio::test]
    async fn test_duplicate_pending_invitation_rejected() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let inviter = seed_agent(&store, "upline@example.com").await;

        svc.send_invitation(inviter.id, send_req("new@example.com"))
            .await
            .unwrap();
        let err = svc
            .send_invitation(inviter.id, send_req("new@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_invitee_with_upline_blocks_send() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let inviter = seed_agent(&store, "upline@example.com").await;
        let other = seed_agent(&store, "other@example.com").await;
        let mut placed = test_agent("placed@example.com");
        placed.upline_id = Some(other.id);
        placed.hierarchy_path = format!("{}.{}", other.id, placed.id);
        placed.hierarchy_depth = 1;
        store.insert_agent(placed).await;

        let err = svc
            .send_invitation(inviter.id, send_req("placed@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_downlines_warn_at_send_but_block_accept() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let inviter = seed_agent(&store, "x@example.com").await;
        let manager = seed_agent(&store, "y@example.com").await;
        let mut report = test_agent("report@example.com");
        report.upline_id = Some(manager.id);
        report.hierarchy_path = format!("{}.{}", manager.id, report.id);
        report.hierarchy_depth = 1;
        store.insert_agent(report).await;

        // Send succeeds with an advisory warning
        let outcome = svc
            .send_invitation(inviter.id, send_req("y@example.com"))
            .await
            .unwrap();
        assert_eq!(outcome.warnings.len(), 1);

        // Accept is a hard failure while the downline remains
        let err = svc
            .accept_invitation(manager.id, outcome.invitation.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // The invitation row is untouched and the graph unchanged
        let inv = store.invitation(outcome.invitation.id).await.unwrap();
        assert_eq!(inv.status, "pending");
        assert!(store.agent(manager.id).await.unwrap().upline_id.is_none());
    }

    #[tokio::test]
    async fn test_accept_requires_matching_invitee() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let inviter = seed_agent(&store, "a@example.com").await;
        let _invitee = seed_agent(&store, "b@example.com").await;
        let interloper = seed_agent(&store, "c@example.com").await;

        let outcome = svc
            .send_invitation(inviter.id, send_req("b@example.com"))
            .await
            .unwrap();
        let err = svc
            .accept_invitation(interloper.id, outcome.invitation.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_expired_invitation_refuses_accept_and_deny() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let inviter = seed_agent(&store, "a@example.com").await;
        let invitee = seed_agent(&store, "b@example.com").await;

        let outcome = svc
            .send_invitation(inviter.id, send_req("b@example.com"))
            .await
            .unwrap();
        // Push the deadline into the past; status stays pending
        store
            .extend_expiry(outcome.invitation.id, Utc::now() - Duration::days(1))
            .await
            .unwrap();

        let err = svc
            .accept_invitation(invitee.id, outcome.invitation.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Expired));

        let err = svc
            .deny_invitation(invitee.id, outcome.invitation.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Expired));

        // No write happened; expiry is purely derived
        let inv = store.invitation(outcome.invitation.id).await.unwrap();
        assert_eq!(inv.status, "pending");
        assert!(inv.is_expired(Utc::now()));
    }

    #[tokio::test]
    async fn test_resend_refreshes_expired_invitation() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let inviter = seed_agent(&store, "a@example.com").await;
        let invitee = seed_agent(&store, "b@example.com").await;

        let outcome = svc
            .send_invitation(inviter.id, send_req("b@example.com"))
            .await
            .unwrap();
        store
            .extend_expiry(outcome.invitation.id, Utc::now() - Duration::days(1))
            .await
            .unwrap();

        let refreshed = svc
            .resend_invitation(inviter.id, outcome.invitation.id)
            .await
            .unwrap();
        assert!(!refreshed.is_expired(Utc::now()));

        // Actionable again after resend
        svc.accept_invitation(invitee.id, outcome.invitation.id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_resend_blocked_while_replacement_is_live() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let inviter = seed_agent(&store, "a@example.com").await;
        let _invitee = seed_agent(&store, "b@example.com").await;

        // First invitation expires, a replacement goes out
        let first = svc
            .send_invitation(inviter.id, send_req("b@example.com"))
            .await
            .unwrap();
        store
            .extend_expiry(first.invitation.id, Utc::now() - Duration::days(1))
            .await
            .unwrap();
        let second = svc
            .send_invitation(inviter.id, send_req("b@example.com"))
            .await
            .unwrap();

        // Reviving the first would yield two live pendings to the same email
        let err = svc
            .resend_invitation(inviter.id, first.invitation.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let now = Utc::now();
        let live: Vec<_> = store
            .pending_for(inviter.id, "b@example.com")
            .await
            .unwrap()
            .into_iter()
            .filter(|p| !p.is_expired(now))
            .collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, second.invitation.id);

        // Once the replacement is gone, the first can come back
        svc.cancel_invitation(inviter.id, second.invitation.id)
            .await
            .unwrap();
        let revived = svc
            .resend_invitation(inviter.id, first.invitation.id)
            .await
            .unwrap();
        assert!(!revived.is_expired(Utc::now()));
    }

    #[tokio::test]
    async fn test_cancel_only_by_inviter() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let inviter = seed_agent(&store, "a@example.com").await;
        let invitee = seed_agent(&store, "b@example.com").await;

        let outcome = svc
            .send_invitation(inviter.id, send_req("b@example.com"))
            .await
            .unwrap();

        let err = svc
            .cancel_invitation(invitee.id, outcome.invitation.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        svc.cancel_invitation(inviter.id, outcome.invitation.id)
            .await
            .unwrap();
        let inv = store.invitation(outcome.invitation.id).await.unwrap();
        assert_eq!(inv.status, "cancelled");
    }

    #[tokio::test]
    async fn test_guarded_transition_resolves_races() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let inviter = seed_agent(&store, "a@example.com").await;
        let invitee = seed_agent(&store, "b@example.com").await;

        let outcome = svc
            .send_invitation(inviter.id, send_req("b@example.com"))
            .await
            .unwrap();

        // First writer wins the pending guard
        svc.accept_invitation(invitee.id, outcome.invitation.id)
            .await
            .unwrap();

        // A racing cancel that re-read stale state loses at the store level
        let err = store
            .transition(
                outcome.invitation.id,
                InvitationStatus::Pending,
                InvitationStatus::Cancelled,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConcurrencyConflict));

        // Exactly one terminal state and exactly one attach
        let inv = store.invitation(outcome.invitation.id).await.unwrap();
        assert_eq!(inv.status, "accepted");
        assert_eq!(
            store.agent(invitee.id).await.unwrap().upline_id,
            Some(inviter.id)
        );
    }

    #[tokio::test]
    async fn test_derived_flags_on_received_list() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let inviter = seed_agent(&store, "a@example.com").await;
        let invitee = seed_agent(&store, "b@example.com").await;

        let fresh = svc
            .send_invitation(inviter.id, send_req("b@example.com"))
            .await
            .unwrap();

        let details = svc.received_invitations(invitee.id, None).await.unwrap();
        assert_eq!(details.len(), 1);
        let d = &details[0];
        assert_eq!(d.invitation.id, fresh.invitation.id);
        assert_eq!(d.inviter_email.as_deref(), Some("a@example.com"));
        assert!(!d.is_expired);
        assert!(d.can_accept);

        // Expire it: flags flip without any status write
        store
            .extend_expiry(fresh.invitation.id, Utc::now() - Duration::days(1))
            .await
            .unwrap();
        let details = svc.received_invitations(invitee.id, None).await.unwrap();
        assert!(details[0].is_expired);
        assert!(!details[0].can_accept);
    }

    #[tokio::test]
    async fn test_stats_count_expired_lazily() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let inviter = seed_agent(&store, "a@example.com").await;
        let invitee = seed_agent(&store, "b@example.com").await;

        let first = svc
            .send_invitation(inviter.id, send_req("b@example.com"))
            .await
            .unwrap();
        store
            .extend_expiry(first.invitation.id, Utc::now() - Duration::days(1))
            .await
            .unwrap();

        let stats = svc.stats(invitee.id).await.unwrap();
        assert_eq!(stats.received_expired, 1);
        assert_eq!(stats.received_pending, 0);

        let stats = svc.stats(inviter.id).await.unwrap();
        assert_eq!(stats.sent_pending, 1);
    }

    #[tokio::test]
    async fn test_self_invitation_rejected() {
        let store = MemoryStore::new();
        let svc = service(&store);
        let inviter = seed_agent(&store, "a@example.com").await;

        let err = svc
            .send_invitation(inviter.id, send_req("A@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
