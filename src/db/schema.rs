// Database schema types and helpers

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Agent
// ============================================================================

/// Separator between agent ids in a stored hierarchy path.
pub const PATH_SEPARATOR: char = '.';

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: Vec<String>,
    /// Contract level on the 80..=145 ladder; None means unset (street level).
    pub contract_level: Option<i32>,
    pub upline_id: Option<Uuid>,
    /// Dot-separated agent ids from the root down to this agent, inclusive.
    pub hierarchy_path: String,
    pub hierarchy_depth: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentProfile {
    /// Parse the stored hierarchy path into ordered agent ids (root first).
    pub fn path_ids(&self) -> Vec<Uuid> {
        self.hierarchy_path
            .split(PATH_SEPARATOR)
            .filter_map(|s| Uuid::parse_str(s).ok())
            .collect()
    }

    /// Ancestor ids, root first, excluding the agent itself.
    pub fn ancestor_ids(&self) -> Vec<Uuid> {
        let mut ids = self.path_ids();
        ids.retain(|id| *id != self.id);
        ids
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Admin capability is a role on the profile, resolved at session start.
    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }

    pub fn display_name(&self) -> String {
        let full = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

/// Hierarchy columns written together when an edge changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyFields {
    pub upline_id: Option<Uuid>,
    pub hierarchy_path: String,
    pub hierarchy_depth: i32,
}

impl HierarchyFields {
    /// Fields for a root agent (no upline).
    pub fn root(agent_id: Uuid) -> Self {
        Self {
            upline_id: None,
            hierarchy_path: agent_id.to_string(),
            hierarchy_depth: 0,
        }
    }

    /// Fields for an agent attached directly under the given upline.
    pub fn child_of(upline: &AgentProfile, agent_id: Uuid) -> Self {
        Self {
            upline_id: Some(upline.id),
            hierarchy_path: format!("{}{}{}", upline.hierarchy_path, PATH_SEPARATOR, agent_id),
            hierarchy_depth: upline.hierarchy_depth + 1,
        }
    }
}

// ============================================================================
// Invitation
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub inviter_id: Uuid,
    /// Normalized (lowercased, trimmed) at creation.
    pub invitee_email: String,
    /// Resolved once the email matches a registered agent.
    pub invitee_id: Option<Uuid>,
    pub status: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl Invitation {
    pub fn status(&self) -> Option<InvitationStatus> {
        InvitationStatus::from_str(&self.status)
    }

    /// Expiry is a pure function of time; nothing is written to derive it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending.as_str() && now > self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Denied,
    Cancelled,
    /// Derived view only; never stored.
    Expired,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Denied => "denied",
            InvitationStatus::Cancelled => "cancelled",
            InvitationStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvitationStatus::Pending),
            "accepted" => Some(InvitationStatus::Accepted),
            "denied" => Some(InvitationStatus::Denied),
            "cancelled" => Some(InvitationStatus::Cancelled),
            "expired" => Some(InvitationStatus::Expired),
            _ => None,
        }
    }
}

// ============================================================================
// Production
// ============================================================================

/// Policy lifecycle statuses relevant to production queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyStatus {
    Active,
    Pending,
    Lapsed,
    Cancelled,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PolicyStatus::Active => "active",
            PolicyStatus::Pending => "pending",
            PolicyStatus::Lapsed => "lapsed",
            PolicyStatus::Cancelled => "cancelled",
        }
    }
}

/// One commissionable premium row from the policy store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductionRow {
    pub agent_id: Uuid,
    pub effective_date: NaiveDate,
    pub premium: f64,
}

/// Inclusive date range for production queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}
