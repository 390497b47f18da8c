// Invitation store: trait seam plus the PostgreSQL backend

use crate::db::schema::{HierarchyFields, Invitation, InvitationStatus};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const INVITATION_COLUMNS: &str = "id, inviter_id, invitee_email, invitee_id, status, \
     message, created_at, expires_at, responded_at";

/// Fields for a new pending invitation.
#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub inviter_id: Uuid,
    pub invitee_email: String,
    pub invitee_id: Option<Uuid>,
    pub message: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Narrow read/write interface over invitation records.
///
/// Status transitions are guarded: a transition only applies when the row is
/// still in the expected `from` status, so a lost race surfaces as
/// `ConcurrencyConflict` instead of double-applying.
#[async_trait]
pub trait InvitationStore: Send + Sync {
    async fn create(&self, new: NewInvitation) -> Result<Invitation>;

    async fn get(&self, id: Uuid) -> Result<Option<Invitation>>;

    async fn list_sent(
        &self,
        inviter_id: Uuid,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<Invitation>>;

    /// Invitations addressed to the agent, either by resolved id or by the
    /// normalized email (covers invitations sent before the agent registered).
    async fn list_received(&self, invitee_id: Uuid, email: &str) -> Result<Vec<Invitation>>;

    /// All pending invitations from this inviter to this email, newest first.
    /// At most one of them may be live (non-expired); callers enforce that
    /// against derived expiry before creating or reviving one.
    async fn pending_for(&self, inviter_id: Uuid, invitee_email: &str)
        -> Result<Vec<Invitation>>;

    /// Guarded status transition; sets `responded_at`.
    async fn transition(
        &self,
        id: Uuid,
        from: InvitationStatus,
        to: InvitationStatus,
    ) -> Result<Invitation>;

    /// Accept a pending invitation and attach the invitee under the inviter
    /// in one transaction: either both writes happen or neither does.
    async fn accept_pending(
        &self,
        id: Uuid,
        invitee_id: Uuid,
        fields: &HierarchyFields,
    ) -> Result<Invitation>;

    /// Push the expiration deadline out (resend flow).
    async fn extend_expiry(&self, id: Uuid, expires_at: DateTime<Utc>) -> Result<()>;
}

/// PostgreSQL-backed invitation store
pub struct PostgresInvitationStore {
    pool: PgPool,
}

impl PostgresInvitationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvitationStore for PostgresInvitationStore {
    async fn create(&self, new: NewInvitation) -> Result<Invitation> {
        let invitation = sqlx::query_as::<_, Invitation>(&format!(
            r#"
            INSERT INTO invitations (inviter_id, invitee_email, invitee_id, status, message, expires_at)
            VALUES ($1, $2, $3, 'pending', $4, $5)
            RETURNING {}
            "#,
            INVITATION_COLUMNS
        ))
        .bind(new.inviter_id)
        .bind(&new.invitee_email)
        .bind(new.invitee_id)
        .bind(&new.message)
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            "Created invitation {} from {} to {}",
            invitation.id,
            invitation.inviter_id,
            invitation.invitee_email
        );

        Ok(invitation)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Invitation>> {
        let invitation = sqlx::query_as::<_, Invitation>(&format!(
            "SELECT {} FROM invitations WHERE id = $1",
            INVITATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invitation)
    }

    async fn list_sent(
        &self,
        inviter_id: Uuid,
        status: Option<InvitationStatus>,
    ) -> Result<Vec<Invitation>> {
        let invitations = sqlx::query_as::<_, Invitation>(&format!(
            r#"
            SELECT {}
            FROM invitations
            WHERE inviter_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
            INVITATION_COLUMNS
        ))
        .bind(inviter_id)
        .bind(status.map(|s| s.as_str().to_string()))
        .fetch_all(&self.pool)
        .await?;

        Ok(invitations)
    }

    async fn list_received(&self, invitee_id: Uuid, email: &str) -> Result<Vec<Invitation>> {
        let invitations = sqlx::query_as::<_, Invitation>(&format!(
            r#"
            SELECT {}
            FROM invitations
            WHERE invitee_id = $1
               OR (invitee_id IS NULL AND invitee_email = lower($2))
            ORDER BY created_at DESC
            "#,
            INVITATION_COLUMNS
        ))
        .bind(invitee_id)
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Ok(invitations)
    }

    async fn pending_for(
        &self,
        inviter_id: Uuid,
        invitee_email: &str,
    ) -> Result<Vec<Invitation>> {
        let invitations = sqlx::query_as::<_, Invitation>(&format!(
            r#"
            SELECT {}
            FROM invitations
            WHERE inviter_id = $1 AND invitee_email = lower($2) AND status = 'pending'
            ORDER BY created_at DESC
            "#,
            INVITATION_COLUMNS
        ))
        .bind(inviter_id)
        .bind(invitee_email)
        .fetch_all(&self.pool)
        .await?;

        Ok(invitations)
    }

    async fn transition(
        &self,
        id: Uuid,
        from: InvitationStatus,
        to: InvitationStatus,
    ) -> Result<Invitation> {
        let updated = sqlx::query_as::<_, Invitation>(&format!(
            r#"
            UPDATE invitations
            SET status = $3, responded_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            INVITATION_COLUMNS
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(invitation) => {
                tracing::info!("Invitation {} transitioned {} -> {}", id, from.as_str(), to.as_str());
                Ok(invitation)
            }
            // Row exists but the guard failed: someone else got there first.
            None => match self.get(id).await? {
                Some(_) => Err(AppError::ConcurrencyConflict),
                None => Err(AppError::NotFound("Invitation".to_string())),
            },
        }
    }

    async fn accept_pending(
        &self,
        id: Uuid,
        invitee_id: Uuid,
        fields: &HierarchyFields,
    ) -> Result<Invitation> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Invitation>(&format!(
            r#"
            UPDATE invitations
            SET status = 'accepted', invitee_id = $2, responded_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            INVITATION_COLUMNS
        ))
        .bind(id)
        .bind(invitee_id)
        .fetch_optional(&mut *tx)
        .await?;

        let invitation = match updated {
            Some(invitation) => invitation,
            None => {
                tx.rollback().await?;
                return match self.get(id).await? {
                    Some(_) => Err(AppError::ConcurrencyConflict),
                    None => Err(AppError::NotFound("Invitation".to_string())),
                };
            }
        };

        let attached = sqlx::query(
            r#"
            UPDATE agents
            SET upline_id = $2, hierarchy_path = $3, hierarchy_depth = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(invitee_id)
        .bind(fields.upline_id)
        .bind(&fields.hierarchy_path)
        .bind(fields.hierarchy_depth)
        .execute(&mut *tx)
        .await?;

        if attached.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::NotFound("Agent".to_string()));
        }

        tx.commit().await?;

        tracing::info!(
            "Invitation {} accepted; agent {} attached under {:?}",
            id,
            invitee_id,
            fields.upline_id
        );

        Ok(invitation)
    }

    async fn extend_expiry(&self, id: Uuid, expires_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE invitations SET expires_at = $2 WHERE id = $1 AND status = 'pending'")
            .bind(id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

        tracing::info!("Extended expiry for invitation {} to {}", id, expires_at);

        Ok(())
    }
}
