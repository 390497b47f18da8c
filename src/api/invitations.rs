// Invitation lifecycle endpoints

use crate::api::auth::CurrentUser;
use crate::api::routes::AppState;
use crate::db::schema::InvitationStatus;
use crate::errors::{AppError, Result};
use crate::hierarchy::invitations::SendInvitationRequest;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

impl StatusFilter {
    fn parse(&self) -> Result<Option<InvitationStatus>> {
        match self.status.as_deref() {
            None => Ok(None),
            Some(raw) => InvitationStatus::from_str(raw)
                .map(Some)
                .ok_or_else(|| AppError::Validation(format!("unknown status {:?}", raw))),
        }
    }
}

/// POST /v1/invitations
#[tracing::instrument(skip(state, user, request))]
pub async fn send(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<SendInvitationRequest>,
) -> Result<impl IntoResponse> {
    let outcome = state.invitations.send_invitation(user.0.id, request).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /v1/invitations/sent?status=
#[tracing::instrument(skip(state, user))]
pub async fn list_sent(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<StatusFilter>,
) -> Result<impl IntoResponse> {
    let status = filter.parse()?;
    let invitations = state.invitations.sent_invitations(user.0.id, status).await?;
    Ok(Json(invitations))
}

/// GET /v1/invitations/received?status=
#[tracing::instrument(skip(state, user))]
pub async fn list_received(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(filter): Query<StatusFilter>,
) -> Result<impl IntoResponse> {
    let status = filter.parse()?;
    let invitations = state
        .invitations
        .received_invitations(user.0.id, status)
        .await?;
    Ok(Json(invitations))
}

/// GET /v1/invitations/stats
#[tracing::instrument(skip(state, user))]
pub async fn stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse> {
    let stats = state.invitations.stats(user.0.id).await?;
    Ok(Json(stats))
}

/// POST /v1/invitations/:id/accept
#[tracing::instrument(skip(state, user))]
pub async fn accept(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invitation_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let invitation = state
        .invitations
        .accept_invitation(user.0.id, invitation_id)
        .await?;
    Ok(Json(invitation))
}

/// POST /v1/invitations/:id/deny
#[tracing::instrument(skip(state, user))]
pub async fn deny(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invitation_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state
        .invitations
        .deny_invitation(user.0.id, invitation_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/invitations/:id/cancel
#[tracing::instrument(skip(state, user))]
pub async fn cancel(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invitation_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state
        .invitations
        .cancel_invitation(user.0.id, invitation_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/invitations/:id/resend
#[tracing::instrument(skip(state, user))]
pub async fn resend(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(invitation_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let invitation = state
        .invitations
        .resend_invitation(user.0.id, invitation_id)
        .await?;
    Ok(Json(invitation))
}
