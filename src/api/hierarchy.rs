// Hierarchy read and admin endpoints

use crate::api::auth::CurrentUser;
use crate::api::routes::AppState;
use crate::errors::Result;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

/// GET /v1/hierarchy/tree
#[tracing::instrument(skip(state, user))]
pub async fn tree(State(state): State<AppState>, user: CurrentUser) -> Result<impl IntoResponse> {
    let tree = state.hierarchy.downline_tree(user.0.id).await?;
    Ok(Json(tree))
}

/// GET /v1/hierarchy/upline
#[tracing::instrument(skip(state, user))]
pub async fn upline(State(state): State<AppState>, user: CurrentUser) -> Result<impl IntoResponse> {
    let chain = state.hierarchy.upline_chain(user.0.id).await?;
    Ok(Json(chain))
}

/// GET /v1/hierarchy/downlines
#[tracing::instrument(skip(state, user))]
pub async fn downlines(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse> {
    let downlines = state.hierarchy.direct_downlines(user.0.id).await?;
    Ok(Json(downlines))
}

/// GET /v1/hierarchy/stats
#[tracing::instrument(skip(state, user))]
pub async fn stats(State(state): State<AppState>, user: CurrentUser) -> Result<impl IntoResponse> {
    let today = Utc::now().date_naive();
    let stats = state.hierarchy.stats(user.0.id, today).await?;
    Ok(Json(stats))
}

/// GET /v1/hierarchy/performance
#[tracing::instrument(skip(state, user))]
pub async fn performance(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse> {
    let today = Utc::now().date_naive();
    let rows = state.hierarchy.downline_performance(user.0.id, today).await?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct ReparentRequest {
    pub new_upline_id: Uuid,
}

/// PUT /v1/agents/:id/upline (admin)
#[tracing::instrument(skip(state, user))]
pub async fn reparent(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(agent_id): Path<Uuid>,
    Json(request): Json<ReparentRequest>,
) -> Result<impl IntoResponse> {
    let updated = state
        .hierarchy
        .reparent(&user.0, agent_id, request.new_upline_id)
        .await?;
    Ok(Json(updated))
}

/// DELETE /v1/agents/:id/upline (admin)
#[tracing::instrument(skip(state, user))]
pub async fn detach(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(agent_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let updated = state.hierarchy.detach(&user.0, agent_id).await?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct ContractLevelRequest {
    pub contract_level: Option<i32>,
}

/// PUT /v1/agents/:id/contract-level (admin)
#[tracing::instrument(skip(state, user))]
pub async fn set_contract_level(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(agent_id): Path<Uuid>,
    Json(request): Json<ContractLevelRequest>,
) -> Result<impl IntoResponse> {
    let updated = state
        .hierarchy
        .set_contract_level(&user.0, agent_id, request.contract_level)
        .await?;
    Ok(Json(updated))
}
