// Team production and pace endpoints

use crate::api::auth::CurrentUser;
use crate::api::routes::AppState;
use crate::commissions::pace::AgentTarget;
use crate::db::schema::DateRange;
use crate::errors::{AppError, Result};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ProductionWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// GET /v1/team/production?start=&end=
#[tracing::instrument(skip(state, user))]
pub async fn production(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(window): Query<ProductionWindow>,
) -> Result<impl IntoResponse> {
    if window.start > window.end {
        return Err(AppError::Validation(
            "start date must not be after end date".to_string(),
        ));
    }
    let report = state
        .team
        .team_production(
            user.0.id,
            DateRange {
                start: window.start,
                end: window.end,
            },
        )
        .await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct MemberTarget {
    pub agent_id: Uuid,
    pub expected_policies_per_year: f64,
    pub average_premium: f64,
}

#[derive(Debug, Deserialize)]
pub struct PaceRequest {
    pub targets: Vec<MemberTarget>,
    #[serde(default)]
    pub pending_premium: f64,
}

/// POST /v1/team/pace
#[tracing::instrument(skip(state, user, request))]
pub async fn pace(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<PaceRequest>,
) -> Result<impl IntoResponse> {
    let targets: HashMap<Uuid, AgentTarget> = request
        .targets
        .into_iter()
        .map(|t| {
            (
                t.agent_id,
                AgentTarget {
                    expected_policies_per_year: t.expected_policies_per_year,
                    average_premium: t.average_premium,
                },
            )
        })
        .collect();

    let today = Utc::now().date_naive();
    let report = state
        .team
        .team_pace(user.0.id, &targets, request.pending_premium, today)
        .await?;
    Ok(Json(report))
}
