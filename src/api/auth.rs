// Request identity resolution
//
// Authentication happens upstream (gateway/session layer); requests arrive
// with a trusted `x-agent-id` header. This extractor resolves the header to
// a full agent profile so handlers can check roles without extra lookups.

use crate::api::routes::AppState;
use crate::db::schema::AgentProfile;
use crate::errors::AppError;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

pub const AGENT_ID_HEADER: &str = "x-agent-id";

/// The agent making the request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AgentProfile);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AGENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Validation(format!("missing {} header", AGENT_ID_HEADER))
            })?;

        let agent_id = Uuid::parse_str(header)
            .map_err(|_| AppError::Validation(format!("invalid {} header", AGENT_ID_HEADER)))?;

        let profile = state
            .agents
            .get(agent_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Agent".to_string()))?;

        Ok(CurrentUser(profile))
    }
}
