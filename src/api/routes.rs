use crate::{
    api::{health, hierarchy, invitations, team},
    config::Config,
    db::agents::{AgentStore, PostgresAgentStore},
    db::invitations::PostgresInvitationStore,
    db::production::PostgresProductionStore,
    hierarchy::invitations::InvitationService,
    hierarchy::service::HierarchyService,
    commissions::team::TeamMetricsService,
    observability::HealthChecker,
};
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub agents: Arc<dyn AgentStore>,
    pub invitations: Arc<InvitationService>,
    pub hierarchy: Arc<HierarchyService>,
    pub team: Arc<TeamMetricsService>,
    pub health_checker: Arc<HealthChecker>,
}

pub fn create_router(db_pool: PgPool, config: &Config) -> Router {
    let agents: Arc<dyn AgentStore> = Arc::new(PostgresAgentStore::new(db_pool.clone()));
    let invitation_store = Arc::new(PostgresInvitationStore::new(db_pool.clone()));
    let production_store = Arc::new(PostgresProductionStore::new(db_pool.clone()));

    let state = AppState {
        agents: agents.clone(),
        invitations: Arc::new(InvitationService::new(
            agents.clone(),
            invitation_store,
            config.hierarchy.clone(),
        )),
        hierarchy: Arc::new(HierarchyService::new(
            agents.clone(),
            production_store.clone(),
            config.hierarchy.clone(),
        )),
        team: Arc::new(TeamMetricsService::new(
            agents,
            production_store,
            config.pace.clone(),
        )),
        health_checker: Arc::new(HealthChecker::new(db_pool)),
    };

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        // API v1 routes
        .nest("/v1", v1_routes())
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Add state
        .with_state(state)
}

fn v1_routes() -> Router<AppState> {
    Router::new()
        // Invitations
        .route("/invitations", post(invitations::send))
        .route("/invitations/sent", get(invitations::list_sent))
        .route("/invitations/received", get(invitations::list_received))
        .route("/invitations/stats", get(invitations::stats))
        .route("/invitations/:id/accept", post(invitations::accept))
        .route("/invitations/:id/deny", post(invitations::deny))
        .route("/invitations/:id/cancel", post(invitations::cancel))
        .route("/invitations/:id/resend", post(invitations::resend))
        // Hierarchy views
        .route("/hierarchy/tree", get(hierarchy::tree))
        .route("/hierarchy/upline", get(hierarchy::upline))
        .route("/hierarchy/downlines", get(hierarchy::downlines))
        .route("/hierarchy/stats", get(hierarchy::stats))
        .route("/hierarchy/performance", get(hierarchy::performance))
        // Admin hierarchy moves
        .route(
            "/agents/:id/upline",
            put(hierarchy::reparent).delete(hierarchy::detach),
        )
        .route(
            "/agents/:id/contract-level",
            put(hierarchy::set_contract_level),
        )
        // Team rollups
        .route("/team/production", get(team::production))
        .route("/team/pace", post(team::pace))
}
