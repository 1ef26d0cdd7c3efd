use axum::{extract::State, routing::get, Router};
use serde::{Deserialize, Serialize};

use crate::api::{ApiResponse, ApiResult, AppState};
use crate::registry::{Model, ModelFilter};
use crate::reputation::PerformanceRecord;
use crate::routing::RoutingStats;

const RECENT_PERFORMANCE: usize = 10;
const TOP_MODELS: usize = 5;
const STATS_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardOverview {
    pub total_models: usize,
    pub verified_models: usize,
    pub total_decisions: usize,
    pub total_violations: usize,
    pub committed_batches: usize,
    pub recent_performance: Vec<PerformanceRecord>,
    pub top_models: Vec<Model>,
    pub routing: RoutingStats,
}

/// GET /dashboard/overview
pub async fn overview(State(state): State<AppState>) -> ApiResult<DashboardOverview> {
    let engine = &state.engine;
    let models = engine.registry.list(&ModelFilter::default()).await;
    let verified_models = models.iter().filter(|m| m.is_verified).count();

    Ok(ApiResponse::ok(DashboardOverview {
        total_models: models.len(),
        verified_models,
        total_decisions: engine.decisions.len().await,
        total_violations: engine.tracker.total_violations().await,
        committed_batches: engine.committer.batches().len(),
        recent_performance: engine.tracker.recent_performance(RECENT_PERFORMANCE).await,
        top_models: models.into_iter().take(TOP_MODELS).collect(),
        routing: engine.router.stats(STATS_WINDOW_HOURS).await?,
    }))
}

pub fn create_dashboard_router(state: AppState) -> Router {
    Router::new()
        .route("/dashboard/overview", get(overview))
        .with_state(state)
}
