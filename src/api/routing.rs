//! Routing and audit endpoints
//!
//! Endpoints:
//!   POST /route                                    -> Route a query (?query=&capability=)
//!   GET  /routing/stats                            -> Routing stats (?hours=24)
//!   GET  /routing/decisions                        -> Recent decisions (?limit=50)
//!   POST /routing/commit-batch                     -> Commit a period (?period=)
//!   GET  /routing/batches                          -> Committed batches
//!   GET  /routing/batches/{period}                 -> One committed batch
//!   GET  /routing/batches/{period}/proof/{decision} -> Inclusion proof

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{ApiError, ApiResponse, ApiResult, AppState};
use crate::audit::{Batch, InclusionProof};
use crate::error::EngineError;
use crate::registry::Capability;
use crate::routing::{RoutingDecision, RoutingStats};

const MAX_DECISIONS_PAGE: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct RouteQuery {
    pub query: String,
    pub capability: Option<String>,
}

/// Flattened view of a decision for clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteResponse {
    pub decision_id: String,
    pub model_id: Option<String>,
    pub model_name: Option<String>,
    pub trust_score: Option<f64>,
    pub estimated_latency_ms: Option<f64>,
    pub cost_per_1k_usd: Option<f64>,
    pub required_capability: Option<Capability>,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&RoutingDecision> for RouteResponse {
    fn from(decision: &RoutingDecision) -> Self {
        Self {
            decision_id: decision.id.clone(),
            model_id: decision.chosen.as_ref().map(|c| c.model_id.clone()),
            model_name: decision.chosen.as_ref().map(|c| c.model_name.clone()),
            trust_score: decision.chosen.as_ref().map(|c| c.trust_score),
            estimated_latency_ms: decision.estimated_latency_ms,
            cost_per_1k_usd: decision.cost_per_1k_usd,
            required_capability: decision.required_capability,
            reason: decision.reason.clone(),
            timestamp: decision.timestamp,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default = "default_hours")]
    pub hours: i64,
}

fn default_hours() -> i64 {
    24
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

#[derive(Debug, Deserialize)]
pub struct CommitQuery {
    pub period: String,
}

/// POST /route
pub async fn route_query(
    State(state): State<AppState>,
    query: Result<Query<RouteQuery>, QueryRejection>,
) -> ApiResult<RouteResponse> {
    let Query(query) = query?;
    let decision = state
        .engine
        .router
        .route(&query.query, query.capability.as_deref())
        .await?;

    let response = RouteResponse::from(&decision);
    if decision.is_routed() {
        Ok(ApiResponse::ok(response))
    } else {
        let err = EngineError::NoEligibleModel {
            capability: decision.required_capability.map(|c| c.to_string()),
        };
        Ok(ApiResponse::failed(response, format!("{}: {}", err.kind(), err)))
    }
}

/// GET /routing/stats
pub async fn routing_stats(
    State(state): State<AppState>,
    query: Result<Query<StatsQuery>, QueryRejection>,
) -> ApiResult<RoutingStats> {
    let Query(query) = query?;
    Ok(ApiResponse::ok(state.engine.router.stats(query.hours).await?))
}

/// GET /routing/decisions
pub async fn recent_decisions(
    State(state): State<AppState>,
    query: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Vec<RoutingDecision>> {
    let Query(query) = query?;
    let limit = query.limit.min(MAX_DECISIONS_PAGE);
    Ok(ApiResponse::ok(state.engine.router.recent(limit).await))
}

/// POST /routing/commit-batch
///
/// Committing an already committed period is reported as success with the
/// original batch, so clients can retry blindly.
pub async fn commit_batch(
    State(state): State<AppState>,
    query: Result<Query<CommitQuery>, QueryRejection>,
) -> ApiResult<Batch> {
    let Query(query) = query?;
    match state.engine.committer.commit_batch(&query.period).await {
        Ok(batch) => Ok(ApiResponse::ok(batch).with_message("Batch committed")),
        Err(EngineError::DuplicateCommit { batch }) => {
            info!(period = %batch.period, "Returning existing batch for duplicate commit");
            let message = format!(
                "DuplicateCommitError: period {} was already committed",
                batch.period
            );
            Ok(ApiResponse::ok(*batch).with_message(message))
        }
        Err(e) => Err(ApiError(e)),
    }
}

/// GET /routing/batches
pub async fn list_batches(State(state): State<AppState>) -> ApiResult<Vec<Batch>> {
    Ok(ApiResponse::ok(state.engine.committer.batches()))
}

/// GET /routing/batches/{period}
pub async fn get_batch(
    State(state): State<AppState>,
    Path(period): Path<String>,
) -> ApiResult<Batch> {
    Ok(ApiResponse::ok(state.engine.committer.batch(&period)?))
}

/// GET /routing/batches/{period}/proof/{decision_id}
pub async fn get_inclusion_proof(
    State(state): State<AppState>,
    Path((period, decision_id)): Path<(String, String)>,
) -> ApiResult<InclusionProof> {
    let proof = state
        .engine
        .committer
        .inclusion_proof(&period, &decision_id)?;
    Ok(ApiResponse::ok(proof))
}

pub fn create_routing_router(state: AppState) -> Router {
    Router::new()
        .route("/route", post(route_query))
        .route("/routing/stats", get(routing_stats))
        .route("/routing/decisions", get(recent_decisions))
        .route("/routing/commit-batch", post(commit_batch))
        .route("/routing/batches", get(list_batches))
        .route("/routing/batches/{period}", get(get_batch))
        .route(
            "/routing/batches/{period}/proof/{decision_id}",
            get(get_inclusion_proof),
        )
        .with_state(state)
}
