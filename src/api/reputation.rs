//! Reputation API Endpoints
//!
//! Report ingestion and trust score read-outs.

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::{ApiResponse, ApiResult, AppState};
use crate::registry::{Model, ModelFilter};
use crate::reputation::{
    PerformanceRecord, PerformanceReport, TrustBreakdown, ViolationRecord, ViolationReport,
    AGE_WEIGHT, PERFORMANCE_WEIGHT, RELIABILITY_WEIGHT, USAGE_WEIGHT,
};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    100
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PerformanceReportResponse {
    pub model_id: String,
    pub trust: TrustBreakdown,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViolationReportResponse {
    pub violation: ViolationRecord,
    pub trust_score: f64,
    pub violation_count: u64,
    pub remaining_stake: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrustScoreSummary {
    pub model_id: String,
    pub name: String,
    pub trust_score: f64,
    pub is_verified: bool,
    pub violation_count: u64,
}

impl From<&Model> for TrustScoreSummary {
    fn from(model: &Model) -> Self {
        Self {
            model_id: model.id.clone(),
            name: model.name.clone(),
            trust_score: model.trust_score,
            is_verified: model.is_verified,
            violation_count: model.violation_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentWeights {
    pub performance: f64,
    pub reliability: f64,
    pub usage: f64,
    pub age: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrustScoreDetail {
    pub model_id: String,
    pub name: String,
    pub trust_score: f64,
    pub components: TrustBreakdown,
    pub weights: ComponentWeights,
    pub violation_count: u64,
}

// Endpoints

/// POST /performance/report
pub async fn report_performance(
    State(state): State<AppState>,
    payload: Result<Json<PerformanceReport>, JsonRejection>,
) -> ApiResult<PerformanceReportResponse> {
    let Json(report) = payload?;
    let model_id = report.model_id.clone();
    let trust = state.engine.tracker.report_performance(report).await?;
    Ok(ApiResponse::ok(PerformanceReportResponse { model_id, trust })
        .with_message("Performance recorded"))
}

/// GET /performance/{model_id}
pub async fn get_performance(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Vec<PerformanceRecord>> {
    let Query(query) = query?;
    let records = state
        .engine
        .tracker
        .performance(&model_id, query.limit)
        .await?;
    Ok(ApiResponse::ok(records))
}

/// POST /violations/report
pub async fn report_violation(
    State(state): State<AppState>,
    payload: Result<Json<ViolationReport>, JsonRejection>,
) -> ApiResult<ViolationReportResponse> {
    let Json(report) = payload?;
    let violation = state.engine.tracker.report_violation(report).await?;
    let model = state.engine.registry.get(&violation.model_id).await?;
    Ok(ApiResponse::ok(ViolationReportResponse {
        violation,
        trust_score: model.trust_score,
        violation_count: model.violation_count,
        remaining_stake: model.stake,
    })
    .with_message("Violation recorded"))
}

/// GET /violations/{model_id}
pub async fn get_violations(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Vec<ViolationRecord>> {
    let Query(query) = query?;
    let records = state
        .engine
        .tracker
        .violations(&model_id, query.limit)
        .await?;
    Ok(ApiResponse::ok(records))
}

/// GET /trust-scores
pub async fn list_trust_scores(State(state): State<AppState>) -> ApiResult<Vec<TrustScoreSummary>> {
    let models = state.engine.registry.list(&ModelFilter::default()).await;
    Ok(ApiResponse::ok(models.iter().map(TrustScoreSummary::from).collect()))
}

/// GET /trust-scores/{model_id}
pub async fn get_trust_score(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> ApiResult<TrustScoreDetail> {
    let model = state.engine.registry.get(&model_id).await?;
    let components = state.engine.registry.trust_breakdown(&model_id).await?;
    Ok(ApiResponse::ok(TrustScoreDetail {
        model_id: model.id,
        name: model.name,
        trust_score: model.trust_score,
        components,
        weights: ComponentWeights {
            performance: PERFORMANCE_WEIGHT,
            reliability: RELIABILITY_WEIGHT,
            usage: USAGE_WEIGHT,
            age: AGE_WEIGHT,
        },
        violation_count: model.violation_count,
    }))
}

pub fn create_reputation_router(state: AppState) -> Router {
    Router::new()
        .route("/performance/report", post(report_performance))
        .route("/performance/{model_id}", get(get_performance))
        .route("/violations/report", post(report_violation))
        .route("/violations/{model_id}", get(get_violations))
        .route("/trust-scores", get(list_trust_scores))
        .route("/trust-scores/{model_id}", get(get_trust_score))
        .with_state(state)
}
