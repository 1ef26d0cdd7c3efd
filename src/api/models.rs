//! Model registry endpoints
//!
//! Endpoints:
//!   POST /models/register     -> Register a model (unverified)
//!   GET  /models              -> List models (?verified=&capability=&min_rank=)
//!   GET  /models/{id}         -> Get one model
//!   POST /models/{id}/verify  -> Mark a model verified

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::{ApiError, ApiResponse, ApiResult, AppState};
use crate::error::EngineError;
use crate::registry::{Capability, Model, ModelFilter, ModelRegistration};

#[derive(Debug, Default, Deserialize)]
pub struct ListModelsQuery {
    pub verified: Option<bool>,
    pub capability: Option<String>,
    pub min_rank: Option<u32>,
}

impl ListModelsQuery {
    fn into_filter(self) -> Result<ModelFilter, EngineError> {
        let capability = match self.capability.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Some(name.parse::<Capability>()?),
            _ => None,
        };
        let min_rank = match (capability, self.min_rank) {
            (Some(cap), rank) => Some((cap, rank.unwrap_or(1))),
            (None, Some(_)) => {
                return Err(EngineError::validation("min_rank requires a capability"))
            }
            (None, None) => None,
        };
        Ok(ModelFilter {
            verified: self.verified,
            min_rank,
        })
    }
}

/// POST /models/register
pub async fn register_model(
    State(state): State<AppState>,
    payload: Result<Json<ModelRegistration>, JsonRejection>,
) -> Result<(StatusCode, ApiResponse<Model>), ApiError> {
    let Json(registration) = payload?;
    let model = state.engine.registry.register(registration).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(model).with_message("Model registered; awaiting verification"),
    ))
}

/// GET /models
pub async fn list_models(
    State(state): State<AppState>,
    query: Result<Query<ListModelsQuery>, QueryRejection>,
) -> ApiResult<Vec<Model>> {
    let Query(query) = query?;
    let filter = query.into_filter()?;
    Ok(ApiResponse::ok(state.engine.registry.list(&filter).await))
}

/// GET /models/{id}
pub async fn get_model(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> ApiResult<Model> {
    Ok(ApiResponse::ok(state.engine.registry.get(&model_id).await?))
}

/// POST /models/{id}/verify
pub async fn verify_model(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> ApiResult<Model> {
    let model = state.engine.registry.verify(&model_id).await?;
    Ok(ApiResponse::ok(model))
}

pub fn create_models_router(state: AppState) -> Router {
    Router::new()
        .route("/models", get(list_models))
        .route("/models/register", post(register_model))
        .route("/models/{id}", get(get_model))
        .route("/models/{id}/verify", post(verify_model))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_filter() {
        let filter = ListModelsQuery {
            verified: Some(true),
            capability: Some("if".to_string()),
            min_rank: None,
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.min_rank, Some((Capability::InstructionFollowing, 1)));

        let orphan_rank = ListModelsQuery {
            min_rank: Some(3),
            ..Default::default()
        };
        assert!(orphan_rank.into_filter().is_err());
    }
}
