//! HTTP API endpoints for the trust routing engine
//!
//! Provides REST APIs for:
//! - Model registry (register, verify, list)
//! - Routing (route, stats, audit batches and proofs)
//! - Reputation (performance and violation reports, trust scores)
//! - Dashboard overview
//! - Middleware (rate limiting, size limits, headers, request logging)

pub mod dashboard;
pub mod envelope;
pub mod middleware;
pub mod models;
pub mod reputation;
pub mod routing;

use axum::{middleware as axum_middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::EngineConfig;
use crate::engine::Engine;

pub use dashboard::create_dashboard_router;
pub use envelope::{ApiError, ApiResponse, ApiResult};
pub use middleware::{
    body_size_middleware, logging_middleware, rate_limit_middleware, security_headers_middleware,
    MiddlewareConfig, MiddlewareState, RateLimiter,
};
pub use models::create_models_router;
pub use reputation::create_reputation_router;
pub use routing::create_routing_router;

/// Shared state for every handler
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

/// All `/api` routes without middleware
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .merge(create_models_router(state.clone()))
        .merge(create_routing_router(state.clone()))
        .merge(create_reputation_router(state.clone()))
        .merge(create_dashboard_router(state))
}

/// The full application: `/api`, `/health` and the middleware stack
pub fn build_app(engine: Arc<Engine>, config: &EngineConfig) -> Router {
    let middleware_state = MiddlewareState::new(MiddlewareConfig::from(config));

    let app = Router::new()
        .nest("/api", create_api_router(AppState::new(engine)))
        .route("/health", get(|| async { "OK" }))
        .layer(axum_middleware::from_fn_with_state(
            middleware_state.clone(),
            body_size_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            middleware_state.clone(),
            rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            middleware_state,
            logging_middleware,
        ))
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http());

    if config.server.enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}
