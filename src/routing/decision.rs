//! Routing decision records
//!
//! A decision is immutable once created and becomes an input to the audit
//! batch for its period. Failed routes are recorded too.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::Capability;

/// The model a query was routed to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChosenModel {
    pub model_id: String,
    pub model_name: String,
    pub trust_score: f64,
}

/// Ranking inputs for one candidate, kept for audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub model_id: String,
    pub trust_score: f64,
    pub cost_score: f64,
    pub latency_score: f64,
    pub composite: f64,
    pub stake: f64,
    pub avg_latency_ms: f64,
    pub cost_per_1k_usd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoutingFailure {
    #[serde(rename = "NoEligibleModelError")]
    NoEligibleModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub id: String,
    pub query: String,
    pub required_capability: Option<Capability>,
    pub chosen: Option<ChosenModel>,
    pub estimated_latency_ms: Option<f64>,
    pub cost_per_1k_usd: Option<f64>,
    /// Candidates in final rank order
    pub ranking: Vec<CandidateScore>,
    pub reason: String,
    pub failure: Option<RoutingFailure>,
    pub timestamp: DateTime<Utc>,
}

impl RoutingDecision {
    pub fn is_routed(&self) -> bool {
        self.chosen.is_some()
    }

    pub fn chosen_model_id(&self) -> Option<&str> {
        self.chosen.as_ref().map(|c| c.model_id.as_str())
    }
}
