//! Routing Decision Engine
//!
//! Picks one verified model per query. Trust dominates the composite score;
//! cost and latency only separate models within the same trust tier. Every
//! call, including a failed one, leaves a decision in the log.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::registry::{Capability, Model, ModelRegistry};
use crate::routing::{
    CandidateScore, ChosenModel, DecisionLog, RoutingDecision, RoutingFailure, RoutingStats,
};

const NO_ELIGIBLE_REASON: &str = "NoEligibleModelError";

/// Composite ranking weights and eligibility thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingParameters {
    pub trust_weight: f64,
    pub cost_weight: f64,
    pub latency_weight: f64,
    /// Trust points that make up one ranking tier
    pub tier_width: f64,
    pub min_stake: f64,
    pub min_capability_rank: u32,
}

impl Default for RoutingParameters {
    fn default() -> Self {
        Self {
            trust_weight: 1.0,
            cost_weight: 2.0,
            latency_weight: 2.0,
            tier_width: 5.0,
            min_stake: 0.0,
            min_capability_rank: 1,
        }
    }
}

impl RoutingParameters {
    /// Reject weightings under which cost and latency together could
    /// overturn a trust gap wider than one tier.
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("trust_weight", self.trust_weight),
            ("cost_weight", self.cost_weight),
            ("latency_weight", self.latency_weight),
            ("tier_width", self.tier_width),
            ("min_stake", self.min_stake),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(EngineError::validation(format!(
                    "{} must be a non-negative number",
                    name
                )));
            }
        }
        if self.trust_weight <= 0.0 || self.tier_width <= 0.0 {
            return Err(EngineError::validation(
                "trust_weight and tier_width must be positive",
            ));
        }
        if self.cost_weight + self.latency_weight >= self.trust_weight * self.tier_width {
            return Err(EngineError::validation(format!(
                "cost_weight + latency_weight ({}) must be below trust_weight x tier_width ({})",
                self.cost_weight + self.latency_weight,
                self.trust_weight * self.tier_width
            )));
        }
        if self.min_capability_rank == 0 {
            return Err(EngineError::validation("min_capability_rank must be at least 1"));
        }
        Ok(())
    }
}

pub struct RoutingEngine {
    registry: Arc<ModelRegistry>,
    decisions: Arc<DecisionLog>,
    params: RoutingParameters,
}

impl RoutingEngine {
    pub fn new(
        registry: Arc<ModelRegistry>,
        decisions: Arc<DecisionLog>,
        params: RoutingParameters,
    ) -> Self {
        Self {
            registry,
            decisions,
            params,
        }
    }

    pub fn params(&self) -> &RoutingParameters {
        &self.params
    }

    /// Route a query, optionally requiring a capability by name
    pub async fn route(&self, query: &str, capability: Option<&str>) -> Result<RoutingDecision> {
        self.route_at(query, capability, Utc::now()).await
    }

    pub async fn route_at(
        &self,
        query: &str,
        capability: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RoutingDecision> {
        let query = query.trim();
        if query.is_empty() {
            return Err(EngineError::validation("query cannot be empty"));
        }
        let required = match capability.map(str::trim).filter(|c| !c.is_empty()) {
            Some(name) => Some(name.parse::<Capability>()?),
            None => None,
        };

        let candidates: Vec<Model> = self
            .registry
            .snapshot()
            .await
            .into_iter()
            .filter(|m| self.is_eligible(m, required))
            .collect();

        let id = format!("route_{}", uuid::Uuid::new_v4().simple());
        let decision = if candidates.is_empty() {
            warn!(
                decision_id = %id,
                capability = ?required,
                "No eligible model for query"
            );
            RoutingDecision {
                id,
                query: query.to_string(),
                required_capability: required,
                chosen: None,
                estimated_latency_ms: None,
                cost_per_1k_usd: None,
                ranking: Vec::new(),
                reason: NO_ELIGIBLE_REASON.to_string(),
                failure: Some(RoutingFailure::NoEligibleModel),
                timestamp: now,
            }
        } else {
            let ranking = self.rank(&candidates);
            // rank() never returns fewer entries than candidates
            let best = &ranking[0];
            let chosen = candidates
                .iter()
                .find(|m| m.id == best.model_id)
                .ok_or_else(|| EngineError::model_not_found(&best.model_id))?;
            let reason = selection_reason(chosen, &candidates);

            info!(
                decision_id = %id,
                model_id = %chosen.id,
                trust_score = chosen.trust_score,
                candidates = candidates.len(),
                "Routed query"
            );

            RoutingDecision {
                id,
                query: query.to_string(),
                required_capability: required,
                chosen: Some(ChosenModel {
                    model_id: chosen.id.clone(),
                    model_name: chosen.name.clone(),
                    trust_score: chosen.trust_score,
                }),
                estimated_latency_ms: Some(chosen.profile.avg_latency_ms),
                cost_per_1k_usd: Some(chosen.profile.cost_per_1k_usd),
                ranking,
                reason,
                failure: None,
                timestamp: now,
            }
        };

        self.decisions.append(decision.clone()).await;
        Ok(decision)
    }

    /// Routing activity over the trailing `hours`
    pub async fn stats(&self, hours: i64) -> Result<RoutingStats> {
        self.stats_at(hours, Utc::now()).await
    }

    pub async fn stats_at(&self, hours: i64, now: DateTime<Utc>) -> Result<RoutingStats> {
        if hours <= 0 {
            return Err(EngineError::validation("hours must be positive"));
        }
        let cutoff = Duration::try_hours(hours)
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| {
                EngineError::validation(format!("hours={} is outside the supported range", hours))
            })?;
        let window = self.decisions.since(cutoff).await;
        debug!(hours = hours, decisions = window.len(), "Computed routing stats");
        Ok(RoutingStats::from_decisions(hours, &window))
    }

    /// Most recent decisions, newest first
    pub async fn recent(&self, limit: usize) -> Vec<RoutingDecision> {
        self.decisions.recent(limit).await
    }

    fn is_eligible(&self, model: &Model, required: Option<Capability>) -> bool {
        if !model.is_verified || model.stake < self.params.min_stake {
            return false;
        }
        match required {
            Some(capability) => model.meets_rank(capability, self.params.min_capability_rank),
            None => true,
        }
    }

    /// Score every candidate and return them best first
    fn rank(&self, candidates: &[Model]) -> Vec<CandidateScore> {
        let min_cost = candidates
            .iter()
            .map(|m| m.profile.cost_per_1k_usd)
            .fold(f64::INFINITY, f64::min);
        let min_latency = candidates
            .iter()
            .map(|m| m.profile.avg_latency_ms)
            .fold(f64::INFINITY, f64::min);

        let mut scored: Vec<CandidateScore> = candidates
            .iter()
            .map(|m| {
                let cost_score = relative_score(min_cost, m.profile.cost_per_1k_usd);
                let latency_score = relative_score(min_latency, m.profile.avg_latency_ms);
                let composite = self.params.trust_weight * m.trust_score
                    + self.params.cost_weight * cost_score
                    + self.params.latency_weight * latency_score;
                CandidateScore {
                    model_id: m.id.clone(),
                    trust_score: m.trust_score,
                    cost_score,
                    latency_score,
                    composite,
                    stake: m.stake,
                    avg_latency_ms: m.profile.avg_latency_ms,
                    cost_per_1k_usd: m.profile.cost_per_1k_usd,
                }
            })
            .collect();

        scored.sort_by(ranking_order);
        scored
    }
}

/// Best first: composite, then stake, then latency, then id
fn ranking_order(a: &CandidateScore, b: &CandidateScore) -> Ordering {
    b.composite
        .total_cmp(&a.composite)
        .then_with(|| b.stake.total_cmp(&a.stake))
        .then_with(|| a.avg_latency_ms.total_cmp(&b.avg_latency_ms))
        .then_with(|| a.model_id.cmp(&b.model_id))
}

/// `best / value` in [0, 1]; a zero value is as good as it gets
fn relative_score(best: f64, value: f64) -> f64 {
    if value <= 0.0 {
        1.0
    } else {
        (best / value).clamp(0.0, 1.0)
    }
}

fn selection_reason(chosen: &Model, candidates: &[Model]) -> String {
    let n = candidates.len() as f64;
    let avg_trust = candidates.iter().map(|m| m.trust_score).sum::<f64>() / n;
    let avg_latency = candidates.iter().map(|m| m.profile.avg_latency_ms).sum::<f64>() / n;
    let avg_cost = candidates.iter().map(|m| m.profile.cost_per_1k_usd).sum::<f64>() / n;

    let mut reasons = Vec::new();
    if chosen.trust_score > avg_trust {
        reasons.push(format!("High trust score ({:.1}/100)", chosen.trust_score));
    }
    if chosen.profile.avg_latency_ms < avg_latency {
        reasons.push(format!("Low latency ({}ms)", chosen.profile.avg_latency_ms));
    }
    if chosen.profile.cost_per_1k_usd < avg_cost {
        reasons.push(format!("Cost-effective (${:.4}/1K)", chosen.profile.cost_per_1k_usd));
    }
    let declared: Vec<&str> = chosen.capability_ranks.declared().map(|c| c.as_str()).collect();
    if declared.len() > 2 {
        reasons.push(format!("Multi-capable ({})", declared[..3].join(", ")));
    }

    if reasons.is_empty() {
        "Selected based on overall metrics".to_string()
    } else {
        reasons.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelRegistration;

    fn registration(name: &str, rank: i64, cost: f64, latency: f64, stake: f64) -> ModelRegistration {
        ModelRegistration {
            name: name.to_string(),
            capability_ranks: [("math".to_string(), rank)].into_iter().collect(),
            max_tokens: 8192,
            avg_latency_ms: latency,
            cost_per_1k_usd: cost,
            stake,
        }
    }

    async fn engine() -> (Arc<ModelRegistry>, RoutingEngine) {
        let registry = Arc::new(ModelRegistry::default());
        let engine = RoutingEngine::new(
            registry.clone(),
            Arc::new(DecisionLog::new()),
            RoutingParameters::default(),
        );
        (registry, engine)
    }

    #[test]
    fn test_default_parameters_are_valid() {
        assert!(RoutingParameters::default().validate().is_ok());
    }

    #[test]
    fn test_weights_that_break_trust_dominance_are_rejected() {
        let params = RoutingParameters {
            cost_weight: 4.0,
            latency_weight: 2.0,
            ..RoutingParameters::default()
        };
        assert_eq!(params.validate().unwrap_err().kind(), "ValidationError");
    }

    #[test]
    fn test_ranking_tie_break() {
        let base = CandidateScore {
            model_id: "b".to_string(),
            trust_score: 50.0,
            cost_score: 1.0,
            latency_score: 1.0,
            composite: 54.0,
            stake: 1.0,
            avg_latency_ms: 100.0,
            cost_per_1k_usd: 0.01,
        };
        let higher_stake = CandidateScore {
            model_id: "c".to_string(),
            stake: 2.0,
            ..base.clone()
        };
        let lower_id = CandidateScore {
            model_id: "a".to_string(),
            ..base.clone()
        };

        let mut scores = vec![base.clone(), lower_id, higher_stake];
        scores.sort_by(ranking_order);
        let ids: Vec<&str> = scores.iter().map(|s| s.model_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    fn scored_model(id: &str, trust: f64, cost: f64, latency: f64) -> Model {
        let valid = registration(id, 3, cost, latency, 1.0).validate().unwrap();
        let mut model = Model::new(id.to_string(), valid, Utc::now());
        model.is_verified = true;
        model.trust_score = trust;
        model
    }

    fn winner(engine: &RoutingEngine, candidates: &[Model]) -> String {
        engine.rank(candidates)[0].model_id.clone()
    }

    #[tokio::test]
    async fn test_trust_gap_beyond_one_tier_beats_best_cost_and_latency() {
        let (_registry, engine) = engine().await;
        let trusted = scored_model("trusted", 60.0, 0.05, 900.0);
        let bargain = scored_model("bargain", 54.9, 0.0001, 10.0);

        let ranking = engine.rank(&[bargain, trusted]);
        assert_eq!(ranking[0].model_id, "trusted");
        assert_eq!(ranking[1].cost_score, 1.0);
        assert_eq!(ranking[1].latency_score, 1.0);
    }

    #[tokio::test]
    async fn test_trust_gap_within_one_tier_can_be_overturned() {
        let (_registry, engine) = engine().await;
        let trusted = scored_model("trusted", 57.0, 0.05, 900.0);
        let bargain = scored_model("bargain", 54.9, 0.0001, 10.0);
        assert_eq!(winner(&engine, &[trusted, bargain]), "bargain");
    }

    #[tokio::test]
    async fn test_unverified_models_are_not_candidates() {
        let (registry, engine) = engine().await;
        registry
            .register(registration("pending", 5, 0.01, 100.0, 1.0))
            .await
            .unwrap();

        let decision = engine.route("solve x^2 = 4", Some("math")).await.unwrap();
        assert!(!decision.is_routed());
        assert_eq!(decision.failure, Some(RoutingFailure::NoEligibleModel));
        assert_eq!(decision.reason, "NoEligibleModelError");
    }

    #[tokio::test]
    async fn test_undeclared_capability_excluded() {
        let (registry, engine) = engine().await;
        let model = registry
            .register(registration("mathy", 5, 0.01, 100.0, 1.0))
            .await
            .unwrap();
        registry.verify(&model.id).await.unwrap();

        let safety = engine.route("is this safe?", Some("safety")).await.unwrap();
        assert!(safety.chosen.is_none());

        let math = engine.route("integrate x", Some("MATH")).await.unwrap();
        assert_eq!(math.chosen_model_id(), Some(model.id.as_str()));
        assert_eq!(math.estimated_latency_ms, Some(100.0));
    }

    #[tokio::test]
    async fn test_unknown_capability_is_validation_error() {
        let (_registry, engine) = engine().await;
        let err = engine.route("q", Some("poetry")).await.unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert!(engine.recent(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_equal_trust_prefers_cheaper_faster() {
        let (registry, engine) = engine().await;
        let slow = registry
            .register(registration("slow", 5, 0.01, 500.0, 10.0))
            .await
            .unwrap();
        let fast = registry
            .register(registration("fast", 2, 0.001, 100.0, 1.0))
            .await
            .unwrap();
        registry.verify(&slow.id).await.unwrap();
        registry.verify(&fast.id).await.unwrap();

        let decision = engine.route("2+2", None).await.unwrap();
        assert_eq!(decision.chosen_model_id(), Some(fast.id.as_str()));
        assert_eq!(decision.ranking.len(), 2);
        assert!(decision.reason.contains("Low latency"));
    }

    #[tokio::test]
    async fn test_route_is_deterministic() {
        let (registry, engine) = engine().await;
        for name in ["m1", "m2", "m3"] {
            let model = registry
                .register(registration(name, 3, 0.002, 200.0, 1.0))
                .await
                .unwrap();
            registry.verify(&model.id).await.unwrap();
        }

        let first = engine.route("q", Some("math")).await.unwrap();
        for _ in 0..5 {
            let again = engine.route("q", Some("math")).await.unwrap();
            assert_eq!(again.chosen_model_id(), first.chosen_model_id());
        }
    }

    #[tokio::test]
    async fn test_stats_counts_window() {
        let (registry, engine) = engine().await;
        let model = registry
            .register(registration("m", 3, 0.002, 200.0, 1.0))
            .await
            .unwrap();
        registry.verify(&model.id).await.unwrap();

        let now = Utc::now();
        engine.route_at("old", None, now - Duration::hours(30)).await.unwrap();
        engine.route_at("new", None, now).await.unwrap();
        engine.route_at("fail", Some("code"), now).await.unwrap();

        let stats = engine.stats_at(24, now).await.unwrap();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.routed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.unique_models, 1);
        assert_eq!(stats.top_models[0].requests, 1);
        assert!(engine.stats(0).await.is_err());
    }

    #[tokio::test]
    async fn test_stats_rejects_unrepresentable_window() {
        let (_registry, engine) = engine().await;
        for hours in [9_000_000_000_000_000, i64::MAX, 3_000_000_000] {
            let err = engine.stats(hours).await.unwrap_err();
            assert_eq!(err.kind(), "ValidationError");
        }
        assert!(engine.stats(24 * 365 * 100).await.is_ok());
    }
}
