//! Model Registry
//!
//! Each model lives behind its own lock so that a trust recomputation is
//! atomic for that model while other models stay independently accessible.
//! Listing takes a brief per-model read of every entry.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::registry::{Capability, Model, ModelRegistration};
use crate::reputation::{TrustBreakdown, TrustCalculator, TrustInputs};

/// A model record together with the statistics its trust score came from
#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub model: Model,
    pub inputs: TrustInputs,
}

impl ModelEntry {
    /// Reduce stake by `amount`, never below zero. Returns the amount removed.
    pub(crate) fn slash_stake(&mut self, amount: f64) -> f64 {
        let removed = amount.min(self.model.stake).max(0.0);
        self.model.stake -= removed;
        removed
    }
}

/// Optional listing filter
#[derive(Debug, Clone, Default)]
pub struct ModelFilter {
    pub verified: Option<bool>,
    pub min_rank: Option<(Capability, u32)>,
}

impl ModelFilter {
    pub fn verified() -> Self {
        Self {
            verified: Some(true),
            min_rank: None,
        }
    }

    fn matches(&self, model: &Model) -> bool {
        if let Some(verified) = self.verified {
            if model.is_verified != verified {
                return false;
            }
        }
        if let Some((capability, min_rank)) = self.min_rank {
            if !model.meets_rank(capability, min_rank) {
                return false;
            }
        }
        true
    }
}

/// Listing order: trust descending, earlier registration, then id
pub fn registry_order(a: &Model, b: &Model) -> Ordering {
    b.trust_score
        .total_cmp(&a.trust_score)
        .then_with(|| a.registration_time.cmp(&b.registration_time))
        .then_with(|| a.id.cmp(&b.id))
}

pub struct ModelRegistry {
    models: DashMap<String, Arc<RwLock<ModelEntry>>>,
    calculator: TrustCalculator,
}

impl ModelRegistry {
    pub fn new(calculator: TrustCalculator) -> Self {
        Self {
            models: DashMap::new(),
            calculator,
        }
    }

    /// Register a new, unverified model
    pub async fn register(&self, registration: ModelRegistration) -> Result<Model> {
        self.register_at(registration, Utc::now()).await
    }

    pub async fn register_at(
        &self,
        registration: ModelRegistration,
        now: DateTime<Utc>,
    ) -> Result<Model> {
        let valid = registration.validate()?;
        let id = format!("model_{}", uuid::Uuid::new_v4().simple());

        let inputs = TrustInputs::unobserved(valid.profile.avg_latency_ms, now);
        let mut model = Model::new(id.clone(), valid, now);
        model.trust_score = self.calculator.score(&inputs).trust_score;

        self.models.insert(
            id.clone(),
            Arc::new(RwLock::new(ModelEntry {
                model: model.clone(),
                inputs,
            })),
        );

        info!(
            model_id = %id,
            name = %model.name,
            stake = model.stake,
            "Registered model"
        );

        Ok(model)
    }

    /// Mark a model verified. Verifying twice is a no-op.
    pub async fn verify(&self, model_id: &str) -> Result<Model> {
        let entry = self.entry(model_id)?;
        let mut guard = entry.write().await;

        if guard.model.is_verified {
            debug!(model_id = %model_id, "Model already verified");
        } else {
            guard.model.is_verified = true;
            guard.model.verified_at = Some(Utc::now());
            info!(model_id = %model_id, "Verified model");
        }

        Ok(guard.model.clone())
    }

    pub async fn get(&self, model_id: &str) -> Result<Model> {
        let entry = self.entry(model_id)?;
        let guard = entry.read().await;
        Ok(guard.model.clone())
    }

    /// Models matching `filter`, in registry order
    pub async fn list(&self, filter: &ModelFilter) -> Vec<Model> {
        let mut models: Vec<Model> = self
            .snapshot()
            .await
            .into_iter()
            .filter(|m| filter.matches(m))
            .collect();
        models.sort_by(registry_order);
        models
    }

    /// Unordered copy of every model, each read under its own lock
    pub async fn snapshot(&self) -> Vec<Model> {
        let entries: Vec<Arc<RwLock<ModelEntry>>> =
            self.models.iter().map(|e| e.value().clone()).collect();

        let mut models = Vec::with_capacity(entries.len());
        for entry in entries {
            models.push(entry.read().await.model.clone());
        }
        models
    }

    /// Recompute the four trust components from the stored inputs
    pub async fn trust_breakdown(&self, model_id: &str) -> Result<TrustBreakdown> {
        let entry = self.entry(model_id)?;
        let guard = entry.read().await;
        Ok(self.calculator.score(&guard.inputs))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.models.contains_key(model_id)
    }

    /// Lock handle for a single model. Writers outside the registry are
    /// limited to the reputation tracker.
    pub(crate) fn entry(&self, model_id: &str) -> Result<Arc<RwLock<ModelEntry>>> {
        self.models
            .get(model_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| EngineError::model_not_found(model_id))
    }

    pub(crate) fn calculator(&self) -> &TrustCalculator {
        &self.calculator
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(TrustCalculator::default())
    }
}
