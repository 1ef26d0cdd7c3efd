//! Reputation Tracker
//!
//! Ingests performance and violation reports and is the only writer of a
//! model's trust score and violation count. Every ingest recomputes the
//! score under the model's lock, so routing never sees a half-applied update.
//!
//! Lock order is history, then model entry. Nothing else takes both.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::registry::{ModelEntry, ModelRegistry};
use crate::reputation::records::summarize;
use crate::reputation::{
    PerformanceRecord, PerformanceReport, TrustBreakdown, TrustInputs, ViolationRecord,
    ViolationReport,
};
use crate::routing::DecisionLog;

/// Per-model report history
#[derive(Debug, Default)]
struct ModelHistory {
    performance: Vec<PerformanceRecord>,
    violations: Vec<ViolationRecord>,
}

pub struct ReputationTracker {
    registry: Arc<ModelRegistry>,
    decisions: Arc<DecisionLog>,
    histories: DashMap<String, Arc<RwLock<ModelHistory>>>,
}

impl ReputationTracker {
    pub fn new(registry: Arc<ModelRegistry>, decisions: Arc<DecisionLog>) -> Self {
        Self {
            registry,
            decisions,
            histories: DashMap::new(),
        }
    }

    /// Record one period's performance and recompute the trust score
    pub async fn report_performance(&self, report: PerformanceReport) -> Result<TrustBreakdown> {
        self.report_performance_at(report, Utc::now()).await
    }

    pub async fn report_performance_at(
        &self,
        report: PerformanceReport,
        now: DateTime<Utc>,
    ) -> Result<TrustBreakdown> {
        if let Err(e) = report.validate() {
            warn!(model_id = %report.model_id, error = %e, "Rejected performance report");
            return Err(e);
        }
        let model_id = report.model_id.clone();
        let entry = self.registry.entry(&model_id)?;
        let requests_served = self.requests_served(&model_id, now).await;

        let history = self.history(&model_id);
        let mut history = history.write().await;
        let mut entry = entry.write().await;

        let violations = report.violations;
        let violation_count = add_violations(&entry, violations)?;

        history.performance.push(PerformanceRecord::from_report(report, now));
        entry.model.violation_count = violation_count;

        let breakdown = self.recompute(&mut entry, &history, requests_served, now);

        info!(
            model_id = %model_id,
            violations = violations,
            trust_score = breakdown.trust_score,
            "Ingested performance report"
        );

        Ok(breakdown)
    }

    /// Record a single violation, apply any stake slash and recompute
    pub async fn report_violation(&self, report: ViolationReport) -> Result<ViolationRecord> {
        self.report_violation_at(report, Utc::now()).await
    }

    pub async fn report_violation_at(
        &self,
        report: ViolationReport,
        now: DateTime<Utc>,
    ) -> Result<ViolationRecord> {
        report.validate()?;
        let model_id = report.model_id.clone();
        let entry = self.registry.entry(&model_id)?;

        let history = self.history(&model_id);
        let mut history = history.write().await;
        let mut entry = entry.write().await;
        let violation_count = add_violations(&entry, 1)?;

        let slashed = entry.slash_stake(report.slash_amount);
        let record = ViolationRecord {
            id: format!("violation_{}", uuid::Uuid::new_v4().simple()),
            model_id: model_id.clone(),
            category: report.category.trim().to_string(),
            severity: report.severity,
            slashed,
            reported_at: now,
        };
        history.violations.push(record.clone());
        entry.model.violation_count = violation_count;

        let breakdown = self.penalize(&mut entry);

        info!(
            model_id = %model_id,
            category = %record.category,
            severity = ?record.severity,
            slashed = slashed,
            trust_score = breakdown.trust_score,
            "Recorded violation"
        );

        Ok(record)
    }

    /// Most recent `limit` performance records for a model, newest first
    pub async fn performance(&self, model_id: &str, limit: usize) -> Result<Vec<PerformanceRecord>> {
        self.ensure_known(model_id)?;
        let Some(history) = self.existing_history(model_id) else {
            return Ok(Vec::new());
        };
        let history = history.read().await;
        Ok(history.performance.iter().rev().take(limit).cloned().collect())
    }

    /// Most recent `limit` violation records for a model, newest first
    pub async fn violations(&self, model_id: &str, limit: usize) -> Result<Vec<ViolationRecord>> {
        self.ensure_known(model_id)?;
        let Some(history) = self.existing_history(model_id) else {
            return Ok(Vec::new());
        };
        let history = history.read().await;
        Ok(history.violations.iter().rev().take(limit).cloned().collect())
    }

    /// Latest performance records across all models, newest first
    pub async fn recent_performance(&self, limit: usize) -> Vec<PerformanceRecord> {
        let histories: Vec<Arc<RwLock<ModelHistory>>> =
            self.histories.iter().map(|e| e.value().clone()).collect();

        let mut records = Vec::new();
        for history in histories {
            let history = history.read().await;
            records.extend(history.performance.iter().rev().take(limit).cloned());
        }
        records.sort_by(|a, b| b.reported_at.cmp(&a.reported_at));
        records.truncate(limit);
        records
    }

    pub async fn total_violations(&self) -> usize {
        let histories: Vec<Arc<RwLock<ModelHistory>>> =
            self.histories.iter().map(|e| e.value().clone()).collect();

        let mut total = 0;
        for history in histories {
            total += history.read().await.violations.len();
        }
        total
    }

    fn recompute(
        &self,
        entry: &mut ModelEntry,
        history: &ModelHistory,
        requests_served: u64,
        now: DateTime<Utc>,
    ) -> TrustBreakdown {
        let window = self.registry.calculator().params().performance_window.max(1);
        let start = history.performance.len().saturating_sub(window);

        entry.inputs = TrustInputs {
            declared_latency_ms: entry.model.profile.avg_latency_ms,
            recent: summarize(&history.performance[start..]),
            violation_count: entry.model.violation_count,
            requests_served,
            registered_at: entry.model.registration_time,
            evaluated_at: now,
        };

        let breakdown = self.registry.calculator().score(&entry.inputs);
        entry.model.trust_score = breakdown.trust_score;
        debug!(
            model_id = %entry.model.id,
            performance = breakdown.performance,
            reliability = breakdown.reliability,
            usage = breakdown.usage,
            age = breakdown.age,
            "Recomputed trust score"
        );
        breakdown
    }

    /// Rescore after a violation. Only the violation count moves; usage and
    /// age stay at their last evaluation so the score cannot rise.
    fn penalize(&self, entry: &mut ModelEntry) -> TrustBreakdown {
        entry.inputs.violation_count = entry.model.violation_count;
        let breakdown = self.registry.calculator().score(&entry.inputs);
        entry.model.trust_score = breakdown.trust_score;
        breakdown
    }

    async fn requests_served(&self, model_id: &str, now: DateTime<Utc>) -> u64 {
        let hours = self.registry.calculator().params().usage_window_hours;
        let cutoff = Duration::try_hours(hours)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.decisions.count_chosen_since(model_id, cutoff).await
    }

    fn ensure_known(&self, model_id: &str) -> Result<()> {
        if self.registry.contains(model_id) {
            Ok(())
        } else {
            Err(EngineError::model_not_found(model_id))
        }
    }

    fn history(&self, model_id: &str) -> Arc<RwLock<ModelHistory>> {
        self.histories
            .entry(model_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(ModelHistory::default())))
            .value()
            .clone()
    }

    fn existing_history(&self, model_id: &str) -> Option<Arc<RwLock<ModelHistory>>> {
        self.histories.get(model_id).map(|e| e.value().clone())
    }
}

fn add_violations(entry: &ModelEntry, violations: u64) -> Result<u64> {
    entry
        .model
        .violation_count
        .checked_add(violations)
        .ok_or_else(|| {
            EngineError::validation(format!(
                "violation count for model '{}' would overflow",
                entry.model.id
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ModelRegistration;
    use crate::reputation::ViolationSeverity;

    async fn setup() -> (Arc<ModelRegistry>, ReputationTracker, String) {
        let registry = Arc::new(ModelRegistry::default());
        let tracker = ReputationTracker::new(registry.clone(), Arc::new(DecisionLog::new()));
        let model = registry
            .register(ModelRegistration {
                name: "deepseek".to_string(),
                capability_ranks: [("math".to_string(), 3)].into_iter().collect(),
                max_tokens: 4096,
                avg_latency_ms: 400.0,
                cost_per_1k_usd: 0.001,
                stake: 2.0,
            })
            .await
            .unwrap();
        (registry, tracker, model.id)
    }

    fn perf(model_id: &str, success: f64, violations: u64) -> PerformanceReport {
        PerformanceReport {
            model_id: model_id.to_string(),
            period: "2024-01-01".to_string(),
            avg_latency_ms: 400.0,
            success_rate: success,
            uptime_percentage: 100.0,
            violations,
        }
    }

    #[tokio::test]
    async fn test_performance_updates_score_and_violations() {
        let (registry, tracker, id) = setup().await;

        let breakdown = tracker.report_performance(perf(&id, 90.0, 2)).await.unwrap();
        let model = registry.get(&id).await.unwrap();

        assert_eq!(model.violation_count, 2);
        assert_eq!(model.trust_score, breakdown.trust_score);
        assert!((breakdown.performance - 90.0).abs() < 1e-9);
        assert!((breakdown.reliability - 80.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_stored_score_is_recomputable() {
        let (registry, tracker, id) = setup().await;
        tracker.report_performance(perf(&id, 75.0, 0)).await.unwrap();
        tracker
            .report_violation(ViolationReport {
                model_id: id.clone(),
                category: "unsafe".to_string(),
                severity: ViolationSeverity::Medium,
                slash_amount: 0.0,
            })
            .await
            .unwrap();

        let model = registry.get(&id).await.unwrap();
        let recomputed = registry.trust_breakdown(&id).await.unwrap();
        assert_eq!(model.trust_score, recomputed.trust_score);
        assert!((0.0..=100.0).contains(&model.trust_score));
    }

    #[tokio::test]
    async fn test_invalid_report_leaves_state_untouched() {
        let (registry, tracker, id) = setup().await;
        let err = tracker.report_performance(perf(&id, 120.0, 4)).await.unwrap_err();
        assert_eq!(err.kind(), "ValidationError");

        let model = registry.get(&id).await.unwrap();
        assert_eq!(model.violation_count, 0);
        assert!(tracker.performance(&id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_model_rejected() {
        let (_registry, tracker, _id) = setup().await;
        let err = tracker.report_performance(perf("nope", 90.0, 0)).await.unwrap_err();
        assert_eq!(err.kind(), "NotFoundError");
        assert_eq!(tracker.violations("nope", 5).await.unwrap_err().kind(), "NotFoundError");
    }

    #[tokio::test]
    async fn test_violation_slashes_stake() {
        let (registry, tracker, id) = setup().await;
        let record = tracker
            .report_violation(ViolationReport {
                model_id: id.clone(),
                category: "data leak".to_string(),
                severity: ViolationSeverity::High,
                slash_amount: 5.0,
            })
            .await
            .unwrap();

        assert_eq!(record.slashed, 2.0);
        let model = registry.get(&id).await.unwrap();
        assert_eq!(model.stake, 0.0);
        assert_eq!(model.violation_count, 1);
        assert_eq!(tracker.violations(&id, 10).await.unwrap().len(), 1);
        assert_eq!(tracker.total_violations().await, 1);
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let (_registry, tracker, id) = setup().await;
        for success in [60.0, 70.0, 80.0] {
            tracker.report_performance(perf(&id, success, 0)).await.unwrap();
        }
        let records = tracker.performance(&id, 2).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].success_rate, 80.0);
        assert_eq!(records[1].success_rate, 70.0);
        assert_eq!(tracker.recent_performance(10).await.len(), 3);
    }

    fn violation(model_id: &str) -> ViolationReport {
        ViolationReport {
            model_id: model_id.to_string(),
            category: "jailbreak".to_string(),
            severity: ViolationSeverity::Low,
            slash_amount: 0.0,
        }
    }

    #[tokio::test]
    async fn test_violation_on_unobserved_model_keeps_zero() {
        let (registry, tracker, id) = setup().await;
        tracker.report_violation(violation(&id)).await.unwrap();

        let model = registry.get(&id).await.unwrap();
        assert_eq!(model.violation_count, 1);
        assert_eq!(model.trust_score, 0.0);
    }

    #[tokio::test]
    async fn test_violations_never_raise_score() {
        let (registry, tracker, id) = setup().await;
        tracker.report_performance(perf(&id, 95.0, 0)).await.unwrap();

        let mut previous = registry.get(&id).await.unwrap().trust_score;
        for _ in 0..15 {
            tracker.report_violation(violation(&id)).await.unwrap();
            let current = registry.get(&id).await.unwrap().trust_score;
            assert!(current <= previous, "{} rose to {}", previous, current);
            previous = current;
        }
        assert_eq!(registry.trust_breakdown(&id).await.unwrap().trust_score, previous);
    }

    #[tokio::test]
    async fn test_violation_count_overflow_rejected() {
        let (registry, tracker, id) = setup().await;
        tracker.report_performance(perf(&id, 90.0, u64::MAX)).await.unwrap();
        let before = registry.get(&id).await.unwrap();

        let err = tracker.report_performance(perf(&id, 90.0, 1)).await.unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        let err = tracker.report_violation(violation(&id)).await.unwrap_err();
        assert_eq!(err.kind(), "ValidationError");

        let after = registry.get(&id).await.unwrap();
        assert_eq!(after.violation_count, u64::MAX);
        assert_eq!(after.trust_score, before.trust_score);
        assert_eq!(tracker.performance(&id, 10).await.unwrap().len(), 1);
        assert!(tracker.violations(&id, 10).await.unwrap().is_empty());
    }
}
