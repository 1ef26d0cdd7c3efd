//! Append-only store of routing decisions
//!
//! Route calls hold the write lock only long enough to push. Readers clone
//! what they need so nothing downstream (ledger submission in particular)
//! runs while the log is locked.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::routing::RoutingDecision;

#[derive(Debug, Default)]
pub struct DecisionLog {
    decisions: RwLock<Vec<RoutingDecision>>,
}

impl DecisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, decision: RoutingDecision) {
        self.decisions.write().await.push(decision);
    }

    /// Decisions with `start <= timestamp < end`, ordered by timestamp then id
    pub async fn in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<RoutingDecision> {
        let mut selected: Vec<RoutingDecision> = {
            let decisions = self.decisions.read().await;
            decisions
                .iter()
                .filter(|d| d.timestamp >= start && d.timestamp < end)
                .cloned()
                .collect()
        };
        selected.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        selected
    }

    pub async fn since(&self, cutoff: DateTime<Utc>) -> Vec<RoutingDecision> {
        let decisions = self.decisions.read().await;
        decisions
            .iter()
            .filter(|d| d.timestamp > cutoff)
            .cloned()
            .collect()
    }

    /// Number of decisions that chose `model_id` after `cutoff`
    pub async fn count_chosen_since(&self, model_id: &str, cutoff: DateTime<Utc>) -> u64 {
        let decisions = self.decisions.read().await;
        decisions
            .iter()
            .filter(|d| d.timestamp > cutoff && d.chosen_model_id() == Some(model_id))
            .count() as u64
    }

    /// Most recent `limit` decisions, newest first
    pub async fn recent(&self, limit: usize) -> Vec<RoutingDecision> {
        let decisions = self.decisions.read().await;
        decisions.iter().rev().take(limit).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.decisions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.decisions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::ChosenModel;
    use chrono::{Duration, TimeZone};

    fn decision(id: &str, model: Option<&str>, timestamp: DateTime<Utc>) -> RoutingDecision {
        RoutingDecision {
            id: id.to_string(),
            query: "q".to_string(),
            required_capability: None,
            chosen: model.map(|m| ChosenModel {
                model_id: m.to_string(),
                model_name: m.to_string(),
                trust_score: 0.0,
            }),
            estimated_latency_ms: None,
            cost_per_1k_usd: None,
            ranking: vec![],
            reason: String::new(),
            failure: None,
            timestamp,
        }
    }

    #[tokio::test]
    async fn test_range_is_half_open_and_ordered() {
        let log = DecisionLog::new();
        let day = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let next_day = day + Duration::days(1);

        log.append(decision("b", Some("m1"), day + Duration::hours(2))).await;
        log.append(decision("a", Some("m1"), day + Duration::hours(2))).await;
        log.append(decision("c", None, day)).await;
        log.append(decision("d", Some("m2"), next_day)).await;

        let ids: Vec<String> = log
            .in_range(day, next_day)
            .await
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_count_and_recent() {
        let log = DecisionLog::new();
        let now = Utc::now();
        log.append(decision("1", Some("m1"), now - Duration::hours(30))).await;
        log.append(decision("2", Some("m1"), now - Duration::hours(1))).await;
        log.append(decision("3", Some("m2"), now)).await;

        assert_eq!(log.count_chosen_since("m1", now - Duration::hours(24)).await, 1);
        assert_eq!(log.recent(2).await[0].id, "3");
        assert_eq!(log.len().await, 3);
    }
}
