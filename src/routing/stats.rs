use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::routing::RoutingDecision;

const TOP_MODELS: usize = 5;

/// Per-model request count within a stats window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopModel {
    pub model_id: String,
    pub model_name: String,
    pub requests: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingStats {
    pub window_hours: i64,
    pub total_requests: u64,
    pub routed: u64,
    pub failed: u64,
    pub unique_models: usize,
    pub top_models: Vec<TopModel>,
}

impl RoutingStats {
    pub fn from_decisions(window_hours: i64, decisions: &[RoutingDecision]) -> Self {
        let mut counts: HashMap<&str, TopModel> = HashMap::new();
        let mut failed = 0;

        for decision in decisions {
            match &decision.chosen {
                Some(chosen) => {
                    counts
                        .entry(chosen.model_id.as_str())
                        .or_insert_with(|| TopModel {
                            model_id: chosen.model_id.clone(),
                            model_name: chosen.model_name.clone(),
                            requests: 0,
                        })
                        .requests += 1;
                }
                None => failed += 1,
            }
        }

        let unique_models = counts.len();
        let mut top_models: Vec<TopModel> = counts.into_values().collect();
        top_models.sort_by(|a, b| {
            b.requests
                .cmp(&a.requests)
                .then_with(|| a.model_id.cmp(&b.model_id))
        });
        top_models.truncate(TOP_MODELS);

        let total_requests = decisions.len() as u64;
        Self {
            window_hours,
            total_requests,
            routed: total_requests - failed,
            failed,
            unique_models,
            top_models,
        }
    }
}
