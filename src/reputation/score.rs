//! Trust Score Calculation
//!
//! The trust score is a cache over a model's statistics. It is always
//! recomputable from the [`TrustInputs`] captured at the last ingest.
//!
//! | Component   | Weight | Raw value (0-100)                                  |
//! |-------------|--------|----------------------------------------------------|
//! | performance | 0.4    | success rate x latency factor x uptime             |
//! | reliability | 0.3    | 100 minus a fixed penalty per violation            |
//! | usage       | 0.2    | requests served in window, saturating              |
//! | age         | 0.1    | days since registration, saturating at maturity    |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PERFORMANCE_WEIGHT: f64 = 0.4;
pub const RELIABILITY_WEIGHT: f64 = 0.3;
pub const USAGE_WEIGHT: f64 = 0.2;
pub const AGE_WEIGHT: f64 = 0.1;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Tunables for the component formulas. Component weights are fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustParameters {
    /// Reliability points removed per recorded violation
    pub violation_penalty: f64,
    /// Requests served within the usage window at which usage saturates
    pub usage_saturation: u64,
    /// Trailing window used to count requests served
    pub usage_window_hours: i64,
    /// Age at which the age component reaches its maximum
    pub maturity_days: f64,
    /// Number of most recent performance records averaged
    pub performance_window: usize,
}

impl Default for TrustParameters {
    fn default() -> Self {
        Self {
            violation_penalty: 10.0,
            usage_saturation: 100,
            usage_window_hours: 24,
            maturity_days: 30.0,
            performance_window: 10,
        }
    }
}

/// Averaged view of the most recent performance records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub avg_latency_ms: f64,
    pub success_rate: f64,
    pub uptime_percentage: f64,
    pub samples: usize,
}

/// Everything the calculator needs, captured at ingest time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustInputs {
    pub declared_latency_ms: f64,
    pub recent: Option<PerformanceSummary>,
    pub violation_count: u64,
    pub requests_served: u64,
    pub registered_at: DateTime<Utc>,
    pub evaluated_at: DateTime<Utc>,
}

impl TrustInputs {
    /// Inputs for a freshly registered model with no statistics
    pub fn unobserved(declared_latency_ms: f64, registered_at: DateTime<Utc>) -> Self {
        Self {
            declared_latency_ms,
            recent: None,
            violation_count: 0,
            requests_served: 0,
            registered_at,
            evaluated_at: registered_at,
        }
    }

    /// No performance report has been ingested yet. Violations alone never
    /// lift a model off the zero baseline.
    pub fn is_unobserved(&self) -> bool {
        self.recent.is_none()
    }
}

/// The four raw components (each 0-100) and the weighted score
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrustBreakdown {
    pub performance: f64,
    pub reliability: f64,
    pub usage: f64,
    pub age: f64,
    pub trust_score: f64,
}

/// Pure trust score function over [`TrustInputs`]
#[derive(Debug, Clone, Default)]
pub struct TrustCalculator {
    params: TrustParameters,
}

impl TrustCalculator {
    pub fn new(params: TrustParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrustParameters {
        &self.params
    }

    pub fn score(&self, inputs: &TrustInputs) -> TrustBreakdown {
        // Zero until the first performance report arrives
        if inputs.is_unobserved() {
            return TrustBreakdown::default();
        }

        let performance = self.performance(inputs);
        let reliability = self.reliability(inputs);
        let usage = self.usage(inputs);
        let age = self.age(inputs);

        let weighted = PERFORMANCE_WEIGHT * performance
            + RELIABILITY_WEIGHT * reliability
            + USAGE_WEIGHT * usage
            + AGE_WEIGHT * age;

        TrustBreakdown {
            performance,
            reliability,
            usage,
            age,
            trust_score: weighted.clamp(0.0, 100.0),
        }
    }

    fn performance(&self, inputs: &TrustInputs) -> f64 {
        let Some(recent) = &inputs.recent else {
            return 0.0;
        };

        let latency_factor = if recent.avg_latency_ms <= 0.0 {
            1.0
        } else {
            (inputs.declared_latency_ms / recent.avg_latency_ms).min(1.0)
        };

        let success = recent.success_rate.clamp(0.0, 100.0);
        let uptime = recent.uptime_percentage.clamp(0.0, 100.0) / 100.0;
        (success * latency_factor * uptime).clamp(0.0, 100.0)
    }

    fn reliability(&self, inputs: &TrustInputs) -> f64 {
        let penalty = self.params.violation_penalty * inputs.violation_count as f64;
        (100.0 - penalty).clamp(0.0, 100.0)
    }

    fn usage(&self, inputs: &TrustInputs) -> f64 {
        if self.params.usage_saturation == 0 {
            return 100.0;
        }
        let ratio = inputs.requests_served as f64 / self.params.usage_saturation as f64;
        (ratio * 100.0).min(100.0)
    }

    fn age(&self, inputs: &TrustInputs) -> f64 {
        let elapsed_ms = (inputs.evaluated_at - inputs.registered_at)
            .num_milliseconds()
            .max(0) as f64;
        if self.params.maturity_days <= 0.0 {
            return 100.0;
        }
        let days = elapsed_ms / MILLIS_PER_DAY;
        (days / self.params.maturity_days * 100.0).min(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn observed_inputs() -> TrustInputs {
        let registered_at = Utc::now();
        TrustInputs {
            declared_latency_ms: 500.0,
            recent: Some(PerformanceSummary {
                avg_latency_ms: 500.0,
                success_rate: 100.0,
                uptime_percentage: 100.0,
                samples: 1,
            }),
            violation_count: 0,
            requests_served: 0,
            registered_at,
            evaluated_at: registered_at,
        }
    }

    #[test]
    fn test_unobserved_model_scores_zero() {
        let calc = TrustCalculator::default();
        let inputs = TrustInputs::unobserved(200.0, Utc::now());
        assert_eq!(calc.score(&inputs), TrustBreakdown::default());
    }

    #[test]
    fn test_violations_without_performance_stay_at_zero() {
        let calc = TrustCalculator::default();
        let mut inputs = TrustInputs::unobserved(200.0, Utc::now());
        inputs.violation_count = 3;
        inputs.requests_served = 40;
        inputs.evaluated_at = inputs.registered_at + Duration::days(10);
        assert_eq!(calc.score(&inputs).trust_score, 0.0);
    }

    #[test]
    fn test_weighted_sum() {
        let calc = TrustCalculator::default();
        let mut inputs = observed_inputs();
        inputs.requests_served = 50;

        let breakdown = calc.score(&inputs);
        assert_eq!(breakdown.performance, 100.0);
        assert_eq!(breakdown.reliability, 100.0);
        assert_eq!(breakdown.usage, 50.0);
        assert_eq!(breakdown.age, 0.0);
        assert!((breakdown.trust_score - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_slow_model_loses_performance() {
        let calc = TrustCalculator::default();
        let mut inputs = observed_inputs();
        if let Some(recent) = inputs.recent.as_mut() {
            recent.avg_latency_ms = 1000.0;
        }
        let breakdown = calc.score(&inputs);
        assert!((breakdown.performance - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_violations_reduce_reliability_to_floor() {
        let calc = TrustCalculator::default();
        let mut inputs = observed_inputs();

        inputs.violation_count = 3;
        assert!((calc.score(&inputs).reliability - 70.0).abs() < 1e-9);

        inputs.violation_count = 25;
        assert_eq!(calc.score(&inputs).reliability, 0.0);
    }

    #[test]
    fn test_violation_never_increases_score() {
        let calc = TrustCalculator::default();
        let mut inputs = observed_inputs();
        inputs.requests_served = 30;
        let mut previous = calc.score(&inputs).trust_score;
        for count in 1..15 {
            inputs.violation_count = count;
            let current = calc.score(&inputs).trust_score;
            assert!(current <= previous);
            previous = current;
        }
    }

    #[test]
    fn test_usage_and_age_saturate() {
        let calc = TrustCalculator::default();
        let mut inputs = observed_inputs();
        inputs.requests_served = 10_000;
        inputs.evaluated_at = inputs.registered_at + Duration::days(365);

        let breakdown = calc.score(&inputs);
        assert_eq!(breakdown.usage, 100.0);
        assert_eq!(breakdown.age, 100.0);
        assert!(breakdown.trust_score <= 100.0);
        assert!((breakdown.trust_score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_half_maturity() {
        let calc = TrustCalculator::default();
        let mut inputs = observed_inputs();
        inputs.evaluated_at = inputs.registered_at + Duration::days(15);
        assert!((calc.score(&inputs).age - 50.0).abs() < 1e-9);
    }
}
