//! Performance and violation records
//!
//! Both record kinds are append-only. Reports arrive as request types and are
//! validated before anything is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::reputation::PerformanceSummary;

/// One reporting period's observed behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceReport {
    pub model_id: String,
    pub period: String,
    pub avg_latency_ms: f64,
    pub success_rate: f64,
    pub uptime_percentage: f64,
    #[serde(default)]
    pub violations: u64,
}

impl PerformanceReport {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.period.trim().is_empty() {
            return Err(EngineError::validation("period cannot be empty"));
        }
        if !self.avg_latency_ms.is_finite() || self.avg_latency_ms < 0.0 {
            return Err(EngineError::validation("avg_latency_ms cannot be negative"));
        }
        if !(0.0..=100.0).contains(&self.success_rate) {
            return Err(EngineError::validation(format!(
                "success_rate must be within [0, 100], got {}",
                self.success_rate
            )));
        }
        if !(0.0..=100.0).contains(&self.uptime_percentage) {
            return Err(EngineError::validation(format!(
                "uptime_percentage must be within [0, 100], got {}",
                self.uptime_percentage
            )));
        }
        Ok(())
    }
}

/// Stored performance record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub model_id: String,
    pub period: String,
    pub avg_latency_ms: f64,
    pub success_rate: f64,
    pub uptime_percentage: f64,
    pub violations: u64,
    pub reported_at: DateTime<Utc>,
}

impl PerformanceRecord {
    pub(crate) fn from_report(report: PerformanceReport, reported_at: DateTime<Utc>) -> Self {
        Self {
            model_id: report.model_id,
            period: report.period.trim().to_string(),
            avg_latency_ms: report.avg_latency_ms,
            success_rate: report.success_rate,
            uptime_percentage: report.uptime_percentage,
            violations: report.violations,
            reported_at,
        }
    }
}

/// Average the given records (oldest to newest order is irrelevant)
pub fn summarize(records: &[PerformanceRecord]) -> Option<PerformanceSummary> {
    if records.is_empty() {
        return None;
    }
    let n = records.len() as f64;
    let (latency, success, uptime) = records.iter().fold((0.0, 0.0, 0.0), |acc, r| {
        (
            acc.0 + r.avg_latency_ms,
            acc.1 + r.success_rate,
            acc.2 + r.uptime_percentage,
        )
    });
    Some(PerformanceSummary {
        avg_latency_ms: latency / n,
        success_rate: success / n,
        uptime_percentage: uptime / n,
        samples: records.len(),
    })
}

/// Violation severity as reported by operators or monitors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationSeverity {
    #[serde(alias = "LOW", alias = "Low")]
    Low,
    #[serde(alias = "MEDIUM", alias = "Medium")]
    Medium,
    #[serde(alias = "HIGH", alias = "High")]
    High,
}

/// A reported breach
#[derive(Debug, Clone, Deserialize)]
pub struct ViolationReport {
    pub model_id: String,
    #[serde(alias = "issue")]
    pub category: String,
    pub severity: ViolationSeverity,
    /// Stake removed from the model as a penalty
    #[serde(alias = "slash_amount_eth", default)]
    pub slash_amount: f64,
}

impl ViolationReport {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.category.trim().is_empty() {
            return Err(EngineError::validation("violation category cannot be empty"));
        }
        if !self.slash_amount.is_finite() || self.slash_amount < 0.0 {
            return Err(EngineError::validation("slash_amount cannot be negative"));
        }
        Ok(())
    }
}

/// Stored violation record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub id: String,
    pub model_id: String,
    pub category: String,
    pub severity: ViolationSeverity,
    /// Stake actually removed, which may be less than requested
    pub slashed: f64,
    pub reported_at: DateTime<Utc>,
}
