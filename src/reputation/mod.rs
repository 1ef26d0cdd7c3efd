//! Reputation System
//!
//! Turns performance and violation reports into a 0-100 trust score.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐     ┌───────────────────┐     ┌─────────────────┐
//! │ PerformanceReport │────►│ ReputationTracker │◄────│ ViolationReport │
//! └───────────────────┘     │ (sole writer of   │     └─────────────────┘
//!                           │  trust_score)     │
//!                           └─────────┬─────────┘
//!                                     │ TrustInputs
//!                                     ▼
//!                           ┌───────────────────┐
//!                           │ TrustCalculator   │
//!                           │ 40/30/20/10       │
//!                           └───────────────────┘
//! ```
//!
//! ## Score Model
//!
//! - New models score 0 until something is observed
//! - Violations permanently reduce the reliability component
//! - Usage counts routing decisions in a trailing window
//! - Age saturates after the maturity period

mod records;
mod score;
mod tracker;

pub use records::{
    summarize, PerformanceRecord, PerformanceReport, ViolationRecord, ViolationReport,
    ViolationSeverity,
};
pub use score::{
    PerformanceSummary, TrustBreakdown, TrustCalculator, TrustInputs, TrustParameters,
    AGE_WEIGHT, PERFORMANCE_WEIGHT, RELIABILITY_WEIGHT, USAGE_WEIGHT,
};
pub use tracker::ReputationTracker;
