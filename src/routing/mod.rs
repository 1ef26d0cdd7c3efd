//! Query routing
//!
//! - `engine.rs` - Candidate filtering and composite ranking
//! - `decision.rs` - Immutable decision records
//! - `log.rs` - Append-only decision log read by stats and the committer
//! - `stats.rs` - Windowed routing statistics

mod decision;
mod engine;
mod log;
mod stats;

pub use decision::{CandidateScore, ChosenModel, RoutingDecision, RoutingFailure};
pub use engine::{RoutingEngine, RoutingParameters};
pub use log::DecisionLog;
pub use stats::{RoutingStats, TopModel};
