//! Model Registry
//!
//! Owns the lifecycle of model records: registration, verification, lookup
//! and ordered listing. Trust scores are cached on the record but written
//! only by the reputation tracker.

mod model;
mod store;

pub use model::{Capability, CapabilityRanks, Model, ModelRegistration, OperatingProfile};
pub use store::{registry_order, ModelEntry, ModelFilter, ModelRegistry};
