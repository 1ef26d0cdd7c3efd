//! Engine facade
//!
//! Wires the registry, tracker, router and committer around one shared
//! decision log. The HTTP layer talks only to this type.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::audit::{BatchCommitter, HttpLedgerClient, HttpLedgerConfig, InMemoryLedger, LedgerClient};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::registry::ModelRegistry;
use crate::reputation::{ReputationTracker, TrustCalculator};
use crate::routing::{DecisionLog, RoutingEngine};

pub struct Engine {
    pub registry: Arc<ModelRegistry>,
    pub tracker: ReputationTracker,
    pub router: RoutingEngine,
    pub committer: BatchCommitter,
    pub decisions: Arc<DecisionLog>,
}

impl Engine {
    pub fn new(config: &EngineConfig, ledger: Arc<dyn LedgerClient>) -> Self {
        let registry = Arc::new(ModelRegistry::new(TrustCalculator::new(config.trust.clone())));
        let decisions = Arc::new(DecisionLog::new());

        Self {
            tracker: ReputationTracker::new(registry.clone(), decisions.clone()),
            router: RoutingEngine::new(registry.clone(), decisions.clone(), config.routing.clone()),
            committer: BatchCommitter::new(
                decisions.clone(),
                ledger,
                Duration::from_secs(config.ledger.timeout_secs),
            ),
            registry,
            decisions,
        }
    }

    /// Build with the ledger selected by configuration
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let ledger: Arc<dyn LedgerClient> = if config.ledger.is_external() {
            let client = HttpLedgerClient::new(HttpLedgerConfig {
                url: config.ledger.url.clone(),
                api_key: config.ledger.api_key.clone(),
                timeout_secs: config.ledger.timeout_secs,
            })
            .map_err(|e| EngineError::ExternalLedger(e.to_string()))?;
            Arc::new(client)
        } else {
            Arc::new(InMemoryLedger::new())
        };

        info!(ledger = ledger.name(), "Engine initialized");
        Ok(Self::new(config, ledger))
    }

    /// Engine with default parameters and an in-memory ledger
    pub fn in_memory() -> Self {
        Self::new(&EngineConfig::default(), Arc::new(InMemoryLedger::new()))
    }
}
