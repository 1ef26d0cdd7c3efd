//! ModelChain Trust Routing Engine
//!
//! Routes queries to registered AI models by trust, tracks each model's
//! reputation from performance and violation reports, and commits routing
//! decisions to an append-only ledger in Merkle-rooted batches.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Server entrypoint
//! ├── config.rs      - Configuration management
//! ├── error.rs       - Engine error taxonomy
//! ├── engine.rs      - Facade wiring the components together
//! ├── registry/      - Model records, registration and verification
//! ├── reputation/    - Trust scoring
//! │   ├── score.rs   - Four-component trust calculator
//! │   ├── records.rs - Performance and violation records
//! │   └── tracker.rs - Report ingestion, sole trust writer
//! ├── routing/       - Query routing
//! │   ├── engine.rs  - Candidate filtering and ranking
//! │   ├── log.rs     - Append-only decision log
//! │   └── stats.rs   - Windowed statistics
//! ├── audit/         - Batch commitment
//! │   ├── period.rs  - Day/hour period labels
//! │   ├── merkle.rs  - Merkle roots and inclusion proofs
//! │   ├── ledger.rs  - In-memory and HTTP ledger clients
//! │   └── committer.rs - Per-period batch commit
//! └── api/           - HTTP API endpoints and middleware
//! ```

pub mod api;
pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod reputation;
pub mod routing;

// Re-export main types for convenience
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};

pub use registry::{Capability, Model, ModelFilter, ModelRegistration, ModelRegistry};

pub use reputation::{
    PerformanceReport, ReputationTracker, TrustBreakdown, TrustCalculator, TrustParameters,
    ViolationReport, ViolationSeverity,
};

pub use routing::{RoutingDecision, RoutingEngine, RoutingParameters, RoutingStats};

pub use audit::{
    Batch, BatchCommitter, HttpLedgerClient, InMemoryLedger, InclusionProof, LedgerClient,
    MerkleTree, Period,
};

pub use api::{build_app, AppState};
