//! Audit trail for routing decisions
//!
//! Provides:
//! - Period parsing (day and hour windows)
//! - Merkle commitment and inclusion proofs over decision batches
//! - Ledger clients (in-memory and HTTP)
//! - The batch committer tying them together

pub mod committer;
pub mod ledger;
pub mod merkle;
pub mod period;

pub use committer::{Batch, BatchCommitter, InclusionProof};
pub use ledger::{
    HttpLedgerClient, HttpLedgerConfig, InMemoryLedger, LedgerClient, LedgerCommitment,
    LedgerError, LedgerReceipt,
};
pub use merkle::{MerkleProof, MerkleTree};
pub use period::{Period, PeriodSpan};
