//! Ledger clients
//!
//! The committer only needs a receipt for an accepted commitment. Two
//! implementations are provided:
//! - `InMemoryLedger` - local append-only ledger, used when no URL is configured
//! - `HttpLedgerClient` - posts commitments to an external ledger service

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::audit::merkle::sha256;
use crate::routing::TopModel;

/// What gets written to the ledger for one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerCommitment {
    pub period: String,
    pub merkle_root: String,
    pub total_requests: u64,
    pub top_models: Vec<TopModel>,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error("ledger rejected commitment: {0}")]
    Rejected(String),

    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit(&self, commitment: &LedgerCommitment) -> Result<LedgerReceipt, LedgerError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Local append-only ledger
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    entries: RwLock<Vec<(LedgerCommitment, LedgerReceipt)>>,
    failing: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent submission fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn entries(&self) -> Vec<(LedgerCommitment, LedgerReceipt)> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn submit(&self, commitment: &LedgerCommitment) -> Result<LedgerReceipt, LedgerError> {
        if self.failing.load(Ordering::SeqCst) {
            warn!(period = %commitment.period, "In-memory ledger set to fail");
            return Err(LedgerError::Unavailable("in-memory ledger offline".to_string()));
        }

        let encoded = serde_json::to_vec(commitment)
            .map_err(|e| LedgerError::Rejected(e.to_string()))?;

        let mut entries = self.entries.write().await;
        let block_number = entries.len() as u64 + 1;
        let receipt = LedgerReceipt {
            tx_hash: format!("0x{}", hex::encode(sha256(&encoded))),
            block_number,
            recorded_at: Utc::now(),
        };
        entries.push((commitment.clone(), receipt.clone()));

        debug!(
            period = %commitment.period,
            tx_hash = %receipt.tx_hash,
            block = block_number,
            "Appended commitment to in-memory ledger"
        );
        Ok(receipt)
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpLedgerConfig {
    pub url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

/// External ledger over HTTP: `POST {url}/commitments`
#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    config: HttpLedgerConfig,
    http_client: Client,
}

impl HttpLedgerClient {
    pub fn new(config: HttpLedgerConfig) -> Result<Self, LedgerError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("ModelChain-Engine/1.0")
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                if !config.api_key.is_empty() {
                    if let Ok(val) = reqwest::header::HeaderValue::from_str(&config.api_key) {
                        headers.insert("X-Api-Key", val);
                    }
                }
                headers
            })
            .build()
            .map_err(|e| LedgerError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn submit(&self, commitment: &LedgerCommitment) -> Result<LedgerReceipt, LedgerError> {
        let url = format!("{}/commitments", self.config.url.trim_end_matches('/'));

        info!(period = %commitment.period, root = %commitment.merkle_root, "Submitting commitment");

        let resp = self
            .http_client
            .post(&url)
            .json(commitment)
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(LedgerError::Unavailable(format!("status {}", status)));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Rejected(format!("status {}: {}", status, body)));
        }

        let receipt: LedgerReceipt = resp
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(e.to_string()))?;

        if receipt.tx_hash.is_empty() {
            return Err(LedgerError::InvalidResponse("empty tx_hash".to_string()));
        }

        Ok(receipt)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commitment(period: &str) -> LedgerCommitment {
        LedgerCommitment {
            period: period.to_string(),
            merkle_root: hex::encode(sha256(b"")),
            total_requests: 0,
            top_models: vec![],
            committed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_ledger_appends() {
        let ledger = InMemoryLedger::new();
        let first = ledger.submit(&commitment("2024-01-01")).await.unwrap();
        let second = ledger.submit(&commitment("2024-01-02")).await.unwrap();

        assert!(first.tx_hash.starts_with("0x"));
        assert_eq!(first.tx_hash.len(), 66);
        assert_eq!(first.block_number, 1);
        assert_eq!(second.block_number, 2);
        assert_ne!(first.tx_hash, second.tx_hash);
        assert_eq!(ledger.len().await, 2);
    }

    #[tokio::test]
    async fn test_fail_switch() {
        let ledger = InMemoryLedger::new();
        ledger.set_failing(true);
        assert!(matches!(
            ledger.submit(&commitment("2024-01-01")).await,
            Err(LedgerError::Unavailable(_))
        ));
        assert!(ledger.is_empty().await);

        ledger.set_failing(false);
        assert!(ledger.submit(&commitment("2024-01-01")).await.is_ok());
    }

    #[test]
    fn test_http_client_builds() {
        let client = HttpLedgerClient::new(HttpLedgerConfig {
            url: "http://127.0.0.1:9000".to_string(),
            api_key: "secret".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(client.name(), "http");
    }
}
