use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::reputation::TrustParameters;
use crate::routing::RoutingParameters;

const ENV_PREFIX: &str = "MODELCHAIN_";

/// Configuration for the trust routing engine and its HTTP server
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Request limits
    pub security: SecurityConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Trust score formula tunables
    pub trust: TrustParameters,
    /// Composite ranking weights and eligibility thresholds
    pub routing: RoutingParameters,
    /// Audit ledger configuration
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
    /// Allow cross-origin requests from browser clients
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            enable_cors: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Rate limit per minute per IP (0 disables)
    pub rate_limit_per_minute: u32,
    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: 600,
            max_request_size: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Mask client addresses and secrets in logs
    pub sanitize_logs: bool,
    /// Log every request
    pub log_requests: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            sanitize_logs: true,
            log_requests: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// External ledger URL; empty selects the in-memory ledger
    pub url: String,
    /// API key sent as `X-Api-Key`
    pub api_key: String,
    /// Deadline for one commitment submission
    pub timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            timeout_secs: 10,
        }
    }
}

impl LedgerConfig {
    pub fn is_external(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

impl EngineConfig {
    /// Load configuration from `MODELCHAIN_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source, then validate
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let vars = Vars { lookup: &lookup };

        // Server
        vars.string("HOST", &mut config.server.host);
        vars.parse("PORT", &mut config.server.port)?;
        vars.parse("ENABLE_CORS", &mut config.server.enable_cors)?;

        // Limits
        vars.parse("RATE_LIMIT_PER_MINUTE", &mut config.security.rate_limit_per_minute)?;
        vars.parse("MAX_REQUEST_SIZE", &mut config.security.max_request_size)?;

        // Logging
        vars.string("LOG_LEVEL", &mut config.logging.level);
        vars.parse("SANITIZE_LOGS", &mut config.logging.sanitize_logs)?;
        vars.parse("LOG_REQUESTS", &mut config.logging.log_requests)?;

        // Trust formula
        vars.parse("VIOLATION_PENALTY", &mut config.trust.violation_penalty)?;
        vars.parse("USAGE_SATURATION", &mut config.trust.usage_saturation)?;
        vars.parse("USAGE_WINDOW_HOURS", &mut config.trust.usage_window_hours)?;
        vars.parse("MATURITY_DAYS", &mut config.trust.maturity_days)?;
        vars.parse("PERFORMANCE_WINDOW", &mut config.trust.performance_window)?;

        // Routing
        vars.parse("TRUST_WEIGHT", &mut config.routing.trust_weight)?;
        vars.parse("COST_WEIGHT", &mut config.routing.cost_weight)?;
        vars.parse("LATENCY_WEIGHT", &mut config.routing.latency_weight)?;
        vars.parse("TIER_WIDTH", &mut config.routing.tier_width)?;
        vars.parse("MIN_STAKE", &mut config.routing.min_stake)?;
        vars.parse("MIN_CAPABILITY_RANK", &mut config.routing.min_capability_rank)?;

        // Ledger
        vars.string("LEDGER_URL", &mut config.ledger.url);
        vars.string("LEDGER_API_KEY", &mut config.ledger.api_key);
        vars.parse("LEDGER_TIMEOUT_SECS", &mut config.ledger.timeout_secs)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(anyhow::anyhow!("Server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port must be non-zero"));
        }

        if self.security.max_request_size == 0 {
            return Err(anyhow::anyhow!("Maximum request size must be non-zero"));
        }

        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "error" | "warn" | "info" | "debug" | "trace"
        ) {
            return Err(anyhow::anyhow!("Unknown log level: {}", self.logging.level));
        }

        if !self.trust.violation_penalty.is_finite() || self.trust.violation_penalty < 0.0 {
            return Err(anyhow::anyhow!("Violation penalty must be a non-negative number"));
        }

        if self.trust.usage_window_hours <= 0 {
            return Err(anyhow::anyhow!("Usage window must be at least one hour"));
        }

        if !self.trust.maturity_days.is_finite() || self.trust.maturity_days <= 0.0 {
            return Err(anyhow::anyhow!("Maturity period must be positive"));
        }

        if self.trust.performance_window == 0 {
            return Err(anyhow::anyhow!("Performance window must hold at least one record"));
        }

        self.routing
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid routing weights: {}", e))?;

        if self.ledger.is_external()
            && !(self.ledger.url.starts_with("https://") || self.ledger.url.starts_with("http://"))
        {
            return Err(anyhow::anyhow!(
                "Ledger URL must be http(s): {}",
                self.ledger.url
            ));
        }

        if self.ledger.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Ledger timeout must be non-zero"));
        }

        Ok(())
    }
}

struct Vars<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Vars<'_, F> {
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(&format!("{}{}", ENV_PREFIX, name))
    }

    fn string(&self, name: &str, target: &mut String) {
        if let Some(value) = self.get(name) {
            *target = value;
        }
    }

    fn parse<T>(&self, name: &str, target: &mut T) -> Result<()>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        if let Some(value) = self.get(name) {
            *target = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}{} value", ENV_PREFIX, name))?;
        }
        Ok(())
    }
}

/// Mask secrets for logging, keeping a short prefix for identification
pub fn sanitize_for_logging(data: &str) -> String {
    let chars: Vec<char> = data.chars().collect();
    match chars.len() {
        0 => "<unset>".to_string(),
        n if n <= 8 => "***".to_string(),
        n => format!(
            "{}***{}",
            chars[..4].iter().collect::<String>(),
            chars[n - 2..].iter().collect::<String>()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_sanitize_for_logging() {
        assert_eq!(sanitize_for_logging(""), "<unset>");
        assert_eq!(sanitize_for_logging("short"), "***");
        assert_eq!(sanitize_for_logging("ledgerApiKey1234567"), "ledg***67");
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.ledger.is_external());
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("MODELCHAIN_PORT", "9100"),
            ("MODELCHAIN_COST_WEIGHT", "1.5"),
            ("MODELCHAIN_MIN_STAKE", "0.5"),
            ("MODELCHAIN_LEDGER_URL", "https://ledger.example.com"),
        ]))
        .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.routing.cost_weight, 1.5);
        assert_eq!(config.routing.min_stake, 0.5);
        assert!(config.ledger.is_external());
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(EngineConfig::from_lookup(lookup(&[("MODELCHAIN_PORT", "eighty")])).is_err());
        assert!(EngineConfig::from_lookup(lookup(&[("MODELCHAIN_LOG_LEVEL", "loud")])).is_err());
        assert!(
            EngineConfig::from_lookup(lookup(&[("MODELCHAIN_LEDGER_URL", "ftp://ledger")])).is_err()
        );
        // Cost and latency together would outweigh a trust tier
        assert!(EngineConfig::from_lookup(lookup(&[("MODELCHAIN_LATENCY_WEIGHT", "3.5")])).is_err());
    }
}
