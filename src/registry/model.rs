//! Model records and registration input
//!
//! Capability ranks are declared by the operator and never adjusted by the
//! engine. Higher rank means a stronger model for that skill.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, Result};

/// Skill dimensions a model can declare a rank for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Math,
    Code,
    /// Instruction following. Older clients send `if_rank`.
    #[serde(rename = "if", alias = "if_rank", alias = "instruction_following")]
    InstructionFollowing,
    Expert,
    Safety,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::Math,
        Capability::Code,
        Capability::InstructionFollowing,
        Capability::Expert,
        Capability::Safety,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Math => "math",
            Capability::Code => "code",
            Capability::InstructionFollowing => "if",
            Capability::Expert => "expert",
            Capability::Safety => "safety",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "math" => Ok(Capability::Math),
            "code" => Ok(Capability::Code),
            "if" | "if_rank" | "instruction_following" | "instruction-following" => {
                Ok(Capability::InstructionFollowing)
            }
            "expert" => Ok(Capability::Expert),
            "safety" => Ok(Capability::Safety),
            other => Err(EngineError::validation(format!(
                "unknown capability '{}' (expected one of math, code, if, expert, safety)",
                other
            ))),
        }
    }
}

/// Declared capability ranks. Capabilities that were never declared are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityRanks(BTreeMap<Capability, u32>);

impl CapabilityRanks {
    /// Parse raw `name -> rank` pairs as sent by clients.
    ///
    /// Every rank must be a positive integer and every name a known capability.
    pub fn parse(raw: &BTreeMap<String, i64>) -> Result<Self> {
        let mut ranks = BTreeMap::new();
        for (name, rank) in raw {
            let capability: Capability = name.parse()?;
            if *rank < 1 || *rank > u32::MAX as i64 {
                return Err(EngineError::validation(format!(
                    "capability rank for '{}' must be a positive integer, got {}",
                    capability, rank
                )));
            }
            if ranks.insert(capability, *rank as u32).is_some() {
                return Err(EngineError::validation(format!(
                    "capability '{}' declared more than once",
                    capability
                )));
            }
        }
        Ok(Self(ranks))
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Capability, u32)>) -> Self {
        Self(pairs.into_iter().filter(|(_, rank)| *rank > 0).collect())
    }

    pub fn rank(&self, capability: Capability) -> Option<u32> {
        self.0.get(&capability).copied()
    }

    pub fn declared(&self) -> impl Iterator<Item = Capability> + '_ {
        self.0.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Declared operating characteristics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingProfile {
    pub max_tokens: u64,
    pub avg_latency_ms: f64,
    pub cost_per_1k_usd: f64,
}

/// Registration request as received from clients
#[derive(Debug, Clone, Deserialize)]
pub struct ModelRegistration {
    pub name: String,
    pub capability_ranks: BTreeMap<String, i64>,
    pub max_tokens: i64,
    pub avg_latency_ms: f64,
    pub cost_per_1k_usd: f64,
    #[serde(alias = "stake_eth", default)]
    pub stake: f64,
}

/// Validated registration, ready to become a [`Model`]
#[derive(Debug, Clone)]
pub(crate) struct ValidRegistration {
    pub name: String,
    pub capability_ranks: CapabilityRanks,
    pub profile: OperatingProfile,
    pub stake: f64,
}

impl ModelRegistration {
    pub(crate) fn validate(&self) -> Result<ValidRegistration> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(EngineError::validation("model name cannot be empty"));
        }

        let capability_ranks = CapabilityRanks::parse(&self.capability_ranks)?;
        if capability_ranks.is_empty() {
            return Err(EngineError::validation(
                "at least one capability rank must be declared",
            ));
        }

        if self.max_tokens <= 0 {
            return Err(EngineError::validation("max_tokens must be a positive integer"));
        }
        if !self.avg_latency_ms.is_finite() || self.avg_latency_ms <= 0.0 {
            return Err(EngineError::validation("avg_latency_ms must be positive"));
        }
        if !self.cost_per_1k_usd.is_finite() || self.cost_per_1k_usd < 0.0 {
            return Err(EngineError::validation("cost_per_1k_usd cannot be negative"));
        }
        if !self.stake.is_finite() || self.stake < 0.0 {
            return Err(EngineError::validation("stake cannot be negative"));
        }

        Ok(ValidRegistration {
            name: name.to_string(),
            capability_ranks,
            profile: OperatingProfile {
                max_tokens: self.max_tokens as u64,
                avg_latency_ms: self.avg_latency_ms,
                cost_per_1k_usd: self.cost_per_1k_usd,
            },
            stake: self.stake,
        })
    }
}

/// A registered capability provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub name: String,
    pub capability_ranks: CapabilityRanks,
    #[serde(flatten)]
    pub profile: OperatingProfile,
    #[serde(rename = "stake_eth")]
    pub stake: f64,
    pub is_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    /// Cached result of the trust calculation; written only by the tracker
    pub trust_score: f64,
    pub violation_count: u64,
    pub registration_time: DateTime<Utc>,
}

impl Model {
    pub(crate) fn new(id: String, registration: ValidRegistration, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: registration.name,
            capability_ranks: registration.capability_ranks,
            profile: registration.profile,
            stake: registration.stake,
            is_verified: false,
            verified_at: None,
            trust_score: 0.0,
            violation_count: 0,
            registration_time: now,
        }
    }

    /// Whether the model declared `capability` with at least `min_rank`
    pub fn meets_rank(&self, capability: Capability, min_rank: u32) -> bool {
        self.capability_ranks
            .rank(capability)
            .map(|rank| rank >= min_rank)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(ranks: &[(&str, i64)]) -> ModelRegistration {
        ModelRegistration {
            name: "gpt-test".to_string(),
            capability_ranks: ranks.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            max_tokens: 8192,
            avg_latency_ms: 500.0,
            cost_per_1k_usd: 0.01,
            stake: 10.0,
        }
    }

    #[test]
    fn test_capability_aliases() {
        assert_eq!("if".parse::<Capability>().unwrap(), Capability::InstructionFollowing);
        assert_eq!("if_rank".parse::<Capability>().unwrap(), Capability::InstructionFollowing);
        assert_eq!("MATH".parse::<Capability>().unwrap(), Capability::Math);
        assert!("poetry".parse::<Capability>().is_err());
    }

    #[test]
    fn test_rank_must_be_positive() {
        let err = registration(&[("math", 0)]).validate().unwrap_err();
        assert_eq!(err.kind(), "ValidationError");

        let err = registration(&[("code", -3)]).validate().unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let err = registration(&[("if", 2), ("if_rank", 3)]).validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_profile_validation() {
        let mut reg = registration(&[("math", 5)]);
        reg.cost_per_1k_usd = -0.5;
        assert!(reg.validate().is_err());

        let mut reg = registration(&[("math", 5)]);
        reg.name = "   ".to_string();
        assert!(reg.validate().is_err());

        let mut reg = registration(&[("math", 5)]);
        reg.max_tokens = 0;
        assert!(reg.validate().is_err());

        let reg = registration(&[("math", 5), ("if", 1)]);
        let valid = reg.validate().unwrap();
        assert_eq!(valid.capability_ranks.rank(Capability::InstructionFollowing), Some(1));
        assert_eq!(valid.capability_ranks.rank(Capability::Safety), None);
    }

    #[test]
    fn test_ranks_serialize_with_canonical_names() {
        let ranks = CapabilityRanks::from_pairs([(Capability::InstructionFollowing, 3)]);
        let json = serde_json::to_value(&ranks).unwrap();
        assert_eq!(json, serde_json::json!({ "if": 3 }));
    }
}
