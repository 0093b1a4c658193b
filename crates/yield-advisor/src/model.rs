//! Domain Models
//!
//! Core data types for yield opportunities and risk.
//! Uses `rust_decimal` for APY and TVL - never use f64 for money!

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Risk tier of a protocol or venue
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "mid" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Human label
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Total-value-locked bucket hint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TvlBucket {
    Low,
    Mid,
    High,
}

impl TvlBucket {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "mid" | "medium" => Some(Self::Mid),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        }
    }
}

/// Investor risk tolerance; selects an allocation template
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl RiskTolerance {
    /// Template key used by the knowledge store
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "CONSERVATIVE",
            Self::Moderate => "MODERATE",
            Self::Aggressive => "AGGRESSIVE",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Conservative => "Conservative",
            Self::Moderate => "Moderate",
            Self::Aggressive => "Aggressive",
        }
    }

    /// Riskiest venue tier this tolerance accepts
    pub const fn ceiling(self) -> RiskTier {
        match self {
            Self::Conservative => RiskTier::Low,
            Self::Moderate => RiskTier::Medium,
            Self::Aggressive => RiskTier::High,
        }
    }
}

impl std::fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A yield quote observed from one data source
///
/// Produced fresh per query; never cached beyond a single request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YieldOpportunity {
    /// Protocol name (e.g., "Orca", "Kamino")
    pub protocol: String,

    /// Asset symbol or pair (e.g., "USDC", "SOL-USDC")
    pub asset: String,

    /// Annual percentage yield, if the source exposes one
    pub apy: Option<Decimal>,

    /// Total value locked in USD, if known
    pub tvl_usd: Option<Decimal>,

    /// Venue risk tier
    pub risk: RiskTier,

    /// Data source identifier
    pub source: String,

    /// When the quote was observed
    pub observed_at: DateTime<Utc>,
}

impl YieldOpportunity {
    pub fn new(
        protocol: impl Into<String>,
        asset: impl Into<String>,
        risk: RiskTier,
        source: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            asset: asset.into().to_uppercase(),
            apy: None,
            tvl_usd: None,
            risk,
            source: source.into(),
            observed_at: Utc::now(),
        }
    }

    pub fn with_apy(mut self, apy: Decimal) -> Self {
        self.apy = Some(apy);
        self
    }

    pub fn with_tvl(mut self, tvl_usd: Decimal) -> Self {
        self.tvl_usd = Some(tvl_usd);
        self
    }

    /// Whether this quote is about `topic`.
    ///
    /// A pair topic must match the pair exactly; an asset topic matches the
    /// asset itself or either leg of a pair.
    pub fn matches_topic(&self, topic: &str) -> bool {
        let topic = topic.to_uppercase();
        if topic.contains('-') {
            return self.asset == topic;
        }
        self.asset.split('-').any(|leg| leg == topic)
    }

    /// Whether the protocol name matches, ignoring case
    pub fn is_protocol(&self, protocol: &str) -> bool {
        self.protocol.eq_ignore_ascii_case(protocol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_topic_matching() {
        let pool = YieldOpportunity::new("Orca", "sol-usdc", RiskTier::Low, "orca").with_apy(dec!(8.5));

        assert_eq!(pool.asset, "SOL-USDC");
        assert!(pool.matches_topic("SOL"));
        assert!(pool.matches_topic("usdc"));
        assert!(pool.matches_topic("SOL-USDC"));
        assert!(!pool.matches_topic("RAY-USDC"));
        assert!(!pool.matches_topic("USDT"));
    }

    #[test]
    fn test_asset_topic_does_not_match_substring() {
        let lend = YieldOpportunity::new("Marginfi", "MSOL", RiskTier::Medium, "marginfi");
        assert!(!lend.matches_topic("SOL"));
    }

    #[test]
    fn test_tolerance_ceiling() {
        assert_eq!(RiskTolerance::default(), RiskTolerance::Moderate);
        assert_eq!(RiskTolerance::Conservative.ceiling(), RiskTier::Low);
        assert!(RiskTier::Medium <= RiskTolerance::Moderate.ceiling());
        assert!(RiskTier::High > RiskTolerance::Moderate.ceiling());
    }

    #[test]
    fn test_tier_parsing() {
        assert_eq!(RiskTier::parse("LOW"), Some(RiskTier::Low));
        assert_eq!(RiskTier::parse("mid"), Some(RiskTier::Medium));
        assert_eq!(RiskTier::parse("extreme"), None);
        assert_eq!(TvlBucket::parse("high"), Some(TvlBucket::High));
    }
}
