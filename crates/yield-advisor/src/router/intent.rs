//! Intent classification
//!
//! A pure function of the query text. Rules, first match wins:
//!
//! 1. an out-of-scope pattern anywhere in the text → `out_of_scope`
//! 2. no yield vocabulary, known asset or known protocol → `out_of_scope`
//! 3. comparison words → `yield_comparison`
//! 4. risk words → `risk_assessment`
//! 5. strategy words → `strategy_recommendation`
//! 6. otherwise → `yield_analysis`

use serde::{Deserialize, Serialize};

use crate::concepts::{self, Normalized};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    YieldAnalysis,
    YieldComparison,
    StrategyRecommendation,
    RiskAssessment,
    OutOfScope,
}

impl Intent {
    pub const ALL: [Self; 5] = [
        Self::YieldAnalysis,
        Self::YieldComparison,
        Self::StrategyRecommendation,
        Self::RiskAssessment,
        Self::OutOfScope,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::YieldAnalysis => "yield_analysis",
            Self::YieldComparison => "yield_comparison",
            Self::StrategyRecommendation => "strategy_recommendation",
            Self::RiskAssessment => "risk_assessment",
            Self::OutOfScope => "out_of_scope",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.as_str() == s)
    }

    /// Whether the strategy reasoner runs after the analyzer
    pub const fn needs_reasoner(self) -> bool {
        matches!(self, Self::StrategyRecommendation | Self::RiskAssessment)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const DEFAULT_OUT_OF_SCOPE: &[&str] = &["weather", "joke", "recipe", "sports", "movie", "poem"];

const DOMAIN: &[&str] = &[
    "yield", "yields", "apy", "apys", "apr", "aprs", "return", "returns", "earn", "earning", "interest",
    "staking", "stake", "lend", "lending", "farm", "farming", "liquidity", "pool", "pools", "vault", "vaults",
    "strategy", "allocate", "allocation", "invest", "investment", "portfolio", "risk", "risks", "risky",
    "defi", "tvl", "protocol", "protocols",
];
const COMPARISON: &[&str] = &["compare", "comparison", "vs", "versus", "between", "better than"];
const RISK: &[&str] = &[
    "risk", "risks", "risky", "safe", "safety", "dangerous", "secure", "security", "audit", "audited",
    "impermanent loss", "rug",
];
const STRATEGY: &[&str] = &[
    "strategy", "strategies", "allocate", "allocation", "portfolio", "diversify", "plan", "recommend",
    "recommendation", "should", "optimal", "invest",
];

#[derive(Clone, Debug)]
pub struct IntentClassifier {
    out_of_scope: Vec<String>,
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl IntentClassifier {
    /// Built-in out-of-scope patterns plus `extra`
    pub fn new(extra: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut out_of_scope: Vec<String> = DEFAULT_OUT_OF_SCOPE.iter().map(|p| (*p).to_string()).collect();
        for pattern in extra {
            let pattern = Normalized::new(&pattern.into()).as_phrase();
            if !pattern.is_empty() && !out_of_scope.contains(&pattern) {
                out_of_scope.push(pattern);
            }
        }
        Self { out_of_scope }
    }

    pub fn classify(&self, query: &str) -> Intent {
        let norm = Normalized::new(query);

        if self.out_of_scope.iter().any(|p| norm.has(p)) {
            return Intent::OutOfScope;
        }

        let in_domain = norm.has_any(DOMAIN)
            || !concepts::extract_assets(query).is_empty()
            || !concepts::extract_protocols(query).is_empty();
        if !in_domain {
            return Intent::OutOfScope;
        }

        if norm.has_any(COMPARISON) {
            Intent::YieldComparison
        } else if norm.has_any(RISK) {
            Intent::RiskAssessment
        } else if norm.has_any(STRATEGY) {
            Intent::StrategyRecommendation
        } else {
            Intent::YieldAnalysis
        }
    }
}
