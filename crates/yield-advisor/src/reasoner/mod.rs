//! Strategy Reasoner
//!
//! Turns a query plus ranked opportunities into a confidence-scored
//! [`ReasoningChain`] and an allocation. Two implementations sit behind
//! [`Reasoner`]; [`select_reasoner`] picks one once at startup depending on
//! whether the knowledge store is available.

mod allocate;
mod chain;
mod fallback;
mod knowledge;

pub use allocate::{slices, AllocationSlice};
pub use chain::{aggregate, ReasoningChain, ReasoningStep, DERIVED, DIRECT, FALLBACK, FALLBACK_THRESHOLD, INSUFFICIENT};
pub use fallback::HeuristicFallbackReasoner;
pub use knowledge::KnowledgeBackedReasoner;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::concepts::{self, Normalized};
use crate::knowledge::KnowledgeBase;
use crate::model::{RiskTier, RiskTolerance, YieldOpportunity};

/// How the explanation is structured; local to the reasoner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningType {
    Topic,
    Comparison,
    Strategy,
    Risk,
}

impl ReasoningType {
    const RISK: &'static [&'static str] = &["risk", "risks", "risky", "safe", "safety", "security", "secure", "dangerous", "audit"];
    const COMPARISON: &'static [&'static str] = &["compare", "comparison", "vs", "versus", "better"];
    const STRATEGY: &'static [&'static str] = &[
        "strategy", "allocate", "allocation", "portfolio", "invest", "diversify", "plan", "recommend",
    ];

    /// Risk wins over comparison, comparison over strategy
    pub fn classify(query: &str) -> Self {
        let norm = Normalized::new(query);
        if norm.has_any(Self::RISK) {
            Self::Risk
        } else if norm.has_any(Self::COMPARISON) {
            Self::Comparison
        } else if norm.has_any(Self::STRATEGY) {
            Self::Strategy
        } else {
            Self::Topic
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Topic => "topic",
            Self::Comparison => "comparison",
            Self::Strategy => "strategy",
            Self::Risk => "risk",
        }
    }
}

/// Risk tier of one protocol as the reasoner understood it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolRisk {
    pub protocol: String,
    pub tier: Option<RiskTier>,
    /// True when the tier came from the knowledge store
    pub known: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub reasoning: ReasoningType,
    pub chain: ReasoningChain,
    pub tolerance: RiskTolerance,
    pub allocation: Vec<u8>,
    pub slices: Vec<AllocationSlice>,
    pub amount_usd: Option<Decimal>,
    pub protocol_risks: Vec<ProtocolRisk>,

    /// False when no opportunities were supplied
    pub venue_data: bool,

    /// Which reasoner produced this
    pub engine: String,
}

impl Recommendation {
    pub fn confidence(&self) -> f64 {
        self.chain.confidence
    }
}

pub trait Reasoner: Send + Sync {
    fn kind(&self) -> &'static str;

    /// `tolerance` overrides anything stated in the query; MODERATE otherwise
    fn recommend(
        &self,
        query: &str,
        opportunities: &[YieldOpportunity],
        tolerance: Option<RiskTolerance>,
    ) -> Recommendation;
}

/// Pick the reasoner for this process
pub fn select_reasoner(kb: Arc<dyn KnowledgeBase>) -> Arc<dyn Reasoner> {
    if kb.is_available() {
        tracing::info!("Using knowledge-backed reasoner");
        Arc::new(KnowledgeBackedReasoner::new(kb))
    } else {
        tracing::warn!("Knowledge store unavailable, using heuristic fallback reasoner");
        Arc::new(HeuristicFallbackReasoner)
    }
}

/// What the reasoner extracted from the query text
struct QueryFocus {
    reasoning: ReasoningType,
    tolerance: RiskTolerance,
    assets: Vec<String>,
    protocols: Vec<&'static str>,
    amount: Option<Decimal>,
}

impl QueryFocus {
    fn read(query: &str, tolerance: Option<RiskTolerance>) -> Self {
        Self {
            reasoning: ReasoningType::classify(query),
            tolerance: tolerance
                .or_else(|| concepts::extract_tolerance(query))
                .unwrap_or_default(),
            assets: concepts::extract_assets(query),
            protocols: concepts::extract_protocols(query),
            amount: concepts::extract_amount(query),
        }
    }

    fn has_concepts(&self) -> bool {
        !self.assets.is_empty() || !self.protocols.is_empty()
    }

    /// Protocols a risk answer should cover: the named ones, else the top venues
    fn risk_subjects(&self, opportunities: &[YieldOpportunity]) -> Vec<String> {
        if !self.protocols.is_empty() {
            return self.protocols.iter().map(|p| (*p).to_string()).collect();
        }
        let mut out = distinct_protocols(opportunities.iter());
        out.truncate(3);
        out
    }

    /// Protocols in rank order, limited to the named ones when any are named
    fn contenders(&self, opportunities: &[YieldOpportunity]) -> Vec<String> {
        distinct_protocols(
            opportunities
                .iter()
                .filter(|q| self.protocols.is_empty() || self.protocols.iter().any(|p| q.is_protocol(p))),
        )
    }
}

fn distinct_protocols<'a>(opportunities: impl Iterator<Item = &'a YieldOpportunity>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for q in opportunities {
        if !out.contains(&q.protocol) {
            out.push(q.protocol.clone());
        }
    }
    out
}

const INSUFFICIENT_INFORMATION: &str = "insufficient information: no asset, pair or protocol in query";
