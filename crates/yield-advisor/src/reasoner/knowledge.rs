use std::sync::Arc;

use super::{
    slices, HeuristicFallbackReasoner, ProtocolRisk, QueryFocus, ReasoningChain, ReasoningType, Reasoner, Recommendation, DERIVED,
    DIRECT, INSUFFICIENT, INSUFFICIENT_INFORMATION,
};
use crate::knowledge::KnowledgeBase;
use crate::model::{RiskTolerance, YieldOpportunity};

/// Reasoner that grounds each step in the knowledge store
pub struct KnowledgeBackedReasoner {
    kb: Arc<dyn KnowledgeBase>,
}

impl KnowledgeBackedReasoner {
    pub fn new(kb: Arc<dyn KnowledgeBase>) -> Self {
        Self { kb }
    }

    /// Routing hints and supporting protocols for `topic`, without duplicates
    fn routes(&self, topic: &str) -> Vec<String> {
        let mut routes = self.kb.query_routes(topic);
        for protocol in self.kb.query_pair(topic) {
            if !routes.contains(&protocol) {
                routes.push(protocol);
            }
        }
        routes
    }

    fn protocol_risk(&self, protocol: &str, opportunities: &[YieldOpportunity]) -> ProtocolRisk {
        match self.kb.query_risk(protocol) {
            Some(tier) => ProtocolRisk {
                protocol: protocol.to_string(),
                tier: Some(tier),
                known: true,
            },
            None => ProtocolRisk {
                protocol: protocol.to_string(),
                tier: opportunities.iter().find(|q| q.is_protocol(protocol)).map(|q| q.risk),
                known: false,
            },
        }
    }

    /// Venues in preference order: within the risk ceiling, routed first
    fn venues<'a>(
        &self,
        opportunities: &'a [YieldOpportunity],
        routed: &[String],
        tolerance: RiskTolerance,
    ) -> Vec<&'a YieldOpportunity> {
        let ceiling = tolerance.ceiling();
        let within: Vec<&YieldOpportunity> = opportunities
            .iter()
            .filter(|q| self.kb.query_risk(&q.protocol).unwrap_or(q.risk) <= ceiling)
            .collect();
        let pool = if within.is_empty() {
            opportunities.iter().collect()
        } else {
            within
        };

        let is_routed = |q: &YieldOpportunity| routed.iter().any(|p| q.is_protocol(p));
        let (mut preferred, rest): (Vec<_>, Vec<_>) = pool.into_iter().partition(|q| is_routed(q));
        preferred.extend(rest);
        preferred
    }
}

impl Reasoner for KnowledgeBackedReasoner {
    fn kind(&self) -> &'static str {
        "knowledge"
    }

    fn recommend(
        &self,
        query: &str,
        opportunities: &[YieldOpportunity],
        tolerance: Option<RiskTolerance>,
    ) -> Recommendation {
        if !self.kb.is_available() {
            tracing::warn!("Knowledge store unavailable, using fallback reasoning");
            return HeuristicFallbackReasoner.recommend(query, opportunities, tolerance);
        }

        let focus = QueryFocus::read(query, tolerance);
        let allocation = self.kb.query_allocation(focus.tolerance.as_str());
        let mut chain = ReasoningChain::new(focus.reasoning.as_str());
        let mut routed: Vec<String> = Vec::new();

        let protocol_risks: Vec<ProtocolRisk> = if focus.reasoning == ReasoningType::Risk {
            focus
                .risk_subjects(opportunities)
                .iter()
                .map(|p| self.protocol_risk(p, opportunities))
                .collect()
        } else {
            Vec::new()
        };

        if focus.has_concepts() {
            for asset in &focus.assets {
                chain.push(format!("topic={asset}"), DIRECT);

                let direct = self.routes(asset);
                if direct.is_empty() {
                    let mut derived: Vec<String> = Vec::new();
                    for q in opportunities.iter().filter(|q| q.matches_topic(asset)) {
                        if !derived.contains(&q.protocol) {
                            derived.push(q.protocol.clone());
                        }
                    }
                    chain.push(format!("routes={asset}:[{}] (derived)", derived.join(", ")), DERIVED);
                    routed.extend(derived);
                } else {
                    chain.push(format!("routes={asset}:[{}]", direct.join(", ")), DIRECT);
                    routed.extend(direct);
                }
            }

            for protocol in &focus.protocols {
                chain.push(format!("protocol={protocol}"), DIRECT);
            }

            for risk in &protocol_risks {
                let tier = risk.tier.map_or("unknown", |t| t.as_str());
                let confidence = if risk.known { DIRECT } else { DERIVED };
                chain.push(format!("risk={}:{tier}", risk.protocol), confidence);
            }

            if focus.reasoning == ReasoningType::Comparison {
                let contenders = focus.contenders(opportunities);
                if let [first, second, ..] = contenders.as_slice() {
                    chain.push(format!("compare={first} over {second}"), DERIVED);
                }
            }

            let mut alloc_step = format!("alloc={allocation:?} ({})", focus.tolerance.as_str());
            if opportunities.is_empty() {
                alloc_step.push_str(" (no venue data)");
            }
            chain.push(alloc_step, DERIVED);
        } else {
            chain.push(INSUFFICIENT_INFORMATION, INSUFFICIENT);
        }

        let venues = self.venues(opportunities, &routed, focus.tolerance);
        let slices = slices(&allocation, &venues, focus.amount);

        tracing::debug!(
            reasoning = focus.reasoning.as_str(),
            tolerance = %focus.tolerance,
            steps = chain.steps.len(),
            confidence = chain.confidence,
            "Recommendation built"
        );

        Recommendation {
            reasoning: focus.reasoning,
            chain,
            tolerance: focus.tolerance,
            allocation,
            slices,
            amount_usd: focus.amount,
            protocol_risks,
            venue_data: !opportunities.is_empty(),
            engine: self.kind().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::rank;
    use crate::knowledge::{RelationStore, UnavailableKnowledge, DEFAULT_ALLOCATION};
    use crate::model::RiskTier;
    use rust_decimal_macros::dec;

    fn reasoner() -> KnowledgeBackedReasoner {
        KnowledgeBackedReasoner::new(Arc::new(RelationStore::seed().unwrap()))
    }

    fn usdc_venues() -> Vec<YieldOpportunity> {
        let mut list = vec![
            YieldOpportunity::new("Orca", "SOL-USDC", RiskTier::Low, "orca")
                .with_apy(dec!(8.5))
                .with_tvl(dec!(15_000_000)),
            YieldOpportunity::new("Kamino", "USDC", RiskTier::Medium, "kamino")
                .with_apy(dec!(12.3))
                .with_tvl(dec!(5_000_000)),
            YieldOpportunity::new("Raydium", "SOL-USDC", RiskTier::Low, "raydium")
                .with_apy(dec!(7.2))
                .with_tvl(dec!(12_000_000)),
        ];
        rank(&mut list);
        list
    }

    #[test]
    fn test_strategy_defaults_to_moderate() {
        let rec = reasoner().recommend("Best strategy for $1000 USDC", &usdc_venues(), None);

        assert_eq!(rec.tolerance, RiskTolerance::Moderate);
        assert_eq!(rec.allocation, vec![40, 30, 30]);
        assert_eq!(rec.engine, "knowledge");
        assert!(rec.chain.steps.iter().any(|s| s.concept == "routes=USDC:[Kamino, Solend]"));
        assert!(rec.confidence() > 0.8);

        // Routed Kamino first, then the remaining venues by rank
        let protocols: Vec<_> = rec.slices.iter().map(|s| s.protocol.as_str()).collect();
        assert_eq!(protocols, vec!["Kamino", "Orca", "Raydium"]);
        assert_eq!(rec.slices[0].amount_usd, Some(dec!(400)));
    }

    #[test]
    fn test_conservative_respects_ceiling() {
        let rec = reasoner().recommend("conservative plan for USDC", &usdc_venues(), None);

        assert_eq!(rec.allocation, vec![50, 30, 20]);
        assert!(rec.slices.iter().all(|s| s.risk == RiskTier::Low));
        assert_eq!(rec.slices.iter().map(|s| u32::from(s.percent)).sum::<u32>(), 100);
    }

    #[test]
    fn test_explicit_tolerance_overrides_query() {
        let rec = reasoner().recommend("conservative plan for USDC", &usdc_venues(), Some(RiskTolerance::Aggressive));
        assert_eq!(rec.allocation, vec![25, 35, 40]);
    }

    #[test]
    fn test_no_concepts() {
        let rec = reasoner().recommend("what should I do with my money", &usdc_venues(), None);

        assert_eq!(rec.chain.steps.len(), 1);
        assert!(rec.chain.steps[0].concept.starts_with("insufficient information"));
        assert!(rec.confidence() < 0.5);
    }

    #[test]
    fn test_no_venue_data() {
        let rec = reasoner().recommend("Best strategy for USDC", &[], None);

        assert!(!rec.venue_data);
        assert!(rec.slices.is_empty());
        let last = rec.chain.steps.last().unwrap();
        assert!(last.concept.starts_with("alloc=[40, 30, 30]"));
        assert!(last.concept.ends_with("(no venue data)"));
    }

    #[test]
    fn test_risk_steps() {
        let rec = reasoner().recommend("How risky is Kamino?", &usdc_venues(), None);

        assert_eq!(rec.reasoning, ReasoningType::Risk);
        assert!(rec.chain.steps.iter().any(|s| s.concept == "risk=Kamino:medium"));
        assert_eq!(rec.protocol_risks[0].tier, Some(RiskTier::Medium));
        assert!(rec.protocol_risks[0].known);
    }

    #[test]
    fn test_comparison_step() {
        let rec = reasoner().recommend("Is Orca better than Raydium for SOL-USDC?", &usdc_venues(), None);
        assert!(rec.chain.steps.iter().any(|s| s.concept == "compare=Orca over Raydium"));
    }

    #[test]
    fn test_unavailable_store_falls_back() {
        let reasoner = KnowledgeBackedReasoner::new(Arc::new(UnavailableKnowledge));
        let rec = reasoner.recommend("Best strategy for $1000 USDC", &usdc_venues(), None);

        assert_eq!(rec.engine, "fallback");
        assert_eq!(rec.allocation, DEFAULT_ALLOCATION.to_vec());
        assert_eq!(rec.slices.len(), 3);
        assert!(rec.confidence() <= 0.5);
    }
}
