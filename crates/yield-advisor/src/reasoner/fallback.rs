use super::{
    slices, ProtocolRisk, QueryFocus, ReasoningChain, ReasoningType, Reasoner, Recommendation, DIRECT, FALLBACK,
    INSUFFICIENT, INSUFFICIENT_INFORMATION,
};
use crate::knowledge::DEFAULT_ALLOCATION;
use crate::model::{RiskTolerance, YieldOpportunity};

/// Reasoner used when the knowledge store is unavailable.
///
/// Always allocates [`DEFAULT_ALLOCATION`] across the top-ranked venues and
/// marks the chain with a single fallback step, which caps its confidence.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicFallbackReasoner;

impl Reasoner for HeuristicFallbackReasoner {
    fn kind(&self) -> &'static str {
        "fallback"
    }

    fn recommend(
        &self,
        query: &str,
        opportunities: &[YieldOpportunity],
        tolerance: Option<RiskTolerance>,
    ) -> Recommendation {
        let focus = QueryFocus::read(query, tolerance);
        let allocation = DEFAULT_ALLOCATION.to_vec();
        let mut chain = ReasoningChain::new(focus.reasoning.as_str());

        if focus.has_concepts() {
            for asset in &focus.assets {
                chain.push(format!("topic={asset}"), DIRECT);
            }
            for protocol in &focus.protocols {
                chain.push(format!("protocol={protocol}"), DIRECT);
            }

            let mut step = format!("fallback: knowledge unavailable, default alloc={allocation:?}");
            if opportunities.is_empty() {
                step.push_str(" (no venue data)");
            }
            chain.push(step, FALLBACK);
        } else {
            chain.push(INSUFFICIENT_INFORMATION, INSUFFICIENT);
        }

        // Tiers as reported by the sources themselves
        let protocol_risks = if focus.reasoning == ReasoningType::Risk {
            focus
                .risk_subjects(opportunities)
                .into_iter()
                .map(|protocol| {
                    let tier = opportunities.iter().find(|q| q.is_protocol(&protocol)).map(|q| q.risk);
                    ProtocolRisk {
                        protocol,
                        tier,
                        known: false,
                    }
                })
                .collect()
        } else {
            Vec::new()
        };

        let venues: Vec<&YieldOpportunity> = opportunities.iter().collect();
        let slices = slices(&allocation, &venues, focus.amount);

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
    use crate::model::RiskTier;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn venues() -> Vec<YieldOpportunity> {
        vec![
            YieldOpportunity::new("Kamino", "USDC", RiskTier::Medium, "kamino").with_apy(dec!(12.3)),
            YieldOpportunity::new("Orca", "SOL-USDC", RiskTier::Low, "orca").with_apy(dec!(8.5)),
        ]
    }

    #[test]
    fn test_default_allocation_and_capped_confidence() {
        for (query, tolerance) in [
            ("Best strategy for $1000 USDC", None),
            ("aggressive plan for SOL", None),
            ("allocate my USDT", Some(RiskTolerance::Conservative)),
            ("hello", None),
        ] {
            let rec = HeuristicFallbackReasoner.recommend(query, &venues(), tolerance);
            assert_eq!(rec.allocation, vec![40, 30, 30], "{query}");
            assert!(rec.confidence() <= 0.5, "{query}");
            assert_eq!(rec.engine, "fallback");
        }
    }

    #[test]
    fn test_fallback_step_is_labeled() {
        let rec = HeuristicFallbackReasoner.recommend("Best strategy for $1000 USDC", &venues(), None);

        assert_eq!(rec.tolerance, RiskTolerance::Moderate);
        assert!(rec.chain.steps.iter().any(|s| s.concept.starts_with("fallback")));
        assert_eq!(rec.chain.steps.iter().filter(|s| s.confidence < 0.6).count(), 1);
        assert_eq!(rec.slices.len(), 2);
        assert_eq!(rec.slices[0].percent, 70);
        assert_eq!(rec.slices[0].amount_usd, Some(dec!(700)));
    }

    #[test]
    fn test_risk_tiers_from_sources() {
        let rec = HeuristicFallbackReasoner.recommend("Is Orca safe?", &venues(), None);
        assert_eq!(rec.protocol_risks[0].protocol, "Orca");
        assert_eq!(rec.protocol_risks[0].tier, Some(RiskTier::Low));
        assert!(!rec.protocol_risks[0].known);
    }

    #[test]
    fn test_amount_at_decimal_limit() {
        let rec =
            HeuristicFallbackReasoner.recommend("Best strategy for $79228162514264337593543950335 USDC", &venues(), None);

        assert_eq!(rec.amount_usd, Some(Decimal::MAX));
        assert_eq!(rec.slices.len(), 2);
        assert!(rec.slices.iter().all(|s| s.amount_usd.is_none()));
    }
}
