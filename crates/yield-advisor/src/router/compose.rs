//! Reply Composition
//!
//! Human-readable bodies for every intent. Pure string building over the
//! typed pipeline results; nothing here talks to an agent.

use rust_decimal::Decimal;
use std::fmt::Write;

use crate::analyzer::Analysis;
use crate::model::YieldOpportunity;
use crate::reasoner::Recommendation;

pub const WELCOME: &str = "Welcome! I help you find and compare DeFi yields on Solana. \
Ask me about yields, comparisons, allocation strategies or risk.";

/// Capability advertisement sent with the welcome message
pub const CAPABILITIES: [(&str, &str); 2] = [
    ("capabilities", "yield_optimization"),
    (
        "supported_queries",
        "yield_analysis,yield_comparison,strategy_recommendation,risk_assessment",
    ),
];

const RISK_FACTORS: [&str; 4] = [
    "Smart contract risk: audited code can still contain exploitable bugs.",
    "Impermanent loss: LP positions lose value when the paired assets diverge in price.",
    "Liquidation and oracle risk: lending positions depend on timely, accurate price feeds.",
    "Liquidity risk: low-TVL venues can be hard to exit without slippage.",
];

/// Static capability listing for queries outside the domain
pub fn out_of_scope() -> String {
    [
        "That's outside what I can help with. I specialise in Solana DeFi yields:",
        "- Yield analysis: \"What's the best yield for SOL?\"",
        "- Yield comparison: \"Compare Orca vs Raydium APYs\"",
        "- Strategy recommendations: \"Best strategy for $1000 USDC\"",
        "- Risk assessment: \"What are the risks of staking SOL?\"",
    ]
    .join("\n")
}

/// `$15,000,000`, `$1,250.50`
pub fn format_usd(value: Decimal) -> String {
    let value = value.round_dp(2).normalize();
    let text = value.abs().to_string();
    let (int, frac) = text
        .split_once('.')
        .map_or((text.as_str(), None), |(i, f)| (i, Some(f)));

    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, c) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value.is_sign_negative() && !value.is_zero() { "-" } else { "" };
    match frac {
        Some(f) => format!("{sign}${grouped}.{f:0<2}"),
        None => format!("{sign}${grouped}"),
    }
}

pub fn format_apy(apy: Option<Decimal>) -> String {
    apy.map_or_else(|| "n/a".to_string(), |a| format!("{}%", a.normalize()))
}

fn opportunity_line(rank: usize, q: &YieldOpportunity) -> String {
    format!(
        "{rank}. {} – {} · APY {} · TVL {} · Risk {} · Source {}",
        q.protocol,
        q.asset,
        format_apy(q.apy),
        q.tvl_usd.map_or_else(|| "n/a".to_string(), format_usd),
        q.risk.label(),
        q.source,
    )
}

fn push_opportunities(out: &mut String, analysis: &Analysis) {
    for (i, q) in analysis.opportunities.iter().enumerate() {
        let _ = writeln!(out, "{}", opportunity_line(i + 1, q));
    }
}

fn push_missing_note(out: &mut String, analysis: &Analysis) {
    match analysis.missing_sources() {
        0 => {}
        1 => out.push_str("\n(1 data source was unavailable; results may be incomplete.)"),
        n => {
            let _ = write!(out, "\n({n} data sources were unavailable; results may be incomplete.)");
        }
    }
}

fn subject(analysis: &Analysis) -> String {
    analysis
        .topic
        .as_deref()
        .map_or_else(|| "Solana DeFi".to_string(), str::to_string)
}

pub fn yield_analysis(analysis: &Analysis) -> String {
    let mut out = String::new();
    if analysis.opportunities.is_empty() {
        let _ = write!(out, "I couldn't find any yield opportunities for {} right now.", subject(analysis));
    } else {
        let _ = writeln!(out, "Top yield opportunities for {}:", subject(analysis));
        push_opportunities(&mut out, analysis);
        if let Some(best) = analysis.opportunities.first() {
            let _ = write!(
                out,
                "\nBest: {} {} at {} APY.",
                best.protocol,
                best.asset,
                format_apy(best.apy)
            );
        }
    }
    push_missing_note(&mut out, analysis);
    out.trim_end().to_string()
}

pub fn comparison(analysis: &Analysis) -> String {
    let mut out = String::new();
    match analysis.opportunities.as_slice() {
        [] => out.push_str("I couldn't find quotes for those venues right now."),
        [only] => {
            let _ = write!(
                out,
                "Only {} returned a quote: {} at {} APY.",
                only.protocol,
                only.asset,
                format_apy(only.apy)
            );
        }
        [first, second, ..] => {
            out.push_str("Yield comparison (ranked by APY, then TVL):\n");
            push_opportunities(&mut out, analysis);
            let _ = write!(
                out,
                "\n{} leads with {} APY, ahead of {} at {}.",
                first.protocol,
                format_apy(first.apy),
                second.protocol,
                format_apy(second.apy)
            );
        }
    }
    push_missing_note(&mut out, analysis);
    out.trim_end().to_string()
}

fn push_reasoning(out: &mut String, recommendation: &Recommendation) {
    let chain = &recommendation.chain;
    let _ = writeln!(out, "\nReasoning (confidence {:.2}):", chain.confidence);
    for step in &chain.steps {
        let _ = writeln!(out, "  {}. {} ({:.2})", step.index, step.concept, step.confidence);
    }
    if recommendation.engine == "fallback" {
        out.push_str("Note: the knowledge base is unavailable, so a default allocation was used.\n");
    }
}

pub fn strategy(analysis: &Analysis, recommendation: &Recommendation) -> String {
    let mut out = String::new();
    let _ = write!(out, "{} strategy", recommendation.tolerance.label());
    if let Some(amount) = recommendation.amount_usd {
        let _ = write!(out, " for {}", format_usd(amount));
    }
    let _ = writeln!(out, " in {}:", subject(analysis));

    if recommendation.slices.is_empty() {
        let template: Vec<String> = recommendation.allocation.iter().map(|p| format!("{p}%")).collect();
        let _ = writeln!(
            out,
            "No venue data was available, so only the allocation template applies: {}.",
            template.join(" / ")
        );
    } else {
        for slice in &recommendation.slices {
            let _ = write!(out, "- {}% {} ({})", slice.percent, slice.protocol, slice.asset);
            if let Some(amount) = slice.amount_usd {
                let _ = write!(out, " · {}", format_usd(amount));
            }
            let _ = writeln!(out, " · APY {} · Risk {}", format_apy(slice.apy), slice.risk.label());
        }
    }

    push_reasoning(&mut out, recommendation);
    push_missing_note(&mut out, analysis);
    out.trim_end().to_string()
}

pub fn risk(analysis: &Analysis, recommendation: &Recommendation) -> String {
    let mut out = String::from("Risk assessment:\n");
    if recommendation.protocol_risks.is_empty() {
        out.push_str("- No specific protocol identified.\n");
    }
    for risk in &recommendation.protocol_risks {
        let tier = risk.tier.map_or("Unknown", |t| t.label());
        let _ = writeln!(out, "- {}: {} risk", risk.protocol, tier);
    }

    out.push_str("\nGeneral risk factors:\n");
    for factor in RISK_FACTORS {
        let _ = writeln!(out, "- {factor}");
    }

    push_reasoning(&mut out, recommendation);
    push_missing_note(&mut out, analysis);
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{FailureKind, SourceFailure};
    use crate::model::RiskTier;
    use rust_decimal_macros::dec;

    fn pools() -> Analysis {
        Analysis {
            topic: None,
            opportunities: vec![
                YieldOpportunity::new("Orca", "SOL-USDC", RiskTier::Low, "orca")
                    .with_apy(dec!(8.5))
                    .with_tvl(dec!(15_000_000)),
                YieldOpportunity::new("Raydium", "SOL-USDC", RiskTier::Low, "raydium")
                    .with_apy(dec!(7.2))
                    .with_tvl(dec!(12_000_000)),
            ],
            excluded: Vec::new(),
        }
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(dec!(15_000_000)), "$15,000,000");
        assert_eq!(format_usd(dec!(1000)), "$1,000");
        assert_eq!(format_usd(dec!(400.00)), "$400");
        assert_eq!(format_usd(dec!(1250.5)), "$1,250.50");
        assert_eq!(format_usd(dec!(999)), "$999");
        assert_eq!(format_usd(dec!(-1234)), "-$1,234");
    }

    #[test]
    fn test_opportunity_line() {
        let text = yield_analysis(&pools());
        assert!(text.contains("1. Orca – SOL-USDC · APY 8.5% · TVL $15,000,000 · Risk Low · Source orca"));
        assert!(text.contains("Best: Orca SOL-USDC at 8.5% APY."));
    }

    #[test]
    fn test_comparison_names_leader_first() {
        let text = comparison(&pools());
        let orca = text.find("Orca").unwrap();
        let raydium = text.find("Raydium").unwrap();
        assert!(orca < raydium);
        assert!(text.contains("Orca leads with 8.5% APY, ahead of Raydium at 7.2%."));
    }

    #[test]
    fn test_missing_source_note() {
        let mut analysis = pools();
        analysis.excluded.push(SourceFailure {
            source: "kamino".into(),
            kind: FailureKind::Timeout,
            detail: "timed out".into(),
        });
        let text = yield_analysis(&analysis);
        assert!(text.ends_with("(1 data source was unavailable; results may be incomplete.)"));
        assert!(!text.contains("kamino"));
    }

    #[test]
    fn test_empty_analysis() {
        let analysis = Analysis {
            topic: Some("BONK".into()),
            ..Analysis::default()
        };
        assert_eq!(
            yield_analysis(&analysis),
            "I couldn't find any yield opportunities for BONK right now."
        );
    }
}
