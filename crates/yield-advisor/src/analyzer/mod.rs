//! Yield Analyzer
//!
//! Fans a query out to every configured quote source concurrently, each
//! bounded by the same per-source timeout, and ranks whatever comes back.
//! A failed or slow source is recorded in [`Analysis::excluded`] and never
//! fails the call.

mod demo;
mod http;
mod rank;

pub use demo::{demo_sources, StaticSource};
pub use http::HttpSource;
pub use rank::{compare_rank, rank};

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::AdvisorConfig;
use crate::error::{AdvisorError, Result};
use crate::model::YieldOpportunity;

/// Quote source adapter (Strategy pattern)
///
/// Implement this for each protocol API or aggregator.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Stable source identifier
    fn id(&self) -> &str;

    /// Quotes for `topic` (an asset or pair), or everything when `None`
    async fn fetch_quotes(&self, topic: Option<&str>) -> Result<Vec<YieldOpportunity>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Unavailable,
}

/// A source excluded from one analysis
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source: String,
    pub kind: FailureKind,

    /// Diagnostic detail; never shown to users
    pub detail: String,
}

/// Ranked result of one analysis
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub topic: Option<String>,
    pub opportunities: Vec<YieldOpportunity>,
    pub excluded: Vec<SourceFailure>,
}

impl Analysis {
    /// Number of sources that contributed nothing because they failed
    pub fn missing_sources(&self) -> usize {
        self.excluded.len()
    }

    /// Keep only opportunities from the named protocols, preserving rank
    pub fn retain_protocols(&mut self, protocols: &[&str]) {
        if protocols.is_empty() {
            return;
        }
        self.opportunities
            .retain(|q| protocols.iter().any(|p| q.is_protocol(p)));
    }
}

pub struct Analyzer {
    sources: Vec<Arc<dyn QuoteSource>>,
    source_timeout: Duration,
}

impl Analyzer {
    pub fn new(sources: Vec<Arc<dyn QuoteSource>>, source_timeout: Duration) -> Self {
        Self {
            sources,
            source_timeout,
        }
    }

    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    /// Fetch, filter and rank quotes for `topic`.
    ///
    /// Results are gathered in source-declared order before the stable sort,
    /// so identical source responses always rank identically.
    pub async fn analyze(&self, topic: Option<&str>) -> Analysis {
        let within = self.source_timeout;
        let fetches = self.sources.iter().map(|source| async move {
            let outcome = match tokio::time::timeout(within, source.fetch_quotes(topic)).await {
                Ok(result) => result,
                Err(_) => Err(AdvisorError::SourceTimeout {
                    source_id: source.id().to_string(),
                    after_ms: u64::try_from(within.as_millis()).unwrap_or(u64::MAX),
                }),
            };
            (source.id(), outcome)
        });

        let mut analysis = Analysis {
            topic: topic.map(str::to_uppercase),
            ..Analysis::default()
        };

        for (id, outcome) in join_all(fetches).await {
            match outcome {
                Ok(quotes) => analysis
                    .opportunities
                    .extend(quotes.into_iter().filter(|q| topic.is_none_or(|t| q.matches_topic(t)))),
                Err(e) => {
                    tracing::warn!(source = %id, "Excluding quote source: {}", e);
                    let kind = match e {
                        AdvisorError::SourceTimeout { .. } => FailureKind::Timeout,
                        _ => FailureKind::Unavailable,
                    };
                    analysis.excluded.push(SourceFailure {
                        source: id.to_string(),
                        kind,
                        detail: e.to_string(),
                    });
                }
            }
        }

        rank(&mut analysis.opportunities);
        tracing::debug!(
            topic = ?analysis.topic,
            opportunities = analysis.opportunities.len(),
            excluded = analysis.missing_sources(),
            "Analysis complete"
        );
        analysis
    }
}

/// Quote sources for this process: HTTP sources when configured, the
/// built-in demo sources otherwise
pub fn sources_from_config(config: &AdvisorConfig) -> Vec<Arc<dyn QuoteSource>> {
    if config.yield_sources.is_empty() {
        tracing::info!("No YIELD_SOURCES configured, using demo quote sources");
        return demo_sources();
    }

    let client = reqwest::Client::new();
    config
        .yield_sources
        .iter()
        .map(|spec| Arc::new(HttpSource::new(client.clone(), spec)) as Arc<dyn QuoteSource>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RiskTier;
    use rust_decimal_macros::dec;

    struct FailingSource;

    #[async_trait]
    impl QuoteSource for FailingSource {
        fn id(&self) -> &str {
            "broken"
        }

        async fn fetch_quotes(&self, _topic: Option<&str>) -> Result<Vec<YieldOpportunity>> {
            Err(AdvisorError::unavailable("broken", "HTTP 503"))
        }
    }

    fn source(id: &str, protocol: &str, asset: &str, apy: rust_decimal::Decimal) -> Arc<dyn QuoteSource> {
        Arc::new(StaticSource::new(
            id,
            vec![YieldOpportunity::new(protocol, asset, RiskTier::Low, id).with_apy(apy)],
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_is_excluded() {
        let slow = StaticSource::new(
            "slow",
            vec![YieldOpportunity::new("Kamino", "SOL", RiskTier::Medium, "slow").with_apy(dec!(50))],
        )
        .with_latency(Duration::from_secs(60));

        let analyzer = Analyzer::new(
            vec![
                source("orca", "Orca", "SOL-USDC", dec!(8.5)),
                Arc::new(slow),
                source("marginfi", "Marginfi", "SOL", dec!(9.8)),
            ],
            Duration::from_secs(10),
        );

        let analysis = analyzer.analyze(Some("SOL")).await;
        assert_eq!(analysis.opportunities.len(), 2);
        assert_eq!(analysis.opportunities[0].protocol, "Marginfi");
        assert_eq!(analysis.opportunities[1].protocol, "Orca");
        assert_eq!(analysis.missing_sources(), 1);
        assert_eq!(analysis.excluded[0].source, "slow");
        assert_eq!(analysis.excluded[0].kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_failed_source_is_soft() {
        let analyzer = Analyzer::new(
            vec![Arc::new(FailingSource), source("kamino", "Kamino", "USDC", dec!(12.3))],
            Duration::from_secs(1),
        );

        let analysis = analyzer.analyze(None).await;
        assert_eq!(analysis.opportunities.len(), 1);
        assert_eq!(analysis.excluded[0].kind, FailureKind::Unavailable);
        assert!(analysis.excluded[0].detail.contains("HTTP 503"));
    }

    #[tokio::test]
    async fn test_analyze_is_idempotent() {
        let analyzer = Analyzer::new(demo_sources(), Duration::from_secs(1));

        let first = analyzer.analyze(None).await;
        let second = analyzer.analyze(None).await;

        let key = |a: &Analysis| {
            a.opportunities
                .iter()
                .map(|q| (q.protocol.clone(), q.asset.clone(), q.apy, q.tvl_usd))
                .collect::<Vec<_>>()
        };
        assert_eq!(key(&first), key(&second));
        assert_eq!(first.opportunities[0].protocol, "Kamino");
        assert_eq!(first.opportunities.len(), 5);
    }

    #[tokio::test]
    async fn test_retain_protocols() {
        let analyzer = Analyzer::new(demo_sources(), Duration::from_secs(1));
        let mut analysis = analyzer.analyze(None).await;
        analysis.retain_protocols(&["raydium", "Orca"]);

        let names: Vec<_> = analysis.opportunities.iter().map(|q| q.protocol.as_str()).collect();
        assert_eq!(names, vec!["Orca", "Raydium"]);
    }
}
