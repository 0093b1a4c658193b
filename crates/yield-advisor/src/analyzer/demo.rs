//! Static Quote Sources
//!
//! For tests and demos. Returns realistic fixed quotes.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use super::QuoteSource;
use crate::error::Result;
use crate::model::{RiskTier, YieldOpportunity};

/// Source that serves a fixed list of quotes
pub struct StaticSource {
    id: String,
    quotes: Vec<YieldOpportunity>,
    latency: Option<Duration>,
}

impl StaticSource {
    pub fn new(id: impl Into<String>, quotes: Vec<YieldOpportunity>) -> Self {
        Self {
            id: id.into(),
            quotes,
            latency: None,
        }
    }

    /// Simulate network latency on every fetch
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

#[async_trait]
impl QuoteSource for StaticSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_quotes(&self, topic: Option<&str>) -> Result<Vec<YieldOpportunity>> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let now = Utc::now();
        Ok(self
            .quotes
            .iter()
            .filter(|q| topic.is_none_or(|t| q.matches_topic(t)))
            .map(|q| YieldOpportunity {
                observed_at: now,
                ..q.clone()
            })
            .collect())
    }
}

/// Built-in demonstration sources, one per protocol
pub fn demo_sources() -> Vec<Arc<dyn QuoteSource>> {
    let quote = |protocol: &str, asset: &str, risk| YieldOpportunity::new(protocol, asset, risk, protocol.to_lowercase());

    vec![
        Arc::new(StaticSource::new(
            "orca",
            vec![quote("Orca", "SOL-USDC", RiskTier::Low)
                .with_apy(dec!(8.5))
                .with_tvl(dec!(15_000_000))],
        )),
        Arc::new(StaticSource::new(
            "raydium",
            vec![quote("Raydium", "SOL-USDC", RiskTier::Low)
                .with_apy(dec!(7.2))
                .with_tvl(dec!(12_000_000))],
        )),
        Arc::new(StaticSource::new(
            "kamino",
            vec![quote("Kamino", "USDC", RiskTier::Medium)
                .with_apy(dec!(12.3))
                .with_tvl(dec!(5_000_000))],
        )),
        Arc::new(StaticSource::new(
            "marginfi",
            vec![quote("Marginfi", "SOL", RiskTier::Medium)
                .with_apy(dec!(9.8))
                .with_tvl(dec!(8_000_000))],
        )),
        Arc::new(StaticSource::new(
            "solend",
            vec![quote("Solend", "USDT", RiskTier::Low)
                .with_apy(dec!(6.7))
                .with_tvl(dec!(3_000_000))],
        )),
    ]
}
