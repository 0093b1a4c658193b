//! JSON-over-HTTP quote source
//!
//! Accepts either a bare array of records or `{"data": [...]}`. Each record
//! needs an asset (`asset`, `token_pair` or `token`); `apy`/`apr` and `tvl`
//! are taken when present and left empty otherwise.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;

use super::QuoteSource;
use crate::config::SourceSpec;
use crate::error::{AdvisorError, Result};
use crate::model::{RiskTier, YieldOpportunity};

pub struct HttpSource {
    client: Client,
    id: String,
    url: String,
    risk: RiskTier,
}

impl HttpSource {
    /// `client` is shared across sources for connection pooling
    pub fn new(client: Client, spec: &SourceSpec) -> Self {
        Self {
            client,
            id: spec.id.clone(),
            url: spec.url.clone(),
            risk: spec.risk,
        }
    }

    fn parse_records(&self, body: &Value) -> Result<Vec<YieldOpportunity>> {
        let records = body
            .as_array()
            .or_else(|| body.get("data").and_then(Value::as_array))
            .ok_or_else(|| AdvisorError::unavailable(&self.id, "response is not a list of quotes"))?;

        Ok(records.iter().filter_map(|record| self.parse_record(record)).collect())
    }

    fn parse_record(&self, record: &Value) -> Option<YieldOpportunity> {
        let asset = ["asset", "token_pair", "token"]
            .iter()
            .find_map(|key| record.get(*key).and_then(Value::as_str))
            .filter(|a| !a.is_empty())?;
        let protocol = record
            .get("protocol")
            .and_then(Value::as_str)
            .unwrap_or(self.id.as_str());
        let risk = record
            .get("risk_level")
            .and_then(Value::as_str)
            .and_then(RiskTier::parse)
            .unwrap_or(self.risk);

        let mut quote = YieldOpportunity::new(protocol, asset, risk, self.id.clone());
        quote.apy = record
            .get("apy")
            .or_else(|| record.get("apr"))
            .and_then(decimal);
        quote.tvl_usd = record.get("tvl").and_then(decimal);
        Some(quote)
    }
}

/// Numbers and numeric strings; `null` and anything else is absent
fn decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    text.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(&text).ok())
}

#[async_trait]
impl QuoteSource for HttpSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_quotes(&self, topic: Option<&str>) -> Result<Vec<YieldOpportunity>> {
        let mut request = self.client.get(&self.url);
        if let Some(topic) = topic {
            request = request.query(&[("asset", topic)]);
        }

        let body: Value = request.send().await?.error_for_status()?.json().await?;
        let quotes = self.parse_records(&body)?;
        tracing::debug!(source = %self.id, quotes = quotes.len(), "Fetched quotes");
        Ok(quotes)
    }
}
