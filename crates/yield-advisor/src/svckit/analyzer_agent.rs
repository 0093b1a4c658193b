//! Analyzer Agent
//!
//! Reads the focus of a query and runs the analyzer over it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use agent_core::{Handler, SessionId};

use crate::analyzer::{Analysis, Analyzer};
use crate::concepts;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub query: String,
}

impl AnalyzeRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into() }
    }
}

pub struct AnalyzerAgent {
    analyzer: Analyzer,
}

impl AnalyzerAgent {
    pub const fn new(analyzer: Analyzer) -> Self {
        Self { analyzer }
    }
}

#[async_trait]
impl Handler for AnalyzerAgent {
    type Request = AnalyzeRequest;
    type Response = Analysis;

    fn name(&self) -> &'static str {
        "analyzer"
    }

    /// Named protocols restrict the result; the first asset or pair named
    /// becomes the topic. With neither, every opportunity is returned.
    async fn handle(&self, session: &SessionId, request: AnalyzeRequest) -> Analysis {
        let protocols = concepts::extract_protocols(&request.query);
        let topic = concepts::extract_assets(&request.query).into_iter().next();

        tracing::info!(%session, topic = ?topic, protocols = ?protocols, "Analyzing yields");

        let mut analysis = self.analyzer.analyze(topic.as_deref()).await;
        analysis.retain_protocols(&protocols);
        analysis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::demo_sources;
    use std::time::Duration;

    fn agent() -> AnalyzerAgent {
        AnalyzerAgent::new(Analyzer::new(demo_sources(), Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn test_protocol_comparison() {
        let analysis = agent()
            .handle(&SessionId::new(), AnalyzeRequest::new("Compare Orca vs Raydium APYs"))
            .await;

        let names: Vec<_> = analysis.opportunities.iter().map(|q| q.protocol.as_str()).collect();
        assert_eq!(names, vec!["Orca", "Raydium"]);
        assert_eq!(analysis.topic, None);
    }

    #[tokio::test]
    async fn test_asset_topic() {
        let analysis = agent()
            .handle(&SessionId::new(), AnalyzeRequest::new("What's the best yield for SOL?"))
            .await;

        assert_eq!(analysis.topic.as_deref(), Some("SOL"));
        let names: Vec<_> = analysis.opportunities.iter().map(|q| q.protocol.as_str()).collect();
        assert_eq!(names, vec!["Marginfi", "Orca", "Raydium"]);
    }

    #[tokio::test]
    async fn test_no_focus_returns_everything() {
        let analysis = agent()
            .handle(&SessionId::new(), AnalyzeRequest::new("show me defi yields"))
            .await;
        assert_eq!(analysis.opportunities.len(), 5);
    }
}
