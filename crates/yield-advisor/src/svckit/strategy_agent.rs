//! Strategy Agent
//!
//! Wraps whichever reasoner was selected at startup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use agent_core::{Handler, SessionId};

use crate::model::{RiskTolerance, YieldOpportunity};
use crate::reasoner::{Reasoner, Recommendation};

/// Second pipeline stage: the analyzer's ranked output plus the query
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub query: String,
    pub opportunities: Vec<YieldOpportunity>,
    #[serde(default)]
    pub tolerance: Option<RiskTolerance>,
}

pub struct StrategyAgent {
    reasoner: Arc<dyn Reasoner>,
}

impl StrategyAgent {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self { reasoner }
    }
}

#[async_trait]
impl Handler for StrategyAgent {
    type Request = RecommendRequest;
    type Response = Recommendation;

    fn name(&self) -> &'static str {
        "strategy"
    }

    async fn handle(&self, session: &SessionId, request: RecommendRequest) -> Recommendation {
        let recommendation = self
            .reasoner
            .recommend(&request.query, &request.opportunities, request.tolerance);

        tracing::info!(
            %session,
            engine = self.reasoner.kind(),
            confidence = recommendation.confidence(),
            "Recommendation ready"
        );
        recommendation
    }
}
