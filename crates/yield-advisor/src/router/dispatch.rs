//! Two-stage dispatch
//!
//! Classify, then ask the analyzer; for strategy and risk intents hand the
//! ranked opportunities to the strategy agent. Every wait is bounded by the
//! agent timeout and any failure becomes a degraded [`QueryReply`].

use std::sync::Arc;
use std::time::Duration;

use agent_core::{Address, Ask, Postbox, SessionId};

use super::compose;
use super::intent::{Intent, IntentClassifier};
use super::reply::QueryReply;
use crate::analyzer::Analysis;
use crate::reasoner::Recommendation;
use crate::svckit::{AnalyzeRequest, RecommendRequest};

pub type AnalyzerPostbox = Postbox<Ask<AnalyzeRequest, Analysis>>;
pub type StrategyPostbox = Postbox<Ask<RecommendRequest, Recommendation>>;

#[derive(Clone, Debug)]
pub struct Dispatcher {
    classifier: Arc<IntentClassifier>,
    analyzer: AnalyzerPostbox,
    strategist: StrategyPostbox,
    address: Address,
    agent_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        classifier: IntentClassifier,
        analyzer: AnalyzerPostbox,
        strategist: StrategyPostbox,
        address: Address,
        agent_timeout: Duration,
    ) -> Self {
        Self {
            classifier: Arc::new(classifier),
            analyzer,
            strategist,
            address,
            agent_timeout,
        }
    }

    pub fn classify(&self, query: &str) -> Intent {
        self.classifier.classify(query)
    }

    pub async fn dispatch(&self, session: &SessionId, query: &str) -> QueryReply {
        let intent = self.classify(query);
        tracing::info!(%session, %intent, "Query classified");

        if intent == Intent::OutOfScope {
            return QueryReply::ok(intent, compose::out_of_scope());
        }

        match self.pipeline(session, query, intent).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(%session, %intent, code = e.code(), "Returning degraded reply: {}", e);
                QueryReply::failed(intent, &e)
            }
        }
    }

    async fn pipeline(&self, session: &SessionId, query: &str, intent: Intent) -> agent_core::Result<QueryReply> {
        let analysis = self
            .analyzer
            .ask(&self.address, session, AnalyzeRequest::new(query), self.agent_timeout)
            .await?;

        if !intent.needs_reasoner() {
            let text = if intent == Intent::YieldComparison {
                compose::comparison(&analysis)
            } else {
                compose::yield_analysis(&analysis)
            };
            return Ok(QueryReply::ok(intent, text).with_analysis(analysis));
        }

        let request = RecommendRequest {
            query: query.to_string(),
            opportunities: analysis.opportunities.clone(),
            tolerance: None,
        };
        let recommendation = self
            .strategist
            .ask(&self.address, session, request, self.agent_timeout)
            .await?;

        let text = if intent == Intent::RiskAssessment {
            compose::risk(&analysis, &recommendation)
        } else {
            compose::strategy(&analysis, &recommendation)
        };
        Ok(QueryReply::ok(intent, text)
            .with_analysis(analysis)
            .with_recommendation(recommendation))
    }
}
